//! HTTP translation backend.
//!
//! Speaks the LibreTranslate-style JSON API: POST `{q, source, target,
//! format}` → `{translatedText}`. Works against a self-hosted instance or
//! any compatible endpoint.

use crate::engines::translator::Translator;
use crate::error::{Result, SubcastError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Translator backed by an HTTP endpoint.
pub struct HttpTranslator {
    client: reqwest::blocking::Client,
    url: String,
    source: String,
    target: String,
    api_key: Option<String>,
}

impl HttpTranslator {
    /// Creates a translator for the given endpoint and language pair.
    ///
    /// The request timeout is a transport-level bound; the pipeline applies
    /// its own engine deadline on top.
    pub fn new(url: &str, source: &str, target: &str, api_key: Option<&str>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(crate::defaults::ENGINE_TIMEOUT_S))
            .build()
            .map_err(|e| SubcastError::Translation {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            api_key: api_key.map(|k| k.to_string()),
        })
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let mut request = self.client.post(&self.url).json(&TranslateRequest {
            q: text,
            source: &self.source,
            target: &self.target,
            format: "text",
        });
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().map_err(|e| SubcastError::Translation {
            message: format!("request to {} failed: {}", self.url, e),
        })?;

        if !response.status().is_success() {
            return Err(SubcastError::Translation {
                message: format!("{} returned {}", self.url, response.status()),
            });
        }

        let body: TranslateResponse =
            response.json().map_err(|e| SubcastError::Translation {
                message: format!("invalid response from {}: {}", self.url, e),
            })?;

        Ok(body.translated_text)
    }

    fn name(&self) -> &str {
        "http"
    }
}
