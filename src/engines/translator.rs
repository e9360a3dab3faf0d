//! Translation engine interface.

use crate::error::{Result, SubcastError};
use std::sync::Arc;
use std::time::Duration;

/// Trait for text translation.
///
/// Same calling contract as [`crate::engines::Transcriber`]: may block, is
/// always called off the coordinator thread under a deadline.
pub trait Translator: Send + Sync {
    /// Translate text into the configured target language.
    fn translate(&self, text: &str) -> Result<String>;

    /// Engine name for logging and status reporting.
    fn name(&self) -> &str;
}

impl<T: Translator> Translator for Arc<T> {
    fn translate(&self, text: &str) -> Result<String> {
        (**self).translate(text)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Pass-through translator used when translation is disabled: captions are
/// broadcast in the source language.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translator for IdentityTranslator {
    fn translate(&self, text: &str) -> Result<String> {
        Ok(text.to_string())
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Mock translator for testing.
#[derive(Debug, Clone)]
pub struct MockTranslator {
    prefix: String,
    delay: Option<Duration>,
    should_fail: bool,
}

impl MockTranslator {
    /// Creates a mock that prefixes the input, making translated output
    /// distinguishable in assertions.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            delay: None,
            should_fail: false,
        }
    }

    /// Configure the mock to sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Configure the mock to fail on translate.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Translator for MockTranslator {
    fn translate(&self, text: &str) -> Result<String> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.should_fail {
            Err(SubcastError::Translation {
                message: "mock translation failure".to_string(),
            })
        } else {
            Ok(format!("{}{}", self.prefix, text))
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
