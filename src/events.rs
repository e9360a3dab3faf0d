//! Subtitle event schema shared by the pipeline and its subscribers.
//!
//! Events are serialized once per publish and pushed to every subscriber as
//! a single JSON object: `{"type","text","timestamp","language","source"}`.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A caption event pushed to overlay subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubtitleEvent {
    /// Interim transcription in the source language (unstable, may be
    /// superseded by the translated final).
    Partial {
        text: String,
        timestamp: f64,
        language: String,
        source: String,
    },
    /// Finalized, translated caption for one utterance.
    Final {
        text: String,
        timestamp: f64,
        language: String,
        source: String,
    },
    /// Wipe the overlay (emitted when captioning is toggled off).
    Clear {
        #[serde(default)]
        text: String,
        timestamp: f64,
        language: String,
        source: String,
    },
}

/// Current wall-clock time as unix seconds.
fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

impl SubtitleEvent {
    /// Creates a finalized caption event.
    pub fn final_event(text: &str, language: &str, source: &str) -> Self {
        SubtitleEvent::Final {
            text: text.to_string(),
            timestamp: unix_now(),
            language: language.to_string(),
            source: source.to_string(),
        }
    }

    /// Creates an interim transcription event.
    pub fn partial(text: &str, language: &str, source: &str) -> Self {
        SubtitleEvent::Partial {
            text: text.to_string(),
            timestamp: unix_now(),
            language: language.to_string(),
            source: source.to_string(),
        }
    }

    /// Creates a clear event. Carries no text.
    pub fn clear(language: &str, source: &str) -> Self {
        SubtitleEvent::Clear {
            text: String::new(),
            timestamp: unix_now(),
            language: language.to_string(),
            source: source.to_string(),
        }
    }

    /// The caption text ("" for clear events).
    pub fn text(&self) -> &str {
        match self {
            SubtitleEvent::Partial { text, .. }
            | SubtitleEvent::Final { text, .. }
            | SubtitleEvent::Clear { text, .. } => text,
        }
    }

    /// Event creation time as unix seconds.
    pub fn timestamp(&self) -> f64 {
        match self {
            SubtitleEvent::Partial { timestamp, .. }
            | SubtitleEvent::Final { timestamp, .. }
            | SubtitleEvent::Clear { timestamp, .. } => *timestamp,
        }
    }

    /// Serialize to the JSON wire format.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from the JSON wire format.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_event_json_roundtrip() {
        let event = SubtitleEvent::final_event("olá mundo", "pt", "mic");
        let json = event.to_json().expect("should serialize");
        let back = SubtitleEvent::from_json(&json).expect("should deserialize");
        assert_eq!(event, back);
    }

    #[test]
    fn test_wire_format_uses_snake_case_type_tag() {
        let event = SubtitleEvent::final_event("hello", "en", "mic");
        let json = event.to_json().expect("should serialize");
        assert!(json.contains("\"type\":\"final\""), "got: {}", json);

        let event = SubtitleEvent::partial("hello", "en", "mic");
        let json = event.to_json().expect("should serialize");
        assert!(json.contains("\"type\":\"partial\""), "got: {}", json);

        let event = SubtitleEvent::clear("pt", "mic");
        let json = event.to_json().expect("should serialize");
        assert!(json.contains("\"type\":\"clear\""), "got: {}", json);
    }

    #[test]
    fn test_clear_carries_empty_text() {
        let event = SubtitleEvent::clear("pt", "mic");
        assert_eq!(event.text(), "");
        let json = event.to_json().expect("should serialize");
        assert!(json.contains("\"text\":\"\""), "got: {}", json);
    }

    #[test]
    fn test_timestamp_is_recent_unix_seconds() {
        let event = SubtitleEvent::final_event("x", "en", "mic");
        // Any plausible wall clock after 2020 and not in the far future.
        assert!(event.timestamp() > 1_577_836_800.0);
        assert!(event.timestamp() < 32_503_680_000.0);
    }

    #[test]
    fn test_all_wire_fields_present() {
        let event = SubtitleEvent::final_event("text", "pt", "desk-mic");
        let json = event.to_json().expect("should serialize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        for field in ["type", "text", "timestamp", "language", "source"] {
            assert!(value.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(value["source"], "desk-mic");
    }
}
