//! JSON message protocol for the control socket.

use serde::{Deserialize, Serialize};

/// Commands accepted by the control socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Flip captioning on/off.
    Toggle,
    /// Turn captioning on.
    On,
    /// Turn captioning off.
    Off,
    /// Query daemon status.
    Status,
    /// Change a recognized tunable at runtime.
    Set { key: String, value: String },
    /// Shut the daemon down.
    Shutdown,
}

impl Command {
    /// Serialize command to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize command from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

/// Responses sent back over the control socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Command succeeded.
    Ok,
    /// Current daemon status.
    Status {
        mode: String,
        epoch: u64,
        subscribers: usize,
        dropped_chunks: u64,
        subtitle_ttl_s: f64,
        max_lines: u32,
        toggle_key: String,
    },
    /// Error occurred.
    Error { message: String },
}

impl Response {
    /// Serialize response to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize response from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_all_variants_roundtrip() {
        let commands = vec![
            Command::Toggle,
            Command::On,
            Command::Off,
            Command::Status,
            Command::Set {
                key: "silence_threshold_ms".to_string(),
                value: "400".to_string(),
            },
            Command::Shutdown,
        ];

        for cmd in commands {
            let json = cmd.to_json().expect("should serialize");
            let back = Command::from_json(&json).expect("should deserialize");
            assert_eq!(cmd, back, "roundtrip failed for {:?}", cmd);
        }
    }

    #[test]
    fn test_command_json_is_snake_case() {
        let json = Command::Toggle.to_json().expect("should serialize");
        assert!(json.contains("\"type\":\"toggle\""), "got: {}", json);

        let json = Command::Set {
            key: "max_lines".to_string(),
            value: "3".to_string(),
        }
        .to_json()
        .expect("should serialize");
        assert!(json.contains("\"type\":\"set\""), "got: {}", json);
        assert!(json.contains("\"key\":\"max_lines\""), "got: {}", json);
    }

    #[test]
    fn test_response_status_roundtrip() {
        let response = Response::Status {
            mode: "on".to_string(),
            epoch: 3,
            subscribers: 2,
            dropped_chunks: 0,
            subtitle_ttl_s: 4.5,
            max_lines: 2,
            toggle_key: "f11".to_string(),
        };
        let json = response.to_json().expect("should serialize");
        let back = Response::from_json(&json).expect("should deserialize");
        assert_eq!(response, back);
    }

    #[test]
    fn test_response_error_roundtrip() {
        let response = Response::Error {
            message: "unknown key".to_string(),
        };
        let json = response.to_json().expect("should serialize");
        assert_eq!(Response::from_json(&json).expect("roundtrip"), response);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Command::from_json(r#"{"type":"reboot"}"#).is_err());
    }
}
