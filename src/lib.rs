//! subcast - live subtitle broadcasting for streaming overlays.
//!
//! Captures microphone audio, segments speech into utterances, runs them
//! through transcription and translation engines, and fans finished captions
//! out to live subscribers.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod broadcast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod engines;
pub mod error;
pub mod events;
pub mod ipc;
pub mod mode;
pub mod pipeline;
pub mod segment;
pub mod trigger;

// Composition root
pub mod app;

// Core traits (capture → pipeline → broadcast)
pub use audio::capture::CaptureSource;
pub use broadcast::{BroadcastHub, Subscriber};
pub use engines::{Transcriber, Translator};

// Pipeline
pub use pipeline::{CoordinatorConfig, Pipeline, PipelineController, PipelineHandle};

// Error handling
pub use error::{Result, SubcastError};

// Config
pub use config::Config;

// Events
pub use events::SubtitleEvent;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when the git hash is available, `"0.1.0"`
/// otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
