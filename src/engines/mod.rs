//! External engine interfaces: speech-to-text and translation.
//!
//! Both engines are opaque collaborators. The pipeline only depends on the
//! traits here; concrete backends are selected at startup and may be swapped
//! at runtime (in-flight utterances keep the engine they were dispatched
//! with).

pub mod transcriber;
pub mod translator;

#[cfg(feature = "http-translate")]
pub mod http_translate;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use transcriber::{MockTranscriber, Transcriber};
pub use translator::{IdentityTranslator, MockTranslator, Translator};

#[cfg(feature = "http-translate")]
pub use http_translate::HttpTranslator;
#[cfg(feature = "whisper")]
pub use whisper::{WhisperConfig, WhisperTranscriber};
