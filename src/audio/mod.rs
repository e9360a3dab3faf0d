//! Audio capture and voice activity detection.

pub mod capture;
pub mod vad;

pub use capture::{CaptureSource, MockCaptureSource, WavFileSource};
#[cfg(feature = "cpal-audio")]
pub use capture::CpalCaptureSource;
pub use vad::{VoiceDetector, calculate_rms};
