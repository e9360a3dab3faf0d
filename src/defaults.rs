//! Default configuration constants for subcast.
//!
//! Shared between the config structs, the CLI and the pipeline so the
//! documented defaults stay in one place.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard rate for speech recognition models and keeps the
/// per-chunk workload small enough for real-time capture.
pub const SAMPLE_RATE: u32 = 16000;

/// Default capture chunk duration in milliseconds.
///
/// Chunks are the unit of VAD classification and segmentation; 100ms keeps
/// end-of-utterance detection latency low without drowning the coordinator.
pub const CHUNK_DURATION_MS: u32 = 100;

/// Default RMS energy threshold for voice detection (0.0 to 1.0).
pub const ENERGY_THRESHOLD: f32 = 0.01;

/// Default silence duration in milliseconds before an utterance is finalized.
pub const SILENCE_THRESHOLD_MS: u32 = 300;

/// Default maximum utterance length in seconds before force-finalization.
///
/// Long monologues are split at this boundary so captions keep flowing;
/// the segmenter immediately starts a new segment without dropping samples.
pub const MAX_SEGMENT_LENGTH_S: f32 = 12.0;

/// Default minimum speech duration in milliseconds.
///
/// Bursts shorter than this (coughs, keyboard thumps) are discarded instead
/// of being sent to transcription.
pub const MIN_SPEECH_DURATION_MS: u32 = 200;

/// Default number of utterance worker threads.
///
/// Engine calls block for anywhere between hundreds of milliseconds and tens
/// of seconds, so at least two workers are needed to keep captions flowing
/// while a slow utterance is still in flight.
pub const WORKER_THREADS: usize = 2;

/// Default capacity of the capture → coordinator chunk queue.
///
/// At 100ms chunks this buffers ~6.4s of audio. When full, the newest chunk
/// is dropped and counted; the queue never grows.
pub const CHUNK_QUEUE: usize = 64;

/// Default capacity of the coordinator → worker job queue.
pub const JOB_QUEUE: usize = 16;

/// Default per-engine-call deadline in seconds.
///
/// A transcription or translation call that exceeds this is abandoned and
/// the segment is dropped.
pub const ENGINE_TIMEOUT_S: u64 = 30;

/// Default bounded wait in milliseconds for out-of-order caption completions.
///
/// A finished caption whose predecessors are still in flight is held this
/// long before the gap is abandoned and delivery proceeds.
pub const REORDER_TIMEOUT_MS: u64 = 3000;

/// Default spoken (source) language code.
pub const SOURCE_LANGUAGE: &str = "en";

/// Default caption (target) language code.
pub const TARGET_LANGUAGE: &str = "pt";

/// Default label identifying the originating capture device in events.
pub const SOURCE_LABEL: &str = "mic";

/// Default overlay subtitle time-to-live in seconds.
pub const SUBTITLE_TTL_S: f64 = 4.5;

/// Default number of caption lines kept on the overlay.
pub const MAX_LINES: u32 = 2;

/// Default toggle key name.
pub const TOGGLE_KEY: &str = "f11";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_queue_covers_several_seconds() {
        let buffered_ms = CHUNK_QUEUE as u32 * CHUNK_DURATION_MS;
        assert!(buffered_ms >= 3000, "queue should buffer at least 3s");
    }

    #[test]
    fn segmenter_defaults_are_positive() {
        assert!(ENERGY_THRESHOLD > 0.0);
        assert!(SILENCE_THRESHOLD_MS > 0);
        assert!(MAX_SEGMENT_LENGTH_S > 0.0);
        assert!(MIN_SPEECH_DURATION_MS > 0);
    }
}
