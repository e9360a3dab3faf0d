//! Utterance segmentation state machine.
//!
//! Consumes voice-classified chunks and emits one finalized segment per
//! utterance. Timing rules: an utterance ends after `silence_threshold_ms`
//! of trailing silence, is discarded entirely when shorter than
//! `min_speech_duration_ms`, and is split at `max_segment_length_s` so a
//! monologue produces consecutive segments without dropping samples.

use crate::clock::{Clock, SystemClock};
use crate::defaults;
use crate::error::{Result, SubcastError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One finalized utterance: accumulated samples plus timing metadata.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// PCM samples (16-bit signed integers), including any trailing silence
    /// chunks appended before finalization.
    pub samples: Vec<i16>,
    /// Monotonic timestamp of the first chunk in the segment.
    pub start_time: Instant,
    /// Monotonic timestamp at finalization.
    pub end_time: Instant,
    /// Always true for emitted segments.
    pub finalized: bool,
}

impl AudioSegment {
    /// Wall duration covered by this segment.
    pub fn duration(&self) -> Duration {
        self.end_time.duration_since(self.start_time)
    }
}

/// Segmentation timing configuration. All values must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// RMS energy threshold for voice detection (0.0 to 1.0).
    pub energy_threshold: f32,
    /// Trailing silence that ends an utterance, in milliseconds.
    pub silence_threshold_ms: u32,
    /// Maximum utterance length before force-finalization, in seconds.
    pub max_segment_length_s: f32,
    /// Minimum utterance length worth transcribing, in milliseconds.
    pub min_speech_duration_ms: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            energy_threshold: defaults::ENERGY_THRESHOLD,
            silence_threshold_ms: defaults::SILENCE_THRESHOLD_MS,
            max_segment_length_s: defaults::MAX_SEGMENT_LENGTH_S,
            min_speech_duration_ms: defaults::MIN_SPEECH_DURATION_MS,
        }
    }
}

impl SegmenterConfig {
    /// Rejects non-positive values. Called at startup and on reconfiguration;
    /// invalid values are never silently defaulted mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.energy_threshold <= 0.0 {
            return Err(invalid("energy_threshold"));
        }
        if self.silence_threshold_ms == 0 {
            return Err(invalid("silence_threshold_ms"));
        }
        if self.max_segment_length_s <= 0.0 {
            return Err(invalid("max_segment_length_s"));
        }
        if self.min_speech_duration_ms == 0 {
            return Err(invalid("min_speech_duration_ms"));
        }
        Ok(())
    }
}

fn invalid(key: &str) -> SubcastError {
    SubcastError::ConfigInvalidValue {
        key: key.to_string(),
        message: "must be positive".to_string(),
    }
}

/// Segmentation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegState {
    /// No utterance in progress; silence chunks are discarded.
    Idle,
    /// Accumulating an utterance; silence chunks are appended (brief pauses
    /// stay inside the utterance) until the silence threshold is reached.
    Speaking,
}

/// Stateful accumulator turning classified chunks into utterance segments.
///
/// Never fails: zero-length chunks are treated as silence.
pub struct Segmenter {
    config: SegmenterConfig,
    clock: Arc<dyn Clock>,
    state: SegState,
    buffer: Vec<i16>,
    segment_start: Option<Instant>,
    last_voice: Option<Instant>,
}

impl Segmenter {
    /// Creates a segmenter using the system clock.
    pub fn new(config: SegmenterConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a segmenter with an injectable clock.
    pub fn with_clock(config: SegmenterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: SegState::Idle,
            buffer: Vec::new(),
            segment_start: None,
            last_voice: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SegState {
        self.state
    }

    /// Current configuration.
    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Replaces the configuration. Applies from the next chunk; the segment
    /// currently accumulating (if any) finishes under the new timing rules.
    pub fn set_config(&mut self, config: SegmenterConfig) {
        self.config = config;
    }

    /// Processes one chunk with its voice classification.
    ///
    /// Returns a segment when this chunk completed an utterance.
    pub fn process(&mut self, samples: &[i16], voice: bool) -> Option<AudioSegment> {
        let now = self.clock.now();

        if voice {
            if self.state == SegState::Idle {
                self.buffer.clear();
                self.segment_start = Some(now);
                self.state = SegState::Speaking;
            }
            self.last_voice = Some(now);
            self.buffer.extend_from_slice(samples);
        } else if self.state == SegState::Speaking {
            self.buffer.extend_from_slice(samples);
        }

        self.check_finalization(now)
    }

    /// Evaluates the finalization rules; highest-priority rule wins.
    fn check_finalization(&mut self, now: Instant) -> Option<AudioSegment> {
        if self.state != SegState::Speaking {
            return None;
        }
        let start = self.segment_start?;

        let silence = self
            .last_voice
            .map(|t| now.duration_since(t))
            .unwrap_or(Duration::ZERO);

        if silence >= Duration::from_millis(self.config.silence_threshold_ms as u64) {
            let speech = now.duration_since(start);
            if speech >= Duration::from_millis(self.config.min_speech_duration_ms as u64) {
                return Some(self.finalize(now));
            }
            // Too short to be real speech.
            self.reset();
            return None;
        }

        if now.duration_since(start) >= Duration::from_secs_f32(self.config.max_segment_length_s) {
            return Some(self.finalize(now));
        }

        None
    }

    /// Finalizes the current utterance immediately, regardless of timers.
    ///
    /// No-op when idle or when the buffer is empty.
    pub fn force_finalize(&mut self) -> Option<AudioSegment> {
        if self.state == SegState::Speaking && !self.buffer.is_empty() {
            let now = self.clock.now();
            return Some(self.finalize(now));
        }
        None
    }

    /// Discards any in-progress utterance without emitting.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.segment_start = None;
        self.last_voice = None;
        self.state = SegState::Idle;
    }

    fn finalize(&mut self, end_time: Instant) -> AudioSegment {
        let segment = AudioSegment {
            samples: std::mem::take(&mut self.buffer),
            start_time: self.segment_start.unwrap_or(end_time),
            end_time,
            finalized: true,
        };
        self.reset();
        segment
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;

    const CHUNK_MS: u64 = 100;
    // 100ms at 16kHz
    const CHUNK_SAMPLES: usize = 1600;

    fn test_config() -> SegmenterConfig {
        SegmenterConfig {
            energy_threshold: 0.01,
            silence_threshold_ms: 300,
            max_segment_length_s: 10.0,
            min_speech_duration_ms: 200,
        }
    }

    fn segmenter(config: SegmenterConfig) -> (Segmenter, MockClock) {
        let clock = MockClock::new();
        let seg = Segmenter::with_clock(config, Arc::new(clock.clone()));
        (seg, clock)
    }

    fn voice_chunk() -> Vec<i16> {
        vec![3000i16; CHUNK_SAMPLES]
    }

    fn silence_chunk() -> Vec<i16> {
        vec![0i16; CHUNK_SAMPLES]
    }

    /// Feeds one chunk and advances the clock by one chunk period afterwards.
    fn feed(
        seg: &mut Segmenter,
        clock: &MockClock,
        samples: &[i16],
        voice: bool,
    ) -> Option<AudioSegment> {
        let out = seg.process(samples, voice);
        clock.advance(Duration::from_millis(CHUNK_MS));
        out
    }

    #[test]
    fn test_starts_idle() {
        let (seg, _clock) = segmenter(test_config());
        assert_eq!(seg.state(), SegState::Idle);
    }

    #[test]
    fn test_silence_while_idle_is_discarded() {
        let (mut seg, clock) = segmenter(test_config());
        for _ in 0..16 {
            let out = feed(&mut seg, &clock, &silence_chunk(), false);
            assert!(out.is_none());
        }
        assert_eq!(seg.state(), SegState::Idle);
    }

    #[test]
    fn test_voice_enters_speaking_and_seeds_buffer() {
        let (mut seg, clock) = segmenter(test_config());
        let out = feed(&mut seg, &clock, &voice_chunk(), true);
        assert!(out.is_none());
        assert_eq!(seg.state(), SegState::Speaking);
    }

    #[test]
    fn test_utterance_finalizes_after_silence_threshold() {
        // 10 voiced chunks (1.0s) then silence; threshold 300ms, min 200ms.
        let (mut seg, clock) = segmenter(test_config());

        for _ in 0..10 {
            assert!(feed(&mut seg, &clock, &voice_chunk(), true).is_none());
        }

        // Silence at t=1000 and t=1100: silence duration 100ms, 200ms. No emit.
        assert!(feed(&mut seg, &clock, &silence_chunk(), false).is_none());
        assert!(feed(&mut seg, &clock, &silence_chunk(), false).is_none());

        // Silence at t=1200: 300ms since last voice, so finalize.
        let segment = feed(&mut seg, &clock, &silence_chunk(), false)
            .expect("third silence chunk should finalize");
        assert!(segment.finalized);
        assert_eq!(seg.state(), SegState::Idle);

        // Duration includes the trailing silence chunks appended before
        // finalization: 1.2s of wall time, 13 chunks of audio.
        assert_eq!(segment.duration(), Duration::from_millis(1200));
        assert_eq!(segment.samples.len(), 13 * CHUNK_SAMPLES);

        // A fourth silence chunk after finalization is discarded while idle.
        assert!(feed(&mut seg, &clock, &silence_chunk(), false).is_none());
        assert_eq!(seg.state(), SegState::Idle);
    }

    #[test]
    fn test_short_burst_is_discarded() {
        // One 100ms voiced chunk then qualifying silence. The utterance span
        // (including trailing silence) is 400ms, below the 500ms minimum.
        let config = SegmenterConfig {
            min_speech_duration_ms: 500,
            ..test_config()
        };
        let (mut seg, clock) = segmenter(config);
        assert!(feed(&mut seg, &clock, &voice_chunk(), true).is_none());
        assert!(feed(&mut seg, &clock, &silence_chunk(), false).is_none());
        assert!(feed(&mut seg, &clock, &silence_chunk(), false).is_none());
        let out = feed(&mut seg, &clock, &silence_chunk(), false);
        assert!(out.is_none(), "short burst must be discarded, not emitted");
        assert_eq!(seg.state(), SegState::Idle);
    }

    #[test]
    fn test_brief_pause_stays_inside_utterance() {
        let (mut seg, clock) = segmenter(test_config());

        for _ in 0..5 {
            assert!(feed(&mut seg, &clock, &voice_chunk(), true).is_none());
        }
        // A 200ms pause, below the 300ms threshold.
        assert!(feed(&mut seg, &clock, &silence_chunk(), false).is_none());
        assert!(feed(&mut seg, &clock, &silence_chunk(), false).is_none());
        // Voice resumes; still the same utterance.
        assert!(feed(&mut seg, &clock, &voice_chunk(), true).is_none());
        assert_eq!(seg.state(), SegState::Speaking);
    }

    #[test]
    fn test_continuous_voice_never_emits_before_max_length() {
        let (mut seg, clock) = segmenter(test_config());
        // 9.9s of continuous voice, below the 10s cap.
        for _ in 0..99 {
            assert!(feed(&mut seg, &clock, &voice_chunk(), true).is_none());
        }
        assert_eq!(seg.state(), SegState::Speaking);
    }

    #[test]
    fn test_max_length_force_finalizes_and_continues() {
        let config = SegmenterConfig {
            max_segment_length_s: 1.0,
            ..test_config()
        };
        let (mut seg, clock) = segmenter(config);

        let mut emitted = Vec::new();
        // 2.5s of continuous voice.
        for _ in 0..25 {
            if let Some(segment) = feed(&mut seg, &clock, &voice_chunk(), true) {
                emitted.push(segment);
            }
        }
        // Still speaking: the utterance continues into a fresh segment after
        // each split.
        assert_eq!(seg.state(), SegState::Speaking);
        assert!(!emitted.is_empty());
        for segment in &emitted {
            assert!(segment.duration() >= Duration::from_secs(1));
        }

        // No samples dropped: emitted segments plus the live buffer account
        // for every chunk fed.
        let emitted_samples: usize = emitted.iter().map(|s| s.samples.len()).sum();
        let buffered = seg.buffer.len();
        assert_eq!(emitted_samples + buffered, 25 * CHUNK_SAMPLES);
    }

    #[test]
    fn test_force_finalize_emits_current_buffer() {
        let (mut seg, clock) = segmenter(test_config());
        for _ in 0..3 {
            feed(&mut seg, &clock, &voice_chunk(), true);
        }

        let segment = seg.force_finalize().expect("should emit while speaking");
        assert!(segment.finalized);
        assert_eq!(segment.samples.len(), 3 * CHUNK_SAMPLES);
        assert_eq!(seg.state(), SegState::Idle);
    }

    #[test]
    fn test_force_finalize_is_noop_when_idle() {
        let (mut seg, _clock) = segmenter(test_config());
        assert!(seg.force_finalize().is_none());
    }

    #[test]
    fn test_reset_discards_without_emitting() {
        let (mut seg, clock) = segmenter(test_config());
        for _ in 0..3 {
            feed(&mut seg, &clock, &voice_chunk(), true);
        }
        seg.reset();
        assert_eq!(seg.state(), SegState::Idle);
        assert!(seg.force_finalize().is_none());
    }

    #[test]
    fn test_empty_chunk_is_silence() {
        let (mut seg, clock) = segmenter(test_config());
        let out = feed(&mut seg, &clock, &[], false);
        assert!(out.is_none());
        assert_eq!(seg.state(), SegState::Idle);
    }

    #[test]
    fn test_config_validate_accepts_defaults() {
        assert!(SegmenterConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validate_rejects_non_positive() {
        let mut config = SegmenterConfig::default();
        config.energy_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = SegmenterConfig::default();
        config.silence_threshold_ms = 0;
        assert!(config.validate().is_err());

        let mut config = SegmenterConfig::default();
        config.max_segment_length_s = -1.0;
        assert!(config.validate().is_err());

        let mut config = SegmenterConfig::default();
        config.min_speech_duration_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_set_config_applies_to_next_chunk() {
        let (mut seg, clock) = segmenter(test_config());
        for _ in 0..10 {
            feed(&mut seg, &clock, &voice_chunk(), true);
        }
        // Raise the silence threshold mid-utterance: 300ms of silence no
        // longer finalizes.
        seg.set_config(SegmenterConfig {
            silence_threshold_ms: 1000,
            ..test_config()
        });
        for _ in 0..5 {
            assert!(feed(&mut seg, &clock, &silence_chunk(), false).is_none());
        }
        assert_eq!(seg.state(), SegState::Speaking);
    }
}
