//! Pipeline coordinator: the concurrency core.
//!
//! Three execution contexts, bridged by bounded channels:
//!
//! - the capture thread polls the [`CaptureSource`] and pushes fixed-size
//!   chunks; it never blocks: a full queue drops the newest chunk and
//!   counts it;
//! - the coordinator thread is the single writer for mode, epoch and
//!   segmenter state; it gates chunks on the mode, drives segmentation and
//!   dispatches finalized utterances;
//! - the worker pool runs the blocking engine calls and publishes captions,
//!   gated by the epoch check.
//!
//! Toggling off increments the epoch so in-flight results are invalidated;
//! the utterance still accumulating at the toggle is force-finalized and
//! dispatched under the new epoch, so it is captioned exactly once, then a
//! clear event wipes the overlay.

use crate::audio::capture::CaptureSource;
use crate::audio::vad::VoiceDetector;
use crate::broadcast::BroadcastHub;
use crate::clock::{Clock, SystemClock};
use crate::defaults;
use crate::engines::{Transcriber, Translator};
use crate::error::{Result, SubcastError};
use crate::events::SubtitleEvent;
use crate::mode::{FlagObserver, ModeController, ModeState};
use crate::pipeline::error::{ErrorReporter, LogReporter, PipelineError};
use crate::pipeline::types::AudioChunk;
use crate::pipeline::worker::{UtteranceJob, WorkerContext, spawn_pool};
use crate::segment::{AudioSegment, Segmenter, SegmenterConfig};
use crossbeam_channel::{Receiver, Sender, bounded, never};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Segmentation timing.
    pub segmenter: SegmenterConfig,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Chunk duration in milliseconds.
    pub chunk_duration_ms: u32,
    /// Capture → coordinator queue capacity (chunks).
    pub chunk_queue: usize,
    /// Coordinator → worker queue capacity (jobs).
    pub job_queue: usize,
    /// Worker thread count (minimum 2).
    pub workers: usize,
    /// Per-engine-call deadline.
    pub engine_timeout: Duration,
    /// Whether to broadcast source-language partials before translation.
    pub emit_partials: bool,
    /// Spoken language code, used for partial events.
    pub source_language: String,
    /// Caption language code, used for final and clear events.
    pub target_language: String,
    /// Label identifying the capture device in events.
    pub source_label: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            sample_rate: defaults::SAMPLE_RATE,
            chunk_duration_ms: defaults::CHUNK_DURATION_MS,
            chunk_queue: defaults::CHUNK_QUEUE,
            job_queue: defaults::JOB_QUEUE,
            workers: defaults::WORKER_THREADS,
            engine_timeout: Duration::from_secs(defaults::ENGINE_TIMEOUT_S),
            emit_partials: false,
            source_language: defaults::SOURCE_LANGUAGE.to_string(),
            target_language: defaults::TARGET_LANGUAGE.to_string(),
            source_label: defaults::SOURCE_LABEL.to_string(),
        }
    }
}

impl CoordinatorConfig {
    /// Rejects invalid values at startup; nothing is silently defaulted.
    pub fn validate(&self) -> Result<()> {
        self.segmenter.validate()?;
        if self.sample_rate == 0 {
            return Err(invalid("sample_rate", "must be positive"));
        }
        if self.chunk_duration_ms == 0 {
            return Err(invalid("chunk_duration_ms", "must be positive"));
        }
        if self.chunk_queue == 0 || self.job_queue == 0 {
            return Err(invalid("chunk_queue/job_queue", "must be positive"));
        }
        if self.workers < 2 {
            return Err(invalid("workers", "need at least 2 worker threads"));
        }
        Ok(())
    }

    fn chunk_samples(&self) -> usize {
        (self.sample_rate as u64 * self.chunk_duration_ms as u64 / 1000) as usize
    }
}

fn invalid(key: &str, message: &str) -> SubcastError {
    SubcastError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Commands accepted by the coordinator thread.
pub enum ControlMsg {
    /// Flip the captioning mode.
    Toggle,
    /// Turn captioning on (no-op when already on).
    TurnOn,
    /// Turn captioning off (no-op when already off).
    TurnOff,
    /// Replace the segmentation timing; applies from the next chunk.
    SetSegmenter(SegmenterConfig),
    /// Swap the translation engine; in-flight utterances keep the engine
    /// they were dispatched with.
    SetTranslator(Arc<dyn Translator>),
    /// Flush the in-progress utterance and stop the coordinator.
    Shutdown,
}

/// Cheaply cloneable control interface to a running pipeline.
#[derive(Clone)]
pub struct PipelineController {
    ctrl_tx: Sender<ControlMsg>,
    epoch: Arc<AtomicU64>,
    mode_on: Arc<AtomicBool>,
    dropped_chunks: Arc<AtomicU64>,
}

impl PipelineController {
    /// Flips the captioning mode.
    pub fn toggle(&self) -> Result<()> {
        self.send(ControlMsg::Toggle)
    }

    /// Turns captioning on.
    pub fn turn_on(&self) -> Result<()> {
        self.send(ControlMsg::TurnOn)
    }

    /// Turns captioning off.
    pub fn turn_off(&self) -> Result<()> {
        self.send(ControlMsg::TurnOff)
    }

    /// Replaces the segmentation timing after validating it.
    pub fn set_segmenter_config(&self, config: SegmenterConfig) -> Result<()> {
        config.validate()?;
        self.send(ControlMsg::SetSegmenter(config))
    }

    /// Swaps the translation engine.
    pub fn set_translator(&self, translator: Arc<dyn Translator>) -> Result<()> {
        self.send(ControlMsg::SetTranslator(translator))
    }

    /// Current captioning mode.
    pub fn is_on(&self) -> bool {
        self.mode_on.load(Ordering::SeqCst)
    }

    /// Current epoch (number of OFF transitions so far).
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Chunks dropped at the capture boundary because the coordinator
    /// queue was full.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }

    fn send(&self, msg: ControlMsg) -> Result<()> {
        self.ctrl_tx
            .try_send(msg)
            .map_err(|_| SubcastError::Other("pipeline is not running".to_string()))
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    controller: PipelineController,
    running: Arc<AtomicBool>,
    hub: Arc<BroadcastHub>,
    threads: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Returns a cloneable control interface.
    pub fn controller(&self) -> PipelineController {
        self.controller.clone()
    }

    /// Returns true while the capture context is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops the pipeline gracefully: flushes the in-progress utterance,
    /// waits up to 5 seconds for in-flight work, then detaches stragglers.
    pub fn stop(self) {
        self.stop_with_deadline(Duration::from_secs(5))
    }

    /// Stops the pipeline with an explicit deadline for in-flight work.
    pub fn stop_with_deadline(mut self, deadline: Duration) {
        let _ = self.controller.send(ControlMsg::Shutdown);
        self.running.store(false, Ordering::SeqCst);

        let poll_interval = Duration::from_millis(50);
        let end = Instant::now() + deadline;

        loop {
            let mut remaining = Vec::new();
            for handle in self.threads.drain(..) {
                if handle.is_finished() {
                    if let Err(panic_info) = handle.join() {
                        let msg = panic_info
                            .downcast_ref::<&str>()
                            .copied()
                            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                            .unwrap_or("unknown panic");
                        eprintln!("subcast: pipeline thread panicked: {msg}");
                    }
                } else {
                    remaining.push(handle);
                }
            }
            self.threads = remaining;

            if self.threads.is_empty() {
                break;
            }
            if Instant::now() >= end {
                eprintln!(
                    "subcast: shutdown deadline reached — {} thread(s) still running, detaching",
                    self.threads.len()
                );
                break;
            }
            thread::sleep(poll_interval);
        }

        self.hub.clear_subscribers();
    }
}

/// Pipeline builder: capture → gate → segmentation → workers → broadcast.
pub struct Pipeline {
    config: CoordinatorConfig,
    reporter: Arc<dyn ErrorReporter>,
    clock: Arc<dyn Clock>,
}

impl Pipeline {
    /// Creates a pipeline with the default error reporter.
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            reporter: Arc::new(LogReporter),
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Sets a custom clock (for deterministic testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Starts the pipeline.
    ///
    /// The mode starts OFF: chunks are captured but dropped until the
    /// controller turns captioning on.
    pub fn start(
        self,
        mut capture: Box<dyn CaptureSource>,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
        hub: Arc<BroadcastHub>,
    ) -> Result<PipelineHandle> {
        self.config.validate()?;

        let running = Arc::new(AtomicBool::new(true));
        let epoch = Arc::new(AtomicU64::new(0));
        let mode_on = Arc::new(AtomicBool::new(false));
        let dropped_chunks = Arc::new(AtomicU64::new(0));

        let (chunk_tx, chunk_rx) = bounded(self.config.chunk_queue);
        let (ctrl_tx, ctrl_rx) = bounded(32);

        let (job_tx, worker_threads) = spawn_pool(
            self.config.workers,
            self.config.job_queue,
            WorkerContext {
                hub: Arc::clone(&hub),
                current_epoch: Arc::clone(&epoch),
                reporter: Arc::clone(&self.reporter),
                engine_timeout: self.config.engine_timeout,
                emit_partials: self.config.emit_partials,
                source_language: self.config.source_language.clone(),
                target_language: self.config.target_language.clone(),
                source_label: self.config.source_label.clone(),
            },
        );

        capture.start()?;

        let capture_thread = spawn_capture(
            capture,
            chunk_tx,
            Arc::clone(&running),
            Arc::clone(&dropped_chunks),
            Arc::clone(&self.reporter),
            self.config.chunk_samples(),
        );

        let mut mode = ModeController::new();
        mode.register(Box::new(FlagObserver::new(Arc::clone(&mode_on))));

        let coordinator = Coordinator {
            detector: VoiceDetector::new(self.config.segmenter.energy_threshold),
            segmenter: Segmenter::with_clock(self.config.segmenter, Arc::clone(&self.clock)),
            mode,
            epoch: Arc::clone(&epoch),
            next_seq: 1,
            job_tx,
            hub: Arc::clone(&hub),
            transcriber,
            translator,
            reporter: Arc::clone(&self.reporter),
            config: self.config,
        };

        let coordinator_thread = thread::spawn(move || coordinator.run(chunk_rx, ctrl_rx));

        let mut threads = vec![capture_thread, coordinator_thread];
        threads.extend(worker_threads);

        Ok(PipelineHandle {
            controller: PipelineController {
                ctrl_tx,
                epoch,
                mode_on,
                dropped_chunks,
            },
            running,
            hub,
            threads,
        })
    }
}

/// Number of consecutive capture read failures treated as a lost device.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Spawns the capture polling thread.
///
/// Reads whatever the source has accumulated, slices it into fixed-size
/// chunks and hands them to the coordinator. Never blocks on a full queue:
/// the newest chunk is dropped and counted.
fn spawn_capture(
    mut capture: Box<dyn CaptureSource>,
    chunk_tx: Sender<AudioChunk>,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    reporter: Arc<dyn ErrorReporter>,
    chunk_samples: usize,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let poll_interval = Duration::from_millis(16);
        let source_is_finite = capture.is_finite();
        let mut pending: Vec<i16> = Vec::new();
        let mut sequence: u64 = 0;
        let mut consecutive_errors: u32 = 0;

        while running.load(Ordering::SeqCst) {
            let samples = match capture.read_samples() {
                Ok(samples) => {
                    consecutive_errors = 0;
                    samples
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        reporter.report(
                            "capture",
                            &PipelineError::Fatal(format!(
                                "audio capture failed {consecutive_errors} times in a row: {e}"
                            )),
                        );
                        break;
                    }
                    thread::sleep(poll_interval);
                    continue;
                }
            };

            if samples.is_empty() {
                if source_is_finite {
                    // File/pipe source exhausted.
                    break;
                }
                // Live source: empty read is normal while the device warms up.
                thread::sleep(poll_interval);
                continue;
            }

            pending.extend_from_slice(&samples);
            while pending.len() >= chunk_samples {
                let rest = pending.split_off(chunk_samples);
                let chunk_data = std::mem::replace(&mut pending, rest);
                sequence += 1;
                let chunk = AudioChunk::new(chunk_data, Instant::now(), sequence);

                if chunk_tx.try_send(chunk).is_err() {
                    let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    if total == 1 || total % 100 == 0 {
                        reporter.report(
                            "capture",
                            &PipelineError::Recoverable(format!(
                                "coordinator queue full, dropped {total} chunk(s) so far"
                            )),
                        );
                    }
                }
            }

            thread::sleep(poll_interval);
        }

        if let Err(e) = capture.stop() {
            eprintln!("subcast: failed to stop audio capture: {e}");
        }
    })
}

/// State owned exclusively by the coordinator thread. Single writer: no lock
/// is needed for mode, epoch or segmenter state.
struct Coordinator {
    config: CoordinatorConfig,
    detector: VoiceDetector,
    segmenter: Segmenter,
    mode: ModeController,
    epoch: Arc<AtomicU64>,
    next_seq: u64,
    job_tx: Sender<UtteranceJob>,
    hub: Arc<BroadcastHub>,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    reporter: Arc<dyn ErrorReporter>,
}

impl Coordinator {
    fn run(mut self, chunk_rx: Receiver<AudioChunk>, ctrl_rx: Receiver<ControlMsg>) {
        let mut chunk_rx = chunk_rx;
        loop {
            crossbeam_channel::select! {
                recv(ctrl_rx) -> msg => match msg {
                    Ok(msg) => {
                        if self.handle_control(msg) {
                            break;
                        }
                    }
                    // Every controller dropped: stop.
                    Err(_) => break,
                },
                recv(chunk_rx) -> chunk => match chunk {
                    Ok(chunk) => self.process_chunk(chunk),
                    Err(_) => {
                        // Capture ended (finite source or device loss).
                        // Flush the in-progress utterance and keep serving
                        // control commands.
                        self.flush();
                        chunk_rx = never();
                    }
                },
                default(Duration::from_millis(100)) => {
                    self.hub.flush_expired();
                }
            }
        }
    }

    /// Returns true when the coordinator should stop.
    fn handle_control(&mut self, msg: ControlMsg) -> bool {
        match msg {
            ControlMsg::Toggle => {
                if self.mode.toggle() == ModeState::Off {
                    self.on_mode_off();
                }
            }
            ControlMsg::TurnOn => {
                let _ = self.mode.turn_on();
            }
            ControlMsg::TurnOff => {
                if self.mode.turn_off().is_some() {
                    self.on_mode_off();
                }
            }
            ControlMsg::SetSegmenter(config) => match config.validate() {
                Ok(()) => {
                    self.detector.set_threshold(config.energy_threshold);
                    self.segmenter.set_config(config);
                }
                Err(e) => {
                    self.reporter.report(
                        "coordinator",
                        &PipelineError::Recoverable(format!("reconfiguration rejected: {e}")),
                    );
                }
            },
            ControlMsg::SetTranslator(translator) => {
                self.translator = translator;
            }
            ControlMsg::Shutdown => {
                self.flush();
                return true;
            }
        }
        false
    }

    /// One chunk through the gate and the segmenter.
    fn process_chunk(&mut self, chunk: AudioChunk) {
        if !self.mode.is_on() {
            return;
        }
        let voice = chunk
            .voice
            .unwrap_or_else(|| self.detector.classify(&chunk.samples));
        if let Some(segment) = self.segmenter.process(&chunk.samples, voice) {
            self.dispatch(segment);
        }
    }

    /// Submits a finalized segment to the worker pool, tagged with the
    /// current epoch and the next sequence number.
    fn dispatch(&mut self, segment: AudioSegment) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let job = UtteranceJob {
            segment,
            epoch: self.epoch.load(Ordering::Acquire),
            seq,
            transcriber: Arc::clone(&self.transcriber),
            translator: Arc::clone(&self.translator),
        };

        if self.job_tx.try_send(job).is_err() {
            // Bounded memory beats completeness: drop the segment, release
            // its sequence number so ordered delivery does not stall.
            self.hub.skip(seq);
            self.reporter.report(
                "coordinator",
                &PipelineError::Recoverable("worker queue full, segment dropped".to_string()),
            );
        }
    }

    /// OFF transition: invalidate in-flight work, caption the utterance that
    /// was still accumulating, wipe the overlay.
    fn on_mode_off(&mut self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
        // Dispatched after the increment, the flushed segment carries the
        // epoch active at dispatch time and survives the stale check.
        if let Some(segment) = self.segmenter.force_finalize() {
            self.dispatch(segment);
        }
        self.segmenter.reset();
        self.hub.publish(&SubtitleEvent::clear(
            &self.config.target_language,
            &self.config.source_label,
        ));
    }

    /// Finalizes and dispatches any in-progress utterance.
    fn flush(&mut self) {
        if let Some(segment) = self.segmenter.force_finalize() {
            self.dispatch(segment);
        }
    }
}
