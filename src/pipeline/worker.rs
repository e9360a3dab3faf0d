//! Bounded worker pool for utterance processing.
//!
//! Each job runs transcription then translation, both under a deadline, and
//! resolves its sequence number exactly once: with a published caption or
//! with a skip. The epoch gate is checked immediately before every publish
//! so results from before a mode-off transition never surface.

use crate::broadcast::BroadcastHub;
use crate::engines::{Transcriber, Translator};
use crate::events::SubtitleEvent;
use crate::pipeline::error::{ErrorReporter, PipelineError};
use crate::segment::AudioSegment;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One dispatched utterance with the engines it was dispatched with.
///
/// Engines are captured at dispatch time so reconfiguration never affects
/// in-flight work.
pub(crate) struct UtteranceJob {
    pub segment: AudioSegment,
    pub epoch: u64,
    pub seq: u64,
    pub transcriber: Arc<dyn Transcriber>,
    pub translator: Arc<dyn Translator>,
}

/// Shared context for all workers.
pub(crate) struct WorkerContext {
    pub hub: Arc<BroadcastHub>,
    pub current_epoch: Arc<AtomicU64>,
    pub reporter: Arc<dyn ErrorReporter>,
    pub engine_timeout: Duration,
    pub emit_partials: bool,
    pub source_language: String,
    pub target_language: String,
    pub source_label: String,
}

/// Spawns `workers` threads consuming from a bounded job queue.
///
/// Returns the job sender (dropping it stops the pool once the queue drains)
/// and the worker join handles.
pub(crate) fn spawn_pool(
    workers: usize,
    queue: usize,
    ctx: WorkerContext,
) -> (Sender<UtteranceJob>, Vec<JoinHandle<()>>) {
    let (job_tx, job_rx) = bounded::<UtteranceJob>(queue);
    let ctx = Arc::new(ctx);

    let handles = (0..workers)
        .map(|_| {
            let job_rx: Receiver<UtteranceJob> = job_rx.clone();
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    process_utterance(job, &ctx);
                }
            })
        })
        .collect();

    (job_tx, handles)
}

/// Runs a blocking engine call on a helper thread, abandoning it when the
/// deadline expires. An abandoned call finishes (or hangs) on its detached
/// thread; its late result is discarded.
fn run_with_deadline<T, F>(deadline: Duration, f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = bounded(1);
    thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(deadline).ok()
}

fn process_utterance(job: UtteranceJob, ctx: &WorkerContext) {
    let UtteranceJob {
        segment,
        epoch,
        seq,
        transcriber,
        translator,
    } = job;

    let samples = segment.samples;
    let text = match run_with_deadline(ctx.engine_timeout, move || transcriber.transcribe(&samples))
    {
        Some(Ok(text)) => text,
        Some(Err(e)) => {
            ctx.reporter.report(
                "worker",
                &PipelineError::Recoverable(format!("transcription failed, segment dropped: {e}")),
            );
            ctx.hub.skip(seq);
            return;
        }
        None => {
            ctx.reporter.report(
                "worker",
                &PipelineError::Recoverable(format!(
                    "transcription exceeded {:?}, segment dropped",
                    ctx.engine_timeout
                )),
            );
            ctx.hub.skip(seq);
            return;
        }
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        ctx.hub.skip(seq);
        return;
    }

    // Stale check: the mode was toggled off after this segment was
    // dispatched, so its caption must not surface.
    if ctx.current_epoch.load(Ordering::Acquire) != epoch {
        ctx.hub.skip(seq);
        return;
    }

    if ctx.emit_partials {
        ctx.hub
            .publish(&SubtitleEvent::partial(&text, &ctx.source_language, &ctx.source_label));
    }

    let input = text.clone();
    let translator_for_call = Arc::clone(&translator);
    let translated =
        match run_with_deadline(ctx.engine_timeout, move || translator_for_call.translate(&input)) {
            Some(Ok(translated)) => translated,
            Some(Err(e)) => {
                ctx.reporter.report(
                    "worker",
                    &PipelineError::Recoverable(format!(
                        "translation failed, segment dropped: {e}"
                    )),
                );
                ctx.hub.skip(seq);
                return;
            }
            None => {
                ctx.reporter.report(
                    "worker",
                    &PipelineError::Recoverable(format!(
                        "translation exceeded {:?}, segment dropped",
                        ctx.engine_timeout
                    )),
                );
                ctx.hub.skip(seq);
                return;
            }
        };

    let translated = translated.trim().to_string();
    if translated.is_empty() {
        ctx.hub.skip(seq);
        return;
    }

    if ctx.current_epoch.load(Ordering::Acquire) != epoch {
        ctx.hub.skip(seq);
        return;
    }

    ctx.hub.publish_sequenced(
        seq,
        SubtitleEvent::final_event(&translated, &ctx.target_language, &ctx.source_label),
    );
}
