//! End-to-end pipeline tests through the public API: capture source in,
//! subtitle events out.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use subcast::audio::capture::CaptureSource;
use subcast::broadcast::{BroadcastHub, CollectorSubscriber};
use subcast::engines::{MockTranscriber, MockTranslator, Transcriber};
use subcast::error::Result;
use subcast::events::SubtitleEvent;
use subcast::pipeline::{CoordinatorConfig, Pipeline};
use subcast::segment::SegmenterConfig;

const CHUNK_SAMPLES: usize = 1600;

/// Segmentation timing scaled down so wall-clock tests stay fast.
fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        segmenter: SegmenterConfig {
            energy_threshold: 0.01,
            silence_threshold_ms: 80,
            max_segment_length_s: 10.0,
            min_speech_duration_ms: 20,
        },
        engine_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

/// Infinite capture source: a fixed number of voiced batches, then silence
/// forever. Mimics a microphone that heard one utterance.
struct OneUtteranceSource {
    voiced_remaining: usize,
    started: bool,
}

impl OneUtteranceSource {
    fn new(voiced_batches: usize) -> Self {
        Self {
            voiced_remaining: voiced_batches,
            started: false,
        }
    }
}

impl CaptureSource for OneUtteranceSource {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.voiced_remaining > 0 {
            self.voiced_remaining -= 1;
            Ok(vec![3000i16; CHUNK_SAMPLES])
        } else {
            Ok(vec![0i16; CHUNK_SAMPLES])
        }
    }
}

/// Transcriber that signals when a call enters and blocks until released.
struct GatedTranscriber {
    entered_tx: crossbeam_channel::Sender<()>,
    gate_rx: crossbeam_channel::Receiver<()>,
    response: String,
}

impl Transcriber for GatedTranscriber {
    fn transcribe(&self, _audio: &[i16]) -> Result<String> {
        let _ = self.entered_tx.send(());
        let _ = self.gate_rx.recv();
        Ok(self.response.clone())
    }

    fn model_name(&self) -> &str {
        "gated"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

fn wait_until(deadline: Duration, mut check: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn utterance_is_captioned_while_on() {
    let hub = Arc::new(BroadcastHub::new(Duration::from_secs(3)));
    let collector = Arc::new(CollectorSubscriber::new());
    hub.subscribe(collector.clone());

    let handle = Pipeline::new(fast_config())
        .start(
            Box::new(OneUtteranceSource::new(40)),
            Arc::new(MockTranscriber::new("m").with_response("hello stream")),
            Arc::new(MockTranslator::new("pt:")),
            Arc::clone(&hub),
        )
        .expect("pipeline should start");

    let controller = handle.controller();
    controller.turn_on().expect("send should succeed");

    let arrived = wait_until(Duration::from_secs(5), || {
        collector
            .events()
            .iter()
            .any(|e| matches!(e, SubtitleEvent::Final { .. }))
    });
    assert!(arrived, "expected a final caption, got {:?}", collector.events());

    let finals: Vec<_> = collector
        .events()
        .into_iter()
        .filter(|e| matches!(e, SubtitleEvent::Final { .. }))
        .collect();
    assert_eq!(finals[0].text(), "pt:hello stream");

    handle.stop();
}

#[test]
fn silence_produces_no_captions() {
    let hub = Arc::new(BroadcastHub::new(Duration::from_secs(3)));
    let collector = Arc::new(CollectorSubscriber::new());
    hub.subscribe(collector.clone());

    // 16 chunks of pure silence (1.6s of audio).
    let handle = Pipeline::new(fast_config())
        .start(
            Box::new(OneUtteranceSource::new(0)),
            Arc::new(MockTranscriber::new("m").with_response("phantom")),
            Arc::new(MockTranslator::new("pt:")),
            Arc::clone(&hub),
        )
        .expect("pipeline should start");

    let controller = handle.controller();
    controller.turn_on().expect("send should succeed");

    std::thread::sleep(Duration::from_millis(600));
    assert!(
        collector.events().is_empty(),
        "silence must never produce captions, got {:?}",
        collector.events()
    );

    handle.stop();
}

#[test]
fn captions_are_suppressed_while_off() {
    let hub = Arc::new(BroadcastHub::new(Duration::from_secs(3)));
    let collector = Arc::new(CollectorSubscriber::new());
    hub.subscribe(collector.clone());

    let handle = Pipeline::new(fast_config())
        .start(
            Box::new(OneUtteranceSource::new(40)),
            Arc::new(MockTranscriber::new("m").with_response("dropped")),
            Arc::new(MockTranslator::new("pt:")),
            Arc::clone(&hub),
        )
        .expect("pipeline should start");

    // Mode stays OFF: the voiced audio streams through and is discarded.
    std::thread::sleep(Duration::from_millis(800));
    assert!(collector.events().is_empty());

    handle.stop();
}

#[test]
fn toggle_off_mid_utterance_flushes_caption_then_clears() {
    let hub = Arc::new(BroadcastHub::new(Duration::from_secs(3)));
    let collector = Arc::new(CollectorSubscriber::new());
    hub.subscribe(collector.clone());

    // Long utterance: voice keeps flowing until we toggle off.
    let handle = Pipeline::new(fast_config())
        .start(
            Box::new(OneUtteranceSource::new(100_000)),
            Arc::new(MockTranscriber::new("m").with_response("spoken up to the toggle")),
            Arc::new(MockTranslator::new("pt:")),
            Arc::clone(&hub),
        )
        .expect("pipeline should start");

    let controller = handle.controller();
    controller.turn_on().expect("send should succeed");

    // Let the utterance accumulate, then cut it off.
    std::thread::sleep(Duration::from_millis(400));
    controller.toggle().expect("send should succeed");

    let done = wait_until(Duration::from_secs(5), || {
        let events = collector.events();
        let finals = events
            .iter()
            .filter(|e| matches!(e, SubtitleEvent::Final { .. }))
            .count();
        let clears = events
            .iter()
            .filter(|e| matches!(e, SubtitleEvent::Clear { .. }))
            .count();
        finals == 1 && clears == 1
    });
    assert!(
        done,
        "expected exactly one final and one clear, got {:?}",
        collector.events()
    );
    assert_eq!(controller.epoch(), 1);

    handle.stop();
}

#[test]
fn result_completing_after_two_epoch_advances_is_dropped() {
    let hub = Arc::new(BroadcastHub::new(Duration::from_secs(3)));
    let collector = Arc::new(CollectorSubscriber::new());
    hub.subscribe(collector.clone());

    let (entered_tx, entered_rx) = crossbeam_channel::bounded(4);
    let (gate_tx, gate_rx) = crossbeam_channel::bounded(4);

    let handle = Pipeline::new(fast_config())
        .start(
            Box::new(OneUtteranceSource::new(40)),
            Arc::new(GatedTranscriber {
                entered_tx,
                gate_rx,
                response: "from a past epoch".to_string(),
            }),
            Arc::new(MockTranslator::new("pt:")),
            Arc::clone(&hub),
        )
        .expect("pipeline should start");

    let controller = handle.controller();
    controller.turn_on().expect("send should succeed");

    // Wait until the utterance's transcription is actually in flight.
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("transcription should start");

    // OFF → ON → OFF: the epoch advances twice past the in-flight work.
    controller.toggle().expect("send should succeed");
    controller.toggle().expect("send should succeed");
    controller.toggle().expect("send should succeed");
    assert!(wait_until(Duration::from_secs(2), || controller.epoch() == 2));

    // Release the transcriber; its result is now two epochs stale.
    gate_tx.send(()).expect("gate should accept");

    std::thread::sleep(Duration::from_millis(300));
    let events = collector.events();
    assert!(
        !events.iter().any(|e| matches!(e, SubtitleEvent::Final { .. })),
        "stale caption must not surface, got {events:?}"
    );
    // Both OFF transitions cleared the overlay.
    let clears = events
        .iter()
        .filter(|e| matches!(e, SubtitleEvent::Clear { .. }))
        .count();
    assert_eq!(clears, 2);

    // Unblock any remaining gated calls so shutdown is quick.
    let _ = gate_tx.send(());
    handle.stop();
}

#[test]
fn wav_replay_is_captioned_after_exhaustion_flush() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("utterance.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).expect("create wav");
    // Half a second of silence, then one second of tone.
    for _ in 0..8000 {
        writer.write_sample(0i16).expect("write");
    }
    for i in 0..16000u32 {
        let sample = if i % 8 < 4 { 3000i16 } else { -3000i16 };
        writer.write_sample(sample).expect("write");
    }
    writer.finalize().expect("finalize");

    let hub = Arc::new(BroadcastHub::new(Duration::from_secs(3)));
    let collector = Arc::new(CollectorSubscriber::new());
    hub.subscribe(collector.clone());

    let source = subcast::audio::WavFileSource::open(&path, 16000).expect("open wav");
    let handle = Pipeline::new(fast_config())
        .start(
            Box::new(source),
            Arc::new(MockTranscriber::new("m").with_response("from the file")),
            Arc::new(MockTranslator::new("pt:")),
            Arc::clone(&hub),
        )
        .expect("pipeline should start");

    let controller = handle.controller();
    controller.turn_on().expect("send should succeed");

    // The file ends while the utterance is still open; the coordinator
    // flushes it on capture exhaustion.
    let arrived = wait_until(Duration::from_secs(5), || {
        collector
            .events()
            .iter()
            .any(|e| e.text() == "pt:from the file")
    });
    assert!(arrived, "expected flushed caption, got {:?}", collector.events());

    handle.stop();
}

#[test]
fn dropped_chunk_counter_stays_zero_under_light_load() {
    let hub = Arc::new(BroadcastHub::new(Duration::from_secs(3)));
    let handle = Pipeline::new(fast_config())
        .start(
            Box::new(OneUtteranceSource::new(5)),
            Arc::new(MockTranscriber::new("m")),
            Arc::new(MockTranslator::new("pt:")),
            hub,
        )
        .expect("pipeline should start");

    std::thread::sleep(Duration::from_millis(300));
    assert_eq!(handle.controller().dropped_chunks(), 0);
    handle.stop();
}

#[test]
fn failing_subscriber_does_not_stall_the_pipeline() {
    struct FlakySubscriber {
        calls: AtomicUsize,
    }
    impl subcast::broadcast::Subscriber for FlakySubscriber {
        fn send(&self, _frame: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(subcast::SubcastError::Delivery {
                message: "gone".to_string(),
            })
        }
        fn name(&self) -> &str {
            "flaky"
        }
    }

    let hub = Arc::new(BroadcastHub::new(Duration::from_secs(3)));
    let collector = Arc::new(CollectorSubscriber::new());
    let flaky = Arc::new(FlakySubscriber {
        calls: AtomicUsize::new(0),
    });
    hub.subscribe(collector.clone());
    hub.subscribe(flaky.clone());

    let handle = Pipeline::new(fast_config())
        .start(
            Box::new(OneUtteranceSource::new(40)),
            Arc::new(MockTranscriber::new("m").with_response("resilient")),
            Arc::new(MockTranslator::new("pt:")),
            Arc::clone(&hub),
        )
        .expect("pipeline should start");

    let controller = handle.controller();
    controller.turn_on().expect("send should succeed");

    let arrived = wait_until(Duration::from_secs(5), || !collector.events().is_empty());
    assert!(arrived);

    // The flaky subscriber was tried exactly once, then removed.
    assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    assert_eq!(hub.subscriber_count(), 1);

    handle.stop();
}
