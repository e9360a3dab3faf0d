//! Audio capture sources.
//!
//! The capture boundary delivers PCM16 mono samples by polling; the pipeline
//! owns the chunking and the drop-on-overflow policy. Sources must return
//! promptly from `read_samples`, never blocking on device internals.

use crate::error::{Result, SubcastError};
use std::collections::VecDeque;

#[cfg(feature = "cpal-audio")]
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
#[cfg(feature = "cpal-audio")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "cpal-audio")]
use std::sync::{Arc, Mutex};

/// Trait for capture devices feeding the pipeline.
///
/// This trait allows swapping implementations (real microphone, WAV replay,
/// mock).
pub trait CaptureSource: Send {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Read whatever samples have accumulated since the last call.
    ///
    /// An empty vector from a live source means "nothing yet"; from a finite
    /// source it means exhaustion.
    fn read_samples(&mut self) -> Result<Vec<i16>>;

    /// Whether this source ends on its own (file/pipe) rather than running
    /// until stopped (microphone).
    fn is_finite(&self) -> bool {
        false
    }
}

/// Mock capture source for testing: serves scripted sample batches.
#[derive(Debug, Clone, Default)]
pub struct MockCaptureSource {
    batches: VecDeque<Vec<i16>>,
    started: bool,
    fail_start: bool,
    fail_read: bool,
}

impl MockCaptureSource {
    /// Creates an empty mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a batch of samples to serve from one `read_samples` call.
    pub fn push_batch(&mut self, samples: Vec<i16>) {
        self.batches.push_back(samples);
    }

    /// Builder form of `push_batch`.
    pub fn with_batch(mut self, samples: Vec<i16>) -> Self {
        self.push_batch(samples);
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.fail_start = true;
        self
    }

    /// Configure the mock to fail on every read.
    pub fn with_read_failure(mut self) -> Self {
        self.fail_read = true;
        self
    }

    /// Whether `start` has been called.
    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl CaptureSource for MockCaptureSource {
    fn start(&mut self) -> Result<()> {
        if self.fail_start {
            return Err(SubcastError::Capture {
                message: "mock start failure".to_string(),
            });
        }
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.fail_read {
            return Err(SubcastError::Capture {
                message: "mock read failure".to_string(),
            });
        }
        Ok(self.batches.pop_front().unwrap_or_default())
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Finite capture source replaying a WAV file.
///
/// Useful for captioning pre-recorded audio and for end-to-end testing
/// without a microphone.
pub struct WavFileSource {
    samples: VecDeque<i16>,
    block: usize,
    started: bool,
}

impl WavFileSource {
    /// Opens a 16-bit WAV file, mixing multi-channel audio down to mono.
    ///
    /// The file's sample rate must match `expected_rate`; resampling is not
    /// performed.
    pub fn open(path: &std::path::Path, expected_rate: u32) -> Result<Self> {
        let mut reader = hound::WavReader::open(path).map_err(|e| SubcastError::Capture {
            message: format!("failed to open {}: {}", path.display(), e),
        })?;
        let spec = reader.spec();

        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(SubcastError::AudioFormatMismatch {
                expected: "16-bit signed PCM".to_string(),
                actual: format!("{}-bit {:?}", spec.bits_per_sample, spec.sample_format),
            });
        }
        if spec.sample_rate != expected_rate {
            return Err(SubcastError::AudioFormatMismatch {
                expected: format!("{} Hz", expected_rate),
                actual: format!("{} Hz", spec.sample_rate),
            });
        }

        let channels = spec.channels as usize;
        let raw: Vec<i16> = reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| SubcastError::Capture {
                message: format!("failed to decode {}: {}", path.display(), e),
            })?;

        let mono: VecDeque<i16> = if channels <= 1 {
            raw.into()
        } else {
            raw.chunks_exact(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / channels as i32) as i16
                })
                .collect()
        };

        Ok(Self {
            samples: mono,
            // One read returns 100ms of audio, matching live capture pacing.
            block: (expected_rate / 10) as usize,
            started: false,
        })
    }

    /// Remaining samples not yet served.
    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl CaptureSource for WavFileSource {
    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        let take = self.block.min(self.samples.len());
        Ok(self.samples.drain(..take).collect())
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is created, started and dropped only from the capture
/// thread that owns this source; it never crosses threads while alive.
#[cfg(feature = "cpal-audio")]
struct SendableStream(cpal::Stream);

#[cfg(feature = "cpal-audio")]
unsafe impl Send for SendableStream {}

/// Microphone capture via cpal.
///
/// Requests mono PCM at the target rate; the device callback appends
/// converted samples to a shared buffer drained by `read_samples`.
#[cfg(feature = "cpal-audio")]
pub struct CpalCaptureSource {
    device_name: Option<String>,
    sample_rate: u32,
    stream: Option<SendableStream>,
    buffer: Arc<Mutex<Vec<i16>>>,
    failed: Arc<AtomicBool>,
}

#[cfg(feature = "cpal-audio")]
impl CpalCaptureSource {
    /// Creates a capture source for the named device, or the default input
    /// device when `device_name` is `None`.
    pub fn new(device_name: Option<&str>, sample_rate: u32) -> Self {
        Self {
            device_name: device_name.map(|s| s.to_string()),
            sample_rate,
            stream: None,
            buffer: Arc::new(Mutex::new(Vec::new())),
            failed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn find_device(&self) -> Result<cpal::Device> {
        let host = cpal::default_host();
        match &self.device_name {
            Some(name) => {
                let mut devices = host.input_devices().map_err(|e| SubcastError::Capture {
                    message: format!("failed to enumerate input devices: {}", e),
                })?;
                devices
                    .find(|d| d.name().map(|n| n == *name).unwrap_or(false))
                    .ok_or_else(|| SubcastError::CaptureDeviceNotFound {
                        device: name.clone(),
                    })
            }
            None => host
                .default_input_device()
                .ok_or_else(|| SubcastError::CaptureDeviceNotFound {
                    device: "default".to_string(),
                }),
        }
    }

    /// Lists the names of available input devices.
    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        match host.input_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(feature = "cpal-audio")]
impl CaptureSource for CpalCaptureSource {
    fn start(&mut self) -> Result<()> {
        let device = self.find_device()?;
        let default_config = device
            .default_input_config()
            .map_err(|e| SubcastError::Capture {
                message: format!("failed to query device config: {}", e),
            })?;

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let buffer = Arc::clone(&self.buffer);
        let failed = Arc::clone(&self.failed);
        let err_fn = move |e: cpal::StreamError| {
            eprintln!("subcast: audio stream error: {}", e);
            failed.store(true, Ordering::SeqCst);
        };

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::I16 => device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        let mut buf = buffer.lock().unwrap_or_else(|e| e.into_inner());
                        buf.extend_from_slice(data);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| SubcastError::Capture {
                    message: format!("failed to build input stream: {}", e),
                })?,
            _ => device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        let mut buf = buffer.lock().unwrap_or_else(|e| e.into_inner());
                        buf.extend(
                            data.iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16),
                        );
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| SubcastError::Capture {
                    message: format!("failed to build input stream: {}", e),
                })?,
        };

        stream.play().map_err(|e| SubcastError::Capture {
            message: format!("failed to start input stream: {}", e),
        })?;

        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.stream = None;
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(SubcastError::Capture {
                message: "audio stream reported an error".to_string(),
            });
        }
        let mut buf = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        Ok(std::mem::take(&mut *buf))
    }
}
