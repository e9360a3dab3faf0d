//! Composition root: wires capture, pipeline, engines, broadcast and the
//! control socket into a running daemon.

use crate::audio::capture::CaptureSource;
use crate::broadcast::{BroadcastHub, StdoutSubscriber};
use crate::config::{Config, SttConfig, TranslateConfig};
use crate::engines::{IdentityTranslator, MockTranscriber, MockTranslator, Transcriber, Translator};
use crate::error::{Result, SubcastError};
use crate::ipc::server::{CommandHandler, IpcServer};
use crate::ipc::{Command, Response};
use crate::pipeline::{Pipeline, PipelineController};
use crate::segment::SegmenterConfig;
use crate::trigger::ToggleKey;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Runtime-tunable overlay settings, exposed through the control surface.
#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub subtitle_ttl_s: f64,
    pub max_lines: u32,
    pub toggle_key: ToggleKey,
}

/// Builds the speech-to-text engine named in the configuration.
pub fn build_transcriber(config: &SttConfig) -> Result<Arc<dyn Transcriber>> {
    match config.engine.as_str() {
        "mock" => Ok(Arc::new(
            MockTranscriber::new("mock").with_response("mock transcription"),
        )),
        #[cfg(feature = "whisper")]
        "whisper" => {
            let whisper = crate::engines::WhisperTranscriber::new(crate::engines::WhisperConfig {
                model_path: PathBuf::from(&config.model),
                language: config.language.clone(),
                threads: None,
            })?;
            Ok(Arc::new(whisper))
        }
        #[cfg(not(feature = "whisper"))]
        "whisper" => Err(SubcastError::ConfigInvalidValue {
            key: "stt.engine".to_string(),
            message: "this build has no whisper support; rebuild with --features whisper"
                .to_string(),
        }),
        other => Err(SubcastError::ConfigInvalidValue {
            key: "stt.engine".to_string(),
            message: format!("unknown engine '{}', supported: mock, whisper", other),
        }),
    }
}

/// Builds the translation engine named by `engine`.
pub fn build_translator(engine: &str, config: &TranslateConfig) -> Result<Arc<dyn Translator>> {
    match engine {
        "none" => Ok(Arc::new(IdentityTranslator)),
        "mock" => Ok(Arc::new(MockTranslator::new("[t] "))),
        #[cfg(feature = "http-translate")]
        "http" => {
            let http = crate::engines::HttpTranslator::new(
                &config.url,
                // Source language is resolved by the endpoint when "auto".
                "auto",
                &config.target_language,
                config.api_key.as_deref(),
            )?;
            Ok(Arc::new(http))
        }
        #[cfg(not(feature = "http-translate"))]
        "http" => Err(SubcastError::ConfigInvalidValue {
            key: "translate.engine".to_string(),
            message: "this build has no HTTP translation; rebuild with --features http-translate"
                .to_string(),
        }),
        other => Err(SubcastError::ConfigInvalidValue {
            key: "translate.engine".to_string(),
            message: format!("unknown engine '{}', supported: none, mock, http", other),
        }),
    }
}

/// Builds the capture source: a WAV replay when `wav` is given, otherwise
/// the configured microphone.
pub fn build_capture(
    config: &Config,
    wav: Option<&std::path::Path>,
) -> Result<Box<dyn CaptureSource>> {
    if let Some(path) = wav {
        let source = crate::audio::WavFileSource::open(path, config.audio.sample_rate)?;
        return Ok(Box::new(source));
    }
    microphone_capture(config)
}

#[cfg(feature = "cpal-audio")]
fn microphone_capture(config: &Config) -> Result<Box<dyn CaptureSource>> {
    Ok(Box::new(crate::audio::CpalCaptureSource::new(
        config.audio.device.as_deref(),
        config.audio.sample_rate,
    )))
}

#[cfg(not(feature = "cpal-audio"))]
fn microphone_capture(_config: &Config) -> Result<Box<dyn CaptureSource>> {
    Err(SubcastError::ConfigInvalidValue {
        key: "audio.device".to_string(),
        message: "this build has no microphone support; rebuild with --features cpal-audio or pass --wav"
            .to_string(),
    })
}

/// Command handler bridging the control socket to the running pipeline.
pub struct ControlHandler {
    controller: PipelineController,
    hub: Arc<BroadcastHub>,
    segmenter: RwLock<SegmenterConfig>,
    settings: RwLock<OverlaySettings>,
    translate: TranslateConfig,
    shutdown_tx: tokio::sync::mpsc::Sender<()>,
}

impl ControlHandler {
    pub fn new(
        controller: PipelineController,
        hub: Arc<BroadcastHub>,
        config: &Config,
        shutdown_tx: tokio::sync::mpsc::Sender<()>,
    ) -> Self {
        let toggle_key =
            ToggleKey::from_name(&config.control.toggle_key).unwrap_or(ToggleKey::F11);
        Self {
            controller,
            hub,
            segmenter: RwLock::new(config.segmenter),
            settings: RwLock::new(OverlaySettings {
                subtitle_ttl_s: config.overlay.subtitle_ttl_s,
                max_lines: config.overlay.max_lines,
                toggle_key,
            }),
            translate: config.translate.clone(),
            shutdown_tx,
        }
    }

    fn status(&self) -> Response {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());
        Response::Status {
            mode: if self.controller.is_on() {
                "on".to_string()
            } else {
                "off".to_string()
            },
            epoch: self.controller.epoch(),
            subscribers: self.hub.subscriber_count(),
            dropped_chunks: self.controller.dropped_chunks(),
            subtitle_ttl_s: settings.subtitle_ttl_s,
            max_lines: settings.max_lines,
            toggle_key: settings.toggle_key.name().to_string(),
        }
    }

    fn set(&self, key: &str, value: &str) -> Response {
        let result = match key {
            "silence_threshold_ms" => self.set_silence_threshold(value),
            "subtitle_ttl_s" => self.set_subtitle_ttl(value),
            "max_lines" => self.set_max_lines(value),
            "toggle_key" => self.set_toggle_key(value),
            "translation_engine" => self.set_translation_engine(value),
            other => Err(SubcastError::ConfigInvalidValue {
                key: other.to_string(),
                message: "recognized keys: silence_threshold_ms, subtitle_ttl_s, max_lines, \
                          toggle_key, translation_engine"
                    .to_string(),
            }),
        };
        match result {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }

    fn set_silence_threshold(&self, value: &str) -> Result<()> {
        let ms: u32 = value.parse().map_err(|_| SubcastError::ConfigInvalidValue {
            key: "silence_threshold_ms".to_string(),
            message: format!("'{}' is not a valid integer", value),
        })?;
        let mut current = self.segmenter.write().unwrap_or_else(|e| e.into_inner());
        let updated = SegmenterConfig {
            silence_threshold_ms: ms,
            ..*current
        };
        // The controller validates before sending; only an accepted config
        // is remembered.
        self.controller.set_segmenter_config(updated)?;
        *current = updated;
        Ok(())
    }

    fn set_subtitle_ttl(&self, value: &str) -> Result<()> {
        let ttl: f64 = value.parse().map_err(|_| SubcastError::ConfigInvalidValue {
            key: "subtitle_ttl_s".to_string(),
            message: format!("'{}' is not a valid number", value),
        })?;
        if ttl <= 0.0 {
            return Err(SubcastError::ConfigInvalidValue {
                key: "subtitle_ttl_s".to_string(),
                message: "must be positive".to_string(),
            });
        }
        self.settings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .subtitle_ttl_s = ttl;
        Ok(())
    }

    fn set_max_lines(&self, value: &str) -> Result<()> {
        let lines: u32 = value.parse().map_err(|_| SubcastError::ConfigInvalidValue {
            key: "max_lines".to_string(),
            message: format!("'{}' is not a valid integer", value),
        })?;
        if lines == 0 {
            return Err(SubcastError::ConfigInvalidValue {
                key: "max_lines".to_string(),
                message: "must be positive".to_string(),
            });
        }
        self.settings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .max_lines = lines;
        Ok(())
    }

    fn set_toggle_key(&self, value: &str) -> Result<()> {
        let key = ToggleKey::from_name(value).ok_or_else(|| SubcastError::ConfigInvalidValue {
            key: "toggle_key".to_string(),
            message: format!(
                "unknown key '{}', supported: {}",
                value,
                ToggleKey::supported_names().join(", ")
            ),
        })?;
        self.settings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .toggle_key = key;
        Ok(())
    }

    fn set_translation_engine(&self, value: &str) -> Result<()> {
        let translator = build_translator(value, &self.translate)?;
        self.controller.set_translator(translator)
    }
}

#[async_trait::async_trait]
impl CommandHandler for ControlHandler {
    async fn handle(&self, command: Command) -> Response {
        match command {
            Command::Toggle => match self.controller.toggle() {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            },
            Command::On => match self.controller.turn_on() {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            },
            Command::Off => match self.controller.turn_off() {
                Ok(()) => Response::Ok,
                Err(e) => Response::Error {
                    message: e.to_string(),
                },
            },
            Command::Status => self.status(),
            Command::Set { key, value } => self.set(&key, &value),
            Command::Shutdown => {
                let _ = self.shutdown_tx.send(()).await;
                Response::Ok
            }
        }
    }
}

/// The daemon: runs the pipeline and serves the control socket until a
/// shutdown command or Ctrl-C.
pub struct App;

impl App {
    /// Runs with the given configuration. `wav` switches the capture source
    /// to file replay.
    pub async fn run(config: Config, wav: Option<PathBuf>) -> Result<()> {
        config.validate()?;

        let hub = Arc::new(BroadcastHub::new(Duration::from_millis(
            config.pipeline.reorder_timeout_ms,
        )));
        hub.subscribe(Arc::new(StdoutSubscriber));

        let transcriber = build_transcriber(&config.stt)?;
        let translator = build_translator(&config.translate.engine, &config.translate)?;
        let capture = build_capture(&config, wav.as_deref())?;

        let pipeline = Pipeline::new(config.to_coordinator_config());
        let handle = pipeline.start(capture, transcriber, translator, Arc::clone(&hub))?;
        let controller = handle.controller();

        let socket_path = config
            .control
            .socket_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(IpcServer::default_socket_path);

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel(1);
        let server = Arc::new(IpcServer::new(socket_path));
        let handler = ControlHandler::new(controller, Arc::clone(&hub), &config, shutdown_tx);

        eprintln!("subcast: control socket at {}", server.socket_path().display());
        eprintln!("subcast: captioning is off — run `subcast toggle` to start");

        let mut server_task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.start(handler).await })
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                eprintln!("subcast: interrupted, shutting down");
            }
            _ = shutdown_rx.recv() => {
                eprintln!("subcast: shutdown requested");
            }
            result = &mut server_task => {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => return Err(e),
                    Err(e) => return Err(SubcastError::Other(format!("control server panicked: {e}"))),
                }
            }
        }

        server.stop()?;
        server_task.abort();
        handle.stop();
        Ok(())
    }
}
