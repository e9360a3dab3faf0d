//! Application configuration.
//!
//! Loaded from TOML with per-section defaults, then environment overrides.
//! Every value is validated at startup and on reconfiguration; invalid
//! values are rejected, never silently defaulted mid-run.

use crate::defaults;
use crate::error::{Result, SubcastError};
use crate::pipeline::CoordinatorConfig;
use crate::segment::SegmenterConfig;
use crate::trigger::ToggleKey;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
#[cfg(feature = "cli")]
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub segmenter: SegmenterConfig,
    pub pipeline: PipelineConfig,
    pub stt: SttConfig,
    pub translate: TranslateConfig,
    pub overlay: OverlayConfig,
    pub control: ControlConfig,
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture device name (None = system default).
    pub device: Option<String>,
    pub sample_rate: u32,
    pub chunk_duration_ms: u32,
}

/// Pipeline sizing and timing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub workers: usize,
    pub chunk_queue: usize,
    pub job_queue: usize,
    pub engine_timeout_s: u64,
    pub reorder_timeout_ms: u64,
    pub emit_partials: bool,
}

/// Speech-to-text engine selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// "mock" or "whisper".
    pub engine: String,
    pub model: String,
    pub language: String,
}

/// Translation engine selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslateConfig {
    /// "none", "mock" or "http".
    pub engine: String,
    pub url: String,
    pub api_key: Option<String>,
    pub target_language: String,
}

/// Overlay display tunables, forwarded to subscribers via the control
/// surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    pub subtitle_ttl_s: f64,
    pub max_lines: u32,
}

/// Control surface configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    /// Control socket path (None = runtime-dir default).
    pub socket_path: Option<String>,
    pub toggle_key: String,
    /// Label identifying this capture source in events.
    pub source_label: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            chunk_duration_ms: defaults::CHUNK_DURATION_MS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKER_THREADS,
            chunk_queue: defaults::CHUNK_QUEUE,
            job_queue: defaults::JOB_QUEUE,
            engine_timeout_s: defaults::ENGINE_TIMEOUT_S,
            reorder_timeout_ms: defaults::REORDER_TIMEOUT_MS,
            emit_partials: false,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            engine: "whisper".to_string(),
            model: "models/ggml-base.bin".to_string(),
            language: defaults::SOURCE_LANGUAGE.to_string(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            engine: "none".to_string(),
            url: "http://127.0.0.1:5000/translate".to_string(),
            api_key: None,
            target_language: defaults::TARGET_LANGUAGE.to_string(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            subtitle_ttl_s: defaults::SUBTITLE_TTL_S,
            max_lines: defaults::MAX_LINES,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: None,
            toggle_key: defaults::TOGGLE_KEY.to_string(),
            source_label: defaults::SOURCE_LABEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields use default values; invalid TOML is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SubcastError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                SubcastError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults only when the file is
    /// missing. Invalid TOML still fails.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(SubcastError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides.
    ///
    /// Supported:
    /// - SUBCAST_MODEL → stt.model
    /// - SUBCAST_LANGUAGE → stt.language
    /// - SUBCAST_AUDIO_DEVICE → audio.device
    /// - SUBCAST_TRANSLATE_URL → translate.url
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("SUBCAST_MODEL")
            && !model.is_empty()
        {
            self.stt.model = model;
        }

        if let Ok(language) = std::env::var("SUBCAST_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(device) = std::env::var("SUBCAST_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(url) = std::env::var("SUBCAST_TRANSLATE_URL")
            && !url.is_empty()
        {
            self.translate.url = url;
        }

        self
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<()> {
        self.segmenter.validate()?;
        self.to_coordinator_config().validate()?;
        if self.overlay.subtitle_ttl_s <= 0.0 {
            return Err(SubcastError::ConfigInvalidValue {
                key: "overlay.subtitle_ttl_s".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.overlay.max_lines == 0 {
            return Err(SubcastError::ConfigInvalidValue {
                key: "overlay.max_lines".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if ToggleKey::from_name(&self.control.toggle_key).is_none() {
            return Err(SubcastError::ConfigInvalidValue {
                key: "control.toggle_key".to_string(),
                message: format!(
                    "unknown key '{}', supported: {}",
                    self.control.toggle_key,
                    ToggleKey::supported_names().join(", ")
                ),
            });
        }
        Ok(())
    }

    /// Maps the relevant sections onto the pipeline configuration.
    pub fn to_coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            segmenter: self.segmenter,
            sample_rate: self.audio.sample_rate,
            chunk_duration_ms: self.audio.chunk_duration_ms,
            chunk_queue: self.pipeline.chunk_queue,
            job_queue: self.pipeline.job_queue,
            workers: self.pipeline.workers,
            engine_timeout: Duration::from_secs(self.pipeline.engine_timeout_s),
            emit_partials: self.pipeline.emit_partials,
            source_language: self.stt.language.clone(),
            target_language: self.translate.target_language.clone(),
            source_label: self.control.source_label.clone(),
        }
    }

    /// Default configuration file path: ~/.config/subcast/config.toml.
    #[cfg(feature = "cli")]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("subcast").join("config.toml"))
    }
}
