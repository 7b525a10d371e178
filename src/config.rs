use anyhow::{bail, Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub stream: StreamConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Inference service connection and capture cadence
#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// WebSocket endpoint of the inference service
    pub endpoint: String,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Still quality in 0.0..=1.0
    #[serde(default = "default_quality")]
    pub quality: f32,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Image file or directory of images used as the camera
    pub source: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_frame_interval_ms() -> u64 {
    200
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_quality() -> f32 {
    0.5
}

fn default_history_capacity() -> usize {
    10
}

impl Config {
    /// Load from `path` (extension optional), then apply `EMOTION_STREAM__*` overrides.
    ///
    /// e.g. `EMOTION_STREAM__STREAM__ENDPOINT=ws://10.0.0.2:8000/ws/emotion`
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("EMOTION_STREAM").separator("__"))
            .build()
            .with_context(|| format!("Failed to read config from {}", path))?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.stream
            .validate()
            .with_context(|| format!("Invalid [stream] settings in {}", path))?;

        Ok(cfg)
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_interval_ms == 0 {
            bail!("frame_interval_ms must be greater than zero");
        }
        if self.connect_timeout_ms == 0 {
            bail!("connect_timeout_ms must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.quality) {
            bail!("quality must be within 0.0..=1.0, got {}", self.quality);
        }
        Ok(())
    }
}
