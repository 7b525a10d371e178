use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::StreamConfig;

/// Configuration for an emotion streaming session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "screen-emotion-detection")
    pub session_id: String,

    /// Inference service WebSocket URL
    pub endpoint: String,

    /// Time between capture ticks
    /// Default: 200ms (5 frames per second)
    pub frame_interval: Duration,

    /// Upper bound on opening the connection
    pub connect_timeout: Duration,

    /// Still quality, 0.0..=1.0
    pub quality: f32,

    /// Number of classifications kept in the history
    pub history_capacity: usize,
}

impl SessionConfig {
    pub fn from_stream_config(session_id: impl Into<String>, stream: &StreamConfig) -> Self {
        Self {
            session_id: session_id.into(),
            endpoint: stream.endpoint.clone(),
            frame_interval: Duration::from_millis(stream.frame_interval_ms),
            connect_timeout: Duration::from_millis(stream.connect_timeout_ms),
            quality: stream.quality,
            history_capacity: stream.history_capacity,
        }
    }

    /// Reject values the capture schedule cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.frame_interval.is_zero() {
            bail!("frame interval must be greater than zero");
        }
        if self.connect_timeout.is_zero() {
            bail!("connect timeout must be greater than zero");
        }
        if !(0.0..=1.0).contains(&self.quality) {
            bail!("quality must be within 0.0..=1.0, got {}", self.quality);
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            endpoint: "ws://localhost:8000/ws/emotion".to_string(),
            frame_interval: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(10),
            quality: 0.5,
            history_capacity: 10,
        }
    }
}
