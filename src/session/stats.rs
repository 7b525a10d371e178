use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Not recording, no connection
    Idle,
    /// Recording turned on, connection opening
    Connecting,
    /// Connection open, capture loop running
    Streaming,
    /// Recording turned off, tearing down
    Closing,
    /// Recording still on, but the connection failed or dropped
    Disconnected,
}

/// Result of a manual capture request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// Frame handed to the connection
    Sent,
    /// Not recording, not connected, no permission, or no image
    Skipped,
    /// Capture or encoding failed
    Failed(String),
}

/// Statistics about an emotion streaming session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    pub state: SessionState,

    /// Whether recording is currently active
    pub is_recording: bool,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Connection attempts made so far
    pub connect_attempts: usize,

    /// Frames written to the connection
    pub frames_sent: usize,

    /// Frames replaced or discarded before being written
    pub frames_dropped: usize,

    /// Ticks that did nothing because the session was not ready
    pub ticks_skipped: usize,

    /// Classifications received
    pub results_received: usize,

    /// Inbound payloads that could not be decoded
    pub malformed_messages: usize,

    /// Last contained capture/send/connection error
    pub last_error: Option<String>,
}
