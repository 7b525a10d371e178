//! Emotion streaming session management
//!
//! This module provides the `EmotionSession` controller that manages:
//! - Connection lifecycle tied to the recording toggle
//! - The fixed-cadence capture-and-send schedule
//! - Inbound result decoding into a bounded, newest-first history
//! - Session statistics and state

mod config;
mod history;
mod session;
mod stats;

pub use config::SessionConfig;
pub use history::EmotionHistory;
pub use session::EmotionSession;
pub use stats::{CaptureOutcome, SessionState, SessionStats};
