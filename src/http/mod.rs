//! HTTP API for screens that display live emotions
//!
//! Each screen id owns one session:
//! - POST /screens/:id/recording - Turn recording on/off (`{"recording": bool}`)
//! - POST /screens/:id/capture - Capture and send one frame now
//! - GET /screens/:id/status - Query session stats
//! - GET /screens/:id/emotions - Current emotion and history
//! - DELETE /screens/:id - Tear down the session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{EmotionsResponse, ErrorResponse, RecordingResponse, SetRecordingRequest};
pub use routes::create_router;
pub use state::{AppState, DeviceProvider};
