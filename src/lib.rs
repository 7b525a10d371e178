pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod stream;

pub use capture::{CaptureDevice, CaptureDeviceFactory, CaptureSource, Frame, ImageFileDevice};
pub use config::Config;
pub use error::TransmitError;
pub use http::{create_router, AppState};
pub use session::{
    CaptureOutcome, EmotionHistory, EmotionSession, SessionConfig, SessionState, SessionStats,
};
pub use stream::{
    decode_inbound, Connection, Connector, EmotionReading, FrameSink, InboundResult,
    OutboundMessage, WebSocketConnector,
};
