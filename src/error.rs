use thiserror::Error;

/// Failure while capturing or transmitting one frame
///
/// These never escape the session: they are logged and kept as the
/// session's `last_error`, and the next tick proceeds normally.
#[derive(Error, Debug)]
pub enum TransmitError {
    #[error("Error capturing frame: {0}")]
    Capture(#[source] anyhow::Error),

    #[error("Error encoding frame: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Error sending frame: {0}")]
    Send(#[source] anyhow::Error),
}
