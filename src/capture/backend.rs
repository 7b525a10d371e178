use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

/// A single captured still, ready to be serialized and sent
///
/// Frames are never retained: the capture step builds one, the stream layer
/// serializes it immediately and it is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Base64-encoded image bytes
    pub image_data: String,
    /// Wall-clock capture time in milliseconds since the Unix epoch
    pub captured_at_millis: i64,
}

impl Frame {
    /// Stamp a freshly captured still with the current time
    pub fn now(image_data: String) -> Self {
        Self {
            image_data,
            captured_at_millis: Utc::now().timestamp_millis(),
        }
    }
}

/// Camera-like collaborator
///
/// The session only consumes these capabilities; device access policy stays
/// with the implementation.
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Ask for access to the device. Returns whether access is now granted.
    async fn request_permission(&self) -> Result<bool>;

    /// Whether access has been granted
    fn permission_granted(&self) -> bool;

    /// Capture one still at `quality` (0.0..=1.0), base64-encoded.
    ///
    /// `Ok(None)` means the device produced no image this time.
    async fn capture_still(&self, quality: f32) -> Result<Option<String>>;

    /// Device name for logging
    fn name(&self) -> &str;
}

/// Capture device factory
pub struct CaptureDeviceFactory;

impl CaptureDeviceFactory {
    pub fn create(source: CaptureSource) -> Result<Arc<dyn CaptureDevice>> {
        match source {
            CaptureSource::ImagePath(path) => {
                let device = super::file::ImageFileDevice::new(path)?;
                Ok(Arc::new(device))
            }
        }
    }
}

/// Where stills come from
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// A single image file, or a directory of images cycled in name order
    ImagePath(PathBuf),
}
