pub mod backend;
pub mod file;

pub use backend::{CaptureDevice, CaptureDeviceFactory, CaptureSource, Frame};
pub use file::ImageFileDevice;
