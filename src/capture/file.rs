// Image-file capture device: stands in for a camera on desktop and in tests

use anyhow::{bail, Context, Result};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::backend::CaptureDevice;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Serves stills from an image file or a directory of images
///
/// Every capture re-encodes the next image as JPEG at the requested quality.
/// Directories are cycled in file-name order.
pub struct ImageFileDevice {
    root: PathBuf,
    name: String,
    images: Mutex<Vec<PathBuf>>,
    next: AtomicUsize,
    granted: AtomicBool,
}

impl ImageFileDevice {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if root.as_os_str().is_empty() {
            bail!("Capture source path is empty");
        }

        let name = format!("image-file:{}", root.display());
        info!("Image capture device created for {}", root.display());

        Ok(Self {
            root,
            name,
            images: Mutex::new(Vec::new()),
            next: AtomicUsize::new(0),
            granted: AtomicBool::new(false),
        })
    }

    /// Number of images found by the last permission request
    pub fn image_count(&self) -> usize {
        self.images.lock().map(|images| images.len()).unwrap_or(0)
    }

    fn next_image(&self) -> Option<PathBuf> {
        let images = self.images.lock().ok()?;
        if images.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::SeqCst) % images.len();
        Some(images[index].clone())
    }
}

#[async_trait::async_trait]
impl CaptureDevice for ImageFileDevice {
    async fn request_permission(&self) -> Result<bool> {
        let root = self.root.clone();
        let images = tokio::task::spawn_blocking(move || scan_images(&root))
            .await
            .context("Image scan task panicked")??;

        let granted = !images.is_empty();
        if granted {
            info!("{}: {} image(s) available", self.name, images.len());
        } else {
            warn!("{}: no images found, access denied", self.name);
        }

        if let Ok(mut slot) = self.images.lock() {
            *slot = images;
        }
        self.next.store(0, Ordering::SeqCst);
        self.granted.store(granted, Ordering::SeqCst);

        Ok(granted)
    }

    fn permission_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    async fn capture_still(&self, quality: f32) -> Result<Option<String>> {
        if !self.permission_granted() {
            bail!("Capture permission not granted for {}", self.name);
        }

        let Some(path) = self.next_image() else {
            return Ok(None);
        };

        let jpeg_quality = jpeg_quality(quality);
        let encoded = tokio::task::spawn_blocking(move || encode_jpeg(&path, jpeg_quality))
            .await
            .context("Image encode task panicked")??;

        debug!("Captured still ({} bytes at quality {})", encoded.len(), jpeg_quality);

        Ok(Some(base64::engine::general_purpose::STANDARD.encode(encoded)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Map 0.0..=1.0 to a JPEG quality of 1..=100
pub fn jpeg_quality(quality: f32) -> u8 {
    let quality = if quality.is_finite() { quality.clamp(0.0, 1.0) } else { 1.0 };
    ((quality * 100.0).round() as u8).max(1)
}

fn scan_images(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(root)
        .with_context(|| format!("Failed to read capture directory: {}", root.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    images.sort();

    Ok(images)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn encode_jpeg(path: &Path, quality: u8) -> Result<Vec<u8>> {
    let img = image::open(path)
        .with_context(|| format!("Failed to open image: {}", path.display()))?;
    let rgb = img.to_rgb8();

    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
            .context("Failed to encode JPEG")?;
    }

    Ok(buf)
}
