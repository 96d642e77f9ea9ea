//! Still capture of the composited frame

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

/// Capture errors
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("Failed to write capture: {0}")]
    Io(#[from] std::io::Error),
}

/// An encoded PNG snapshot
#[derive(Clone, Debug)]
pub struct CapturedImage {
    png: Vec<u8>,
    width: u32,
    height: u32,
}

impl CapturedImage {
    /// Encode an RGBA image as PNG
    pub fn encode(image: &RgbaImage) -> Result<Self, CaptureError> {
        let mut png = Vec::new();
        PngEncoder::new(&mut png).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )?;
        Ok(Self {
            png,
            width: image.width(),
            height: image.height(),
        })
    }

    /// PNG bytes
    pub fn bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.png
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Write the PNG as `selfie_<unix millis>.png` inside `dir`, creating the
    /// directory if needed
    pub fn save_to_dir(&self, dir: &Path) -> Result<PathBuf, CaptureError> {
        std::fs::create_dir_all(dir)?;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let path = dir.join(format!("selfie_{}.png", millis));
        std::fs::write(&path, &self.png)?;
        log::info!("Saved capture to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_encode_round_trips_pixels() {
        let image = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8 * 80, y as u8 * 200, 7, 128]));
        let captured = CapturedImage::encode(&image).unwrap();
        assert_eq!((captured.width(), captured.height()), (3, 2));
        assert!(captured.bytes().starts_with(&[0x89, b'P', b'N', b'G']));

        let decoded = image::load_from_memory(captured.bytes()).unwrap().to_rgba8();
        assert_eq!(decoded.as_raw(), image.as_raw());
    }

    #[test]
    fn test_save_to_dir() {
        let dir = std::env::temp_dir().join(format!("selfie-capture-test-{}", std::process::id()));
        let captured = CapturedImage::encode(&RgbaImage::new(1, 1)).unwrap();
        let path = captured.save_to_dir(&dir).unwrap();

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        assert!(name.starts_with("selfie_") && name.ends_with(".png"));
        assert_eq!(std::fs::read(&path).unwrap(), captured.bytes());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
