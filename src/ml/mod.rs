//! ML inference module
//!
//! Face landmark estimation and person segmentation. Backends are loaded
//! lazily through [`InferenceCache`] and shared by every effect that needs
//! them; the ONNX Runtime implementations live in [`onnx`].

pub mod cache;
pub mod onnx;

use image::RgbaImage;

pub use cache::{InferenceCache, ResourceCell};

/// Errors raised while loading or running an inference model
///
/// Cloneable so a cached construction failure can be handed to every caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("Models directory not found: {0}")]
    ModelDirNotFound(String),
    #[error("Model file not found: {0}")]
    ModelNotFound(String),
    #[error("Failed to initialize ONNX Runtime: {0}")]
    Runtime(String),
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Model loader task failed: {0}")]
    Task(String),
}

/// A single facial landmark in surface pixel coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Axis-aligned face bounding box in surface pixel coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl BoundingBox {
    /// Bounding box enclosing all points, or `None` for an empty set
    pub fn enclosing(points: &[Keypoint]) -> Option<Self> {
        let first = points.first()?;
        let mut bbox = Self {
            x_min: first.x,
            y_min: first.y,
            x_max: first.x,
            y_max: first.y,
        };
        for p in &points[1..] {
            bbox.x_min = bbox.x_min.min(p.x);
            bbox.y_min = bbox.y_min.min(p.y);
            bbox.x_max = bbox.x_max.max(p.x);
            bbox.y_max = bbox.y_max.max(p.y);
        }
        Some(bbox)
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }
}

/// A detected face
#[derive(Clone, Debug, Default)]
pub struct Face {
    /// Face-mesh landmarks (468 points when the mesh model is used)
    pub keypoints: Vec<Keypoint>,
    /// Bounding box, if the backend provides one
    pub bbox: Option<BoundingBox>,
}

impl Face {
    /// Build a face from landmarks, deriving the bounding box from them
    pub fn from_keypoints(keypoints: Vec<Keypoint>) -> Self {
        let bbox = BoundingBox::enclosing(&keypoints);
        Self { keypoints, bbox }
    }

    /// Landmark by mesh index, if present
    pub fn keypoint(&self, index: usize) -> Option<Keypoint> {
        self.keypoints.get(index).copied()
    }
}

/// Person segmentation mask (0.0 = background, 1.0 = person)
#[derive(Clone, Debug)]
pub struct SegmentationMask {
    pub mask: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl SegmentationMask {
    /// Get mask value at normalized coordinates
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let px = (x.max(0.0) * self.width as f32) as u32;
        let py = (y.max(0.0) * self.height as f32) as u32;
        let idx = (py.min(self.height - 1) * self.width + px.min(self.width - 1)) as usize;
        self.mask.get(idx).copied().unwrap_or(0.0)
    }

    /// Whether the pixel at (x, y) of a `width` x `height` surface belongs to a person
    pub fn is_person(&self, x: u32, y: u32, width: u32, height: u32) -> bool {
        let nx = (x as f32 + 0.5) / width.max(1) as f32;
        let ny = (y as f32 + 0.5) / height.max(1) as f32;
        self.sample(nx, ny) > 0.5
    }
}

/// Face landmark estimator
pub trait FaceLandmarker: Send + Sync {
    /// Estimate faces in an RGBA image. Coordinates are in image pixels.
    fn estimate_faces(&self, image: &RgbaImage) -> Result<Vec<Face>, InferenceError>;
}

/// Person segmenter
pub trait BodySegmenter: Send + Sync {
    /// Segment people in an RGBA image. `None` means no person mask was produced.
    fn segment_people(&self, image: &RgbaImage) -> Result<Option<SegmentationMask>, InferenceError>;
}

/// Resize an RGBA image to `target_width` x `target_height` and convert it to
/// NHWC float RGB in [0, 1] (nearest-neighbour sampling)
pub fn preprocess_nhwc(image: &RgbaImage, target_width: u32, target_height: u32) -> Vec<f32> {
    let mut output = vec![0.0f32; (target_width * target_height * 3) as usize];
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return output;
    }

    let x_ratio = width as f32 / target_width as f32;
    let y_ratio = height as f32 / target_height as f32;
    let data = image.as_raw();

    for y in 0..target_height {
        for x in 0..target_width {
            let src_x = ((x as f32 * x_ratio) as u32).min(width - 1);
            let src_y = ((y as f32 * y_ratio) as u32).min(height - 1);
            let src_idx = ((src_y * width + src_x) * 4) as usize;

            let out_idx = ((y * target_width + x) * 3) as usize;
            output[out_idx] = data[src_idx] as f32 / 255.0;
            output[out_idx + 1] = data[src_idx + 1] as f32 / 255.0;
            output[out_idx + 2] = data[src_idx + 2] as f32 / 255.0;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_keypoints() {
        let face = Face::from_keypoints(vec![
            Keypoint { x: 10.0, y: 20.0, z: 0.0 },
            Keypoint { x: 50.0, y: 5.0, z: 0.0 },
            Keypoint { x: 30.0, y: 40.0, z: 0.0 },
        ]);
        let bbox = face.bbox.unwrap();
        assert_eq!(bbox.x_min, 10.0);
        assert_eq!(bbox.y_min, 5.0);
        assert_eq!(bbox.width(), 40.0);
        assert_eq!(bbox.height(), 35.0);
        assert!(Face::from_keypoints(Vec::new()).bbox.is_none());
    }

    #[test]
    fn test_mask_sample_clamps() {
        let mask = SegmentationMask {
            mask: vec![0.0, 1.0, 0.0, 1.0],
            width: 2,
            height: 2,
        };
        assert_eq!(mask.sample(0.9, 0.1), 1.0);
        assert_eq!(mask.sample(0.1, 0.9), 0.0);
        assert_eq!(mask.sample(5.0, 5.0), 1.0);
        assert!(mask.is_person(7, 0, 8, 8));
        assert!(!mask.is_person(0, 7, 8, 8));
    }

    #[test]
    fn test_preprocess_nhwc() {
        let image = RgbaImage::from_pixel(4, 4, image::Rgba([255, 0, 51, 255]));
        let out = preprocess_nhwc(&image, 2, 2);
        assert_eq!(out.len(), 12);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], 0.0);
        assert!((out[2] - 0.2).abs() < 1e-6);
    }
}
