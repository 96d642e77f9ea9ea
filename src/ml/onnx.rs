//! ONNX Runtime backends
//!
//! Uses MediaPipe-compatible models:
//! - `selfie_segmentation.onnx`: NHWC 1x256x256x3 input in [0, 1], 256x256 mask output
//! - `face_detection_short_range.onnx`: BlazeFace, NHWC 1x128x128x3 input in
//!   [-1, 1], 896 anchor boxes (16 values each) and 896 score logits
//! - `face_landmark.onnx`: NHWC 1x192x192x3 input in [0, 1], 468x3 landmarks in
//!   input pixels plus a face presence logit
//!
//! Faces are found in two stages: the detector runs on the letterboxed frame,
//! then the mesh model runs on a square region around the best detection.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use image::RgbaImage;
use ndarray::Array4;
use ort::session::Session;
use parking_lot::Mutex;

use super::{
    preprocess_nhwc, BodySegmenter, Face, FaceLandmarker, InferenceError, Keypoint,
    SegmentationMask,
};

const SEG_WIDTH: u32 = 256;
const SEG_HEIGHT: u32 = 256;
const SEGMENTATION_MODEL: &str = "selfie_segmentation.onnx";

const MESH_SIZE: u32 = 192;
const MESH_LANDMARKS: usize = 468;
const FACE_PRESENCE_THRESHOLD: f32 = 0.5;
const FACE_MODEL: &str = "face_landmark.onnx";

const DETECTOR_SIZE: u32 = 128;
const DETECTOR_ANCHORS: usize = 896;
const DETECTOR_BOX_VALUES: usize = 16;
const DETECTION_SCORE_THRESHOLD: f32 = 0.5;
const DETECTOR_MODEL: &str = "face_detection_short_range.onnx";
/// Detected face box is grown by this factor before the mesh crop
const ROI_SCALE: f32 = 1.5;

static ORT_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize the ONNX Runtime environment once per process
fn init_ort() -> Result<(), InferenceError> {
    ORT_INIT
        .get_or_init(|| {
            ort::init()
                .with_name("SelfieCamera")
                .commit()
                .map_err(|e| e.to_string())?;
            log::info!("ONNX Runtime initialized");
            Ok(())
        })
        .clone()
        .map_err(InferenceError::Runtime)
}

/// Run a blocking model load on the blocking thread pool
pub async fn load_blocking<T, F>(load: F) -> Result<T, InferenceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, InferenceError> + Send + 'static,
{
    tokio::task::spawn_blocking(load)
        .await
        .map_err(|e| InferenceError::Task(e.to_string()))?
}

/// Find the models directory
///
/// Looks next to the executable (and up to three parents, for `cargo run`
/// from `target/<profile>`), then in the working directory.
pub fn find_model_dir() -> Result<PathBuf, InferenceError> {
    if let Ok(exe_path) = std::env::current_exe() {
        let mut dir = exe_path.parent().map(Path::to_path_buf);
        for _ in 0..4 {
            let Some(current) = dir else { break };
            let candidate = current.join("models");
            if candidate.is_dir() {
                return Ok(candidate);
            }
            dir = current.parent().map(Path::to_path_buf);
        }
    }

    let cwd = std::env::current_dir().map_err(|e| InferenceError::ModelDirNotFound(e.to_string()))?;
    let model_dir = cwd.join("models");
    if model_dir.is_dir() {
        return Ok(model_dir);
    }

    Err(InferenceError::ModelDirNotFound(
        "create a 'models' directory with the ONNX models".to_string(),
    ))
}

fn model_path(model_dir: Option<&Path>, file: &str) -> Result<PathBuf, InferenceError> {
    let dir = match model_dir {
        Some(dir) => dir.to_path_buf(),
        None => find_model_dir()?,
    };
    let path = dir.join(file);
    if !path.exists() {
        return Err(InferenceError::ModelNotFound(path.display().to_string()));
    }
    Ok(path)
}

fn load_session(path: &Path) -> Result<Session, InferenceError> {
    init_ort()?;

    let session = Session::builder()
        .map_err(|e| InferenceError::Load(format!("session builder: {}", e)))?
        .with_intra_threads(2)
        .map_err(|e| InferenceError::Load(format!("threads: {}", e)))?
        .commit_from_file(path)
        .map_err(|e| InferenceError::Load(format!("{}: {}", path.display(), e)))?;

    log::info!("Loaded model from {:?}", path);
    Ok(session)
}

fn nhwc_tensor(
    input: Vec<f32>,
    width: u32,
    height: u32,
) -> Result<ort::value::Tensor<f32>, InferenceError> {
    let array = Array4::from_shape_vec((1, height as usize, width as usize, 3), input)
        .map_err(|e| InferenceError::Inference(format!("input array: {}", e)))?;
    ort::value::Tensor::from_array(array)
        .map_err(|e| InferenceError::Inference(format!("input tensor: {}", e)))
}

/// Person segmentation using MediaPipe selfie segmentation
pub struct OnnxSegmenter {
    session: Mutex<Session>,
}

impl OnnxSegmenter {
    pub fn load(model_dir: Option<&Path>) -> Result<Self, InferenceError> {
        let path = model_path(model_dir, SEGMENTATION_MODEL)?;
        Ok(Self {
            session: Mutex::new(load_session(&path)?),
        })
    }
}

impl BodySegmenter for OnnxSegmenter {
    fn segment_people(&self, image: &RgbaImage) -> Result<Option<SegmentationMask>, InferenceError> {
        let input = nhwc_tensor(preprocess_nhwc(image, SEG_WIDTH, SEG_HEIGHT), SEG_WIDTH, SEG_HEIGHT)?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::Inference(e.to_string()))?;

        let Some(output) = outputs.iter().next() else {
            return Ok(None);
        };

        let (_shape, data) = output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Inference(format!("mask output: {}", e)))?;

        let expected = (SEG_WIDTH * SEG_HEIGHT) as usize;
        if data.len() < expected {
            return Err(InferenceError::Inference(format!(
                "mask has {} values, expected {}",
                data.len(),
                expected
            )));
        }

        let mask: Vec<f32> = data[..expected].iter().map(|&v| v.clamp(0.0, 1.0)).collect();

        Ok(Some(SegmentationMask {
            mask,
            width: SEG_WIDTH,
            height: SEG_HEIGHT,
        }))
    }
}

/// Best face found by the detector, normalised to the letterboxed input
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
    pub score: f32,
}

/// Anchor centres of the short-range BlazeFace model, in detector order
pub fn detector_anchors() -> Vec<(f32, f32)> {
    // (stride, anchors per cell)
    const LAYERS: [(u32, usize); 2] = [(8, 2), (16, 6)];

    let mut anchors = Vec::with_capacity(DETECTOR_ANCHORS);
    for (stride, per_cell) in LAYERS {
        let grid = DETECTOR_SIZE / stride;
        for y in 0..grid {
            for x in 0..grid {
                let center = (
                    (x as f32 + 0.5) / grid as f32,
                    (y as f32 + 0.5) / grid as f32,
                );
                anchors.extend(std::iter::repeat(center).take(per_cell));
            }
        }
    }
    anchors
}

/// Decode raw detector output and keep the highest-scoring face
pub fn decode_best_detection(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[(f32, f32)],
) -> Option<Detection> {
    let size = DETECTOR_SIZE as f32;
    anchors
        .iter()
        .zip(scores)
        .zip(boxes.chunks_exact(DETECTOR_BOX_VALUES))
        .map(|((&(anchor_x, anchor_y), &logit), raw)| Detection {
            x_center: anchor_x + raw[0] / size,
            y_center: anchor_y + raw[1] / size,
            width: raw[2] / size,
            height: raw[3] / size,
            score: 1.0 / (1.0 + (-logit.clamp(-100.0, 100.0)).exp()),
        })
        .filter(|d| d.score >= DETECTION_SCORE_THRESHOLD && d.width > 0.0 && d.height > 0.0)
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

/// Square region of a frame in pixel coordinates; may extend past the edges
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRegion {
    pub left: f32,
    pub top: f32,
    pub side: f32,
}

impl FaceRegion {
    /// The whole frame centred in a square
    pub fn letterbox(width: u32, height: u32) -> Self {
        let side = width.max(height) as f32;
        Self {
            left: (width as f32 - side) / 2.0,
            top: (height as f32 - side) / 2.0,
            side,
        }
    }

    /// Mesh crop around a detection made on the letterboxed frame
    pub fn around(detection: &Detection, width: u32, height: u32) -> Self {
        let frame = Self::letterbox(width, height);
        let center_x = frame.left + detection.x_center * frame.side;
        let center_y = frame.top + detection.y_center * frame.side;
        let side = detection.width.max(detection.height) * frame.side * ROI_SCALE;
        Self {
            left: center_x - side / 2.0,
            top: center_y - side / 2.0,
            side,
        }
    }

    /// Map a point of a `size` x `size` model input back to frame pixels
    pub fn to_frame(&self, x: f32, y: f32, size: u32) -> (f32, f32) {
        let scale = self.side / size as f32;
        (self.left + x * scale, self.top + y * scale)
    }

    /// Sample the region to NHWC float RGB in [0, 1]; outside the frame is black
    pub fn sample_nhwc(&self, image: &RgbaImage, size: u32) -> Vec<f32> {
        let mut output = vec![0.0f32; (size * size * 3) as usize];
        let (width, height) = image.dimensions();
        let scale = self.side / size as f32;
        let data = image.as_raw();

        for y in 0..size {
            let src_y = (self.top + (y as f32 + 0.5) * scale).floor();
            if src_y < 0.0 || src_y >= height as f32 {
                continue;
            }
            for x in 0..size {
                let src_x = (self.left + (x as f32 + 0.5) * scale).floor();
                if src_x < 0.0 || src_x >= width as f32 {
                    continue;
                }
                let src_idx = ((src_y as u32 * width + src_x as u32) * 4) as usize;
                let out_idx = ((y * size + x) * 3) as usize;
                for c in 0..3 {
                    output[out_idx + c] = data[src_idx + c] as f32 / 255.0;
                }
            }
        }

        output
    }
}

/// Face landmarks from BlazeFace detection followed by the face mesh model
///
/// Reports at most one face, the detector's most confident.
pub struct OnnxFaceLandmarker {
    detector: Mutex<Session>,
    mesh: Mutex<Session>,
    anchors: Vec<(f32, f32)>,
}

impl OnnxFaceLandmarker {
    pub fn load(model_dir: Option<&Path>) -> Result<Self, InferenceError> {
        let detector = model_path(model_dir, DETECTOR_MODEL)?;
        let mesh = model_path(model_dir, FACE_MODEL)?;
        Ok(Self {
            detector: Mutex::new(load_session(&detector)?),
            mesh: Mutex::new(load_session(&mesh)?),
            anchors: detector_anchors(),
        })
    }

    fn detect(&self, image: &RgbaImage) -> Result<Option<Detection>, InferenceError> {
        let (width, height) = image.dimensions();
        let input: Vec<f32> = FaceRegion::letterbox(width, height)
            .sample_nhwc(image, DETECTOR_SIZE)
            .into_iter()
            .map(|v| v * 2.0 - 1.0)
            .collect();
        let input = nhwc_tensor(input, DETECTOR_SIZE, DETECTOR_SIZE)?;

        let mut session = self.detector.lock();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::Inference(e.to_string()))?;

        // Output names differ between conversions; tell them apart by size
        let mut boxes = None;
        let mut scores = None;
        for (_name, value) in outputs.iter() {
            let Ok((_shape, data)) = value.try_extract_tensor::<f32>() else {
                continue;
            };
            if data.len() == DETECTOR_ANCHORS * DETECTOR_BOX_VALUES {
                boxes = Some(data.to_vec());
            } else if data.len() == DETECTOR_ANCHORS {
                scores = Some(data.to_vec());
            }
        }

        let (Some(boxes), Some(scores)) = (boxes, scores) else {
            return Err(InferenceError::Inference(
                "face detector outputs have unexpected shapes".to_string(),
            ));
        };
        Ok(decode_best_detection(&boxes, &scores, &self.anchors))
    }
}

impl FaceLandmarker for OnnxFaceLandmarker {
    fn estimate_faces(&self, image: &RgbaImage) -> Result<Vec<Face>, InferenceError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Ok(Vec::new());
        }

        let Some(detection) = self.detect(image)? else {
            return Ok(Vec::new());
        };
        let region = FaceRegion::around(&detection, width, height);
        let input = nhwc_tensor(region.sample_nhwc(image, MESH_SIZE), MESH_SIZE, MESH_SIZE)?;

        let mut session = self.mesh.lock();
        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| InferenceError::Inference(e.to_string()))?;

        let mut iter = outputs.iter();
        let Some(landmarks) = iter.next() else {
            return Ok(Vec::new());
        };

        // Face presence score, when the model exports one
        if let Some(flag) = iter.next() {
            if let Ok((_shape, score)) = flag.1.try_extract_tensor::<f32>() {
                let logit = score.first().copied().unwrap_or(0.0);
                let presence = 1.0 / (1.0 + (-logit).exp());
                if presence < FACE_PRESENCE_THRESHOLD {
                    return Ok(Vec::new());
                }
            }
        }

        let (_shape, data) = landmarks
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Inference(format!("landmark output: {}", e)))?;

        if data.len() < MESH_LANDMARKS * 3 {
            return Err(InferenceError::Inference(format!(
                "landmark output has {} values, expected {}",
                data.len(),
                MESH_LANDMARKS * 3
            )));
        }

        let depth_scale = region.side / MESH_SIZE as f32;
        let keypoints = data[..MESH_LANDMARKS * 3]
            .chunks_exact(3)
            .map(|p| {
                let (x, y) = region.to_frame(p[0], p[1], MESH_SIZE);
                Keypoint {
                    x,
                    y,
                    z: p[2] * depth_scale,
                }
            })
            .collect();

        Ok(vec![Face::from_keypoints(keypoints)])
    }
}
