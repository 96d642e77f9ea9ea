//! Skin brightening plus eyeshadow, blush and lipstick placed from face-mesh
//! landmarks

use super::tracked::TrackedModel;
use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo, InferenceContext};
use crate::ml::{Face, FaceLandmarker, Keypoint};
use crate::render::painter::rgba;
use crate::render::{Painter, RenderSurface};

/// Face-mesh landmark indices
const LEFT_EYE: usize = 33;
const RIGHT_EYE: usize = 263;
const NOSE_TIP: usize = 1;
const MOUTH_LEFT: usize = 61;
const MOUTH_RIGHT: usize = 291;

pub struct Makeup {
    descriptor: EffectDescriptor,
    model: TrackedModel<dyn FaceLandmarker, Vec<Face>>,
}

impl Makeup {
    pub fn new(inference: InferenceContext) -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "makeup",
                name: "Makeup",
                icon: "💄",
                category: Category::Face,
            },
            model: TrackedModel::faces("makeup", inference),
        }
    }
}

/// Lift skin-like tones slightly
fn brighten_skin(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        let (r, g, b) = (px[0], px[1], px[2]);
        if r > 100 && g > 80 && b > 70 && r > b {
            px[0] = r.saturating_add(15);
            px[1] = g.saturating_add(12);
            px[2] = b.saturating_add(10);
        }
    }
}

/// Landmarks the overlay is anchored to
struct Anchors {
    left_eye: Keypoint,
    right_eye: Keypoint,
    nose: Keypoint,
    mouth_left: Keypoint,
    mouth_right: Keypoint,
}

impl Anchors {
    fn from_face(face: &Face) -> Option<Self> {
        Some(Self {
            left_eye: face.keypoint(LEFT_EYE)?,
            right_eye: face.keypoint(RIGHT_EYE)?,
            nose: face.keypoint(NOSE_TIP)?,
            mouth_left: face.keypoint(MOUTH_LEFT)?,
            mouth_right: face.keypoint(MOUTH_RIGHT)?,
        })
    }

    fn eye_distance(&self) -> f32 {
        (self.right_eye.x - self.left_eye.x).hypot(self.right_eye.y - self.left_eye.y)
    }
}

fn draw_makeup(painter: &mut Painter<'_>, a: &Anchors) {
    let d = a.eye_distance();
    if !(d > 0.0) {
        return;
    }

    let shadow = [(0.0, rgba(147, 112, 219, 0.6)), (1.0, rgba(147, 112, 219, 0.0))];
    for eye in [a.left_eye, a.right_eye] {
        painter.radial_gradient_rect(
            (eye.x - d * 0.4, eye.y - d * 0.5, d * 0.8, d * 0.6),
            (eye.x, eye.y - d * 0.1),
            d * 0.4,
            &shadow,
            0.3,
        );
    }

    let blush = [(0.0, rgba(255, 182, 193, 0.8)), (1.0, rgba(255, 182, 193, 0.0))];
    let cheek_y = a.nose.y;
    for cheek_x in [a.left_eye.x, a.right_eye.x] {
        painter.radial_gradient_rect(
            (cheek_x - d * 0.5, cheek_y - d * 0.3, d, d * 0.6),
            (cheek_x, cheek_y),
            d * 0.5,
            &blush,
            0.3,
        );
    }

    let mouth_x = (a.mouth_left.x + a.mouth_right.x) / 2.0;
    let mouth_y = (a.mouth_left.y + a.mouth_right.y) / 2.0;
    let mouth_width = (a.mouth_right.x - a.mouth_left.x).abs();
    painter.fill_ellipse(
        mouth_x,
        mouth_y,
        mouth_width / 2.0,
        d * 0.15,
        rgba(220, 20, 60, 0.6 * 0.5),
    );
}

impl Effect for Makeup {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        if !self.model.ready() {
            return;
        }
        brighten_skin(surface.pixels_mut());
        self.model.observe(frame.tick, surface);

        let Some(faces) = self.model.latest() else {
            return;
        };
        // Only the first face is made up
        if let Some(anchors) = faces.first().and_then(Anchors::from_face) {
            draw_makeup(&mut surface.painter(), &anchors);
        }
    }

    fn reset(&mut self) {
        self.model.clear();
    }

    fn retry_inference(&mut self) -> bool {
        self.model.retry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn mesh_face() -> Face {
        let mut keypoints = vec![Keypoint::default(); 468];
        keypoints[LEFT_EYE] = Keypoint { x: 30.0, y: 30.0, z: 0.0 };
        keypoints[RIGHT_EYE] = Keypoint { x: 70.0, y: 30.0, z: 0.0 };
        keypoints[NOSE_TIP] = Keypoint { x: 50.0, y: 50.0, z: 0.0 };
        keypoints[MOUTH_LEFT] = Keypoint { x: 40.0, y: 70.0, z: 0.0 };
        keypoints[MOUTH_RIGHT] = Keypoint { x: 60.0, y: 70.0, z: 0.0 };
        Face::from_keypoints(keypoints)
    }

    #[test]
    fn test_brighten_only_skin_tones() {
        let mut data = vec![200, 150, 120, 255, 50, 200, 250, 255];
        brighten_skin(&mut data);
        assert_eq!(data, vec![215, 162, 130, 255, 50, 200, 250, 255]);

        let mut bright = vec![250, 250, 250, 255];
        brighten_skin(&mut bright);
        assert_eq!(bright, vec![255, 255, 255, 255]);
    }

    #[test]
    fn test_sparse_landmarks_are_ignored() {
        let face = Face::from_keypoints(vec![Keypoint::default(); 10]);
        assert!(Anchors::from_face(&face).is_none());
    }

    #[test]
    fn test_lipstick_tints_mouth() {
        let anchors = Anchors::from_face(&mesh_face()).unwrap();
        assert_eq!(anchors.eye_distance(), 40.0);

        let mut image = RgbaImage::from_pixel(100, 100, Rgba([128, 128, 128, 255]));
        draw_makeup(&mut Painter::new(&mut image), &anchors);
        let lips = image.get_pixel(50, 70);
        assert!(lips[0] > 128 && lips[1] < 128);
        // Far corner untouched
        assert_eq!(*image.get_pixel(99, 99), Rgba([128, 128, 128, 255]));
    }
}
