//! Twitching cat ears on each detected face

use image::Rgba;

use super::tracked::TrackedModel;
use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo, InferenceContext, TickGate};
use crate::ml::{Face, FaceLandmarker};
use crate::render::painter::gradient_color;
use crate::render::{Painter, RenderSurface};

const HOT_PINK: Rgba<u8> = Rgba([0xFF, 0x69, 0xB4, 255]);
const DEEP_PINK: Rgba<u8> = Rgba([0xFF, 0x14, 0x93, 255]);
const LIGHT_PINK: Rgba<u8> = Rgba([0xFF, 0xB6, 0xC1, 255]);

pub struct CatEars {
    descriptor: EffectDescriptor,
    model: TrackedModel<dyn FaceLandmarker, Vec<Face>>,
    twitch: f32,
    clock: TickGate,
}

impl CatEars {
    pub fn new(inference: InferenceContext) -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "catears",
                name: "Cat Ears",
                icon: "🐱",
                category: Category::Face,
            },
            model: TrackedModel::faces("catears", inference),
            twitch: 0.0,
            clock: TickGate::new(),
        }
    }
}

/// Draw one ear whose tip points away from (x, y), tilted by `angle` degrees
fn draw_ear(painter: &mut Painter<'_>, x: f32, y: f32, size: f32, angle: f32) {
    let (sin, cos) = angle.to_radians().sin_cos();
    let place = |px: f32, py: f32| (x + px * cos - py * sin, y + px * sin + py * cos);

    let outer = [
        place(0.0, 0.0),
        place(-size * 0.6, -size * 1.2),
        place(size * 0.6, -size * 1.2),
    ];
    // Vertical gradient along the ear's own axis
    let stops = [(0.0, HOT_PINK), (1.0, DEEP_PINK)];
    let axis = (-sin * size * 1.2, -cos * size * 1.2);
    let len2 = (axis.0 * axis.0 + axis.1 * axis.1).max(f32::EPSILON);
    painter.fill_polygon_with(&outer, |px, py| {
        let t = ((px - x) * axis.0 + (py - y) * axis.1) / len2;
        gradient_color(&stops, t)
    });

    let inner = [
        place(0.0, -size * 0.2),
        place(-size * 0.3, -size * 0.8),
        place(size * 0.3, -size * 0.8),
    ];
    painter.fill_polygon(&inner, LIGHT_PINK);

    for i in 0..3 {
        painter.line(outer[i], outer[(i + 1) % 3], DEEP_PINK);
    }
}

impl Effect for CatEars {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        if self.clock.advance(frame.tick) {
            self.twitch += 0.05;
        }
        if !self.model.ready() {
            return;
        }
        self.model.observe(frame.tick, surface);

        let Some(faces) = self.model.latest() else {
            return;
        };
        let left_twitch = self.twitch.sin() * 3.0;
        let right_twitch = (self.twitch + std::f32::consts::PI).sin() * 3.0;

        let mut painter = surface.painter();
        for bbox in faces.iter().filter_map(|f| f.bbox) {
            let (w, h) = (bbox.width(), bbox.height());
            let ear_size = w * 0.2;
            let ear_y = bbox.y_min - h * 0.1;
            draw_ear(&mut painter, bbox.x_min + w * 0.2 + left_twitch, ear_y, ear_size, -15.0);
            draw_ear(&mut painter, bbox.x_min + w * 0.8 + right_twitch, ear_y, ear_size, 15.0);
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
    use crate::effects::builtin::tests::ready_context;
    use crate::ml::cache::tests::{FixedFaces, FixedMask};
    use crate::ml::Keypoint;
    use crate::render::SurfaceKind;
    use std::time::Duration;

    #[test]
    fn test_ear_points_up() {
        let mut image = image::RgbaImage::from_pixel(40, 40, Rgba([0, 0, 0, 255]));
        draw_ear(&mut Painter::new(&mut image), 20.0, 30.0, 15.0, 0.0);
        // Body of the ear is above the anchor, nothing below it
        assert_ne!(*image.get_pixel(20, 20), Rgba([0, 0, 0, 255]));
        assert_eq!(*image.get_pixel(20, 35), Rgba([0, 0, 0, 255]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_ears_follow_face() {
        let face = Face::from_keypoints(vec![
            Keypoint {
                x: 30.0,
                y: 50.0,
                z: 0.0,
            },
            Keypoint {
                x: 90.0,
                y: 110.0,
                z: 0.0,
            },
        ]);
        let ctx = ready_context(
            tokio::runtime::Handle::current(),
            FixedFaces(vec![face]),
            FixedMask(None),
        );
        let mut ears = CatEars::new(ctx);
        let original = image::RgbaImage::from_pixel(120, 120, Rgba([0, 0, 0, 255]));

        let mut top_changed = false;
        for tick in 0..200 {
            let mut surface = RenderSurface::from_image(original.clone());
            ears.apply(&mut surface, &FrameInfo::new(tick, SurfaceKind::Display));
            // Ears are drawn above the face box only
            let below_changed = (60..120).any(|y| (0..120).any(|x| surface.pixel(x, y) != Rgba([0, 0, 0, 255])));
            assert!(!below_changed);
            if surface.image().as_raw() != original.as_raw() {
                top_changed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(top_changed);
    }
}
