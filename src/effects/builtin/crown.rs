//! Golden crown above each detected face

use image::Rgba;

use super::tracked::TrackedModel;
use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo, InferenceContext, TickGate};
use crate::ml::{BoundingBox, Face, FaceLandmarker};
use crate::render::painter::{gradient_color, rgba, with_alpha};
use crate::render::{Painter, RenderSurface};

const GOLD: [(f32, Rgba<u8>); 3] = [
    (0.0, Rgba([0xFF, 0xD7, 0x00, 255])),
    (0.5, Rgba([0xFF, 0xA5, 0x00, 255])),
    (1.0, Rgba([0xFF, 0x8C, 0x00, 255])),
];
const BAND: Rgba<u8> = Rgba([0xB8, 0x86, 0x0B, 255]);

/// Crown geometry derived from a face box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrownLayout {
    pub center_x: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CrownLayout {
    pub fn for_face(bbox: &BoundingBox) -> Self {
        let face_width = bbox.width();
        Self {
            center_x: bbox.x_min + face_width / 2.0,
            top: bbox.y_min - face_width * 0.3,
            width: face_width * 0.8,
            height: face_width * 0.4,
        }
    }

    fn left(&self) -> f32 {
        self.center_x - self.width / 2.0
    }

    fn right(&self) -> f32 {
        self.center_x + self.width / 2.0
    }

    fn base_y(&self) -> f32 {
        self.top + self.height * 0.7
    }

    /// Outline with five points, the middle one tallest
    fn outline(&self) -> Vec<(f32, f32)> {
        const POINTS: usize = 5;
        let base_y = self.base_y();
        let point_height = self.height * 0.6;
        let spacing = self.width / (POINTS - 1) as f32;
        let bottom = self.top + self.height;

        let mut outline = vec![(self.left(), base_y)];
        for i in 0..POINTS {
            let x = self.left() + spacing * i as f32;
            let h = if i == POINTS / 2 { point_height * 1.3 } else { point_height };
            outline.push((x, bottom - h));
            if i < POINTS - 1 {
                outline.push((x + spacing / 2.0, base_y - point_height * 0.2));
            }
        }
        outline.push((self.right(), base_y));
        outline.push((self.right(), bottom));
        outline.push((self.left(), bottom));
        outline
    }
}

pub struct Crown {
    descriptor: EffectDescriptor,
    model: TrackedModel<dyn FaceLandmarker, Vec<Face>>,
    sparkle_time: f32,
    clock: TickGate,
}

impl Crown {
    pub fn new(inference: InferenceContext) -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "crown",
                name: "Crown",
                icon: "👑",
                category: Category::Face,
            },
            model: TrackedModel::faces("crown", inference),
            sparkle_time: 0.0,
            clock: TickGate::new(),
        }
    }

    fn draw(&self, painter: &mut Painter<'_>, layout: &CrownLayout) {
        let (x0, y0) = (layout.left(), layout.top);
        let (dx, dy) = (layout.width, layout.height);
        let len2 = (dx * dx + dy * dy).max(f32::EPSILON);
        painter.fill_polygon_with(&layout.outline(), |x, y| {
            let t = ((x - x0) * dx + (y - y0) * dy) / len2;
            gradient_color(&GOLD, t)
        });

        let base_y = layout.base_y();
        painter.fill_rect(layout.left(), base_y, layout.width, layout.height * 0.3, BAND);

        let (cx, cy, w, h) = (layout.center_x, layout.top, layout.width, layout.height);
        let jewels = [
            (cx, cy + h * 0.3, Rgba([0xFF, 0x00, 0x00, 255]), 8.0),
            (cx - w * 0.25, cy + h * 0.5, Rgba([0x00, 0x00, 0xFF, 255]), 6.0),
            (cx + w * 0.25, cy + h * 0.5, Rgba([0x00, 0xFF, 0x00, 255]), 6.0),
            (cx - w * 0.4, cy + h * 0.6, Rgba([0xFF, 0x00, 0xFF, 255]), 4.0),
            (cx + w * 0.4, cy + h * 0.6, Rgba([0xFF, 0xFF, 0x00, 255]), 4.0),
        ];
        for (index, &(x, y, color, size)) in jewels.iter().enumerate() {
            let sparkle = (self.sparkle_time + index as f32).sin() * 0.5 + 0.5;
            let alpha = 0.8 + sparkle * 0.2;
            painter.fill_circle(x + 1.0, y + 1.0, size, rgba(0, 0, 0, 0.3 * alpha));
            painter.fill_circle(x, y, size, with_alpha(color, alpha));
            painter.fill_circle(
                x - size * 0.3,
                y - size * 0.3,
                size * 0.4,
                rgba(255, 255, 255, 0.6 * alpha),
            );
        }

        for i in 0..8 {
            let angle = (i as f32 / 8.0) * std::f32::consts::TAU + self.sparkle_time;
            let distance = w * 0.6;
            let sx = cx + angle.cos() * distance;
            let sy = cy + h * 0.5 + angle.sin() * distance * 0.3;
            let alpha = (self.sparkle_time * 2.0 + i as f32).sin() * 0.5 + 0.5;
            let (sin, cos) = (self.sparkle_time + i as f32).sin_cos();
            let star = [
                (0.0, -4.0),
                (1.0, -1.0),
                (4.0, 0.0),
                (1.0, 1.0),
                (0.0, 4.0),
                (-1.0, 1.0),
                (-4.0, 0.0),
                (-1.0, -1.0),
            ]
            .map(|(x, y): (f32, f32)| (sx + x * cos - y * sin, sy + x * sin + y * cos));
            painter.fill_polygon(&star, rgba(255, 255, 255, alpha));
        }
    }
}

impl Effect for Crown {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        if self.clock.advance(frame.tick) {
            self.sparkle_time += 0.1;
        }
        if !self.model.ready() {
            return;
        }
        self.model.observe(frame.tick, surface);

        let Some(faces) = self.model.latest() else {
            return;
        };
        let mut painter = surface.painter();
        for bbox in faces.iter().filter_map(|f| f.bbox) {
            self.draw(&mut painter, &CrownLayout::for_face(&bbox));
        }
    }

    fn reset(&mut self) {
        self.model.clear();
    }

    fn retry_inference(&mut self) -> bool {
        self.model.retry()
    }
}
