//! Background replacement behind the segmented person
//!
//! Backdrops are diagonal gradients; each time the effect is re-selected it
//! moves on to the next one.

use image::Rgba;

use super::tracked::TrackedModel;
use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo, InferenceContext};
use crate::ml::{BodySegmenter, SegmentationMask};
use crate::render::painter::gradient_color;
use crate::render::RenderSurface;

type Stops = [(f32, Rgba<u8>); 3];

const fn rgb(hex: u32) -> Rgba<u8> {
    Rgba([(hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255])
}

/// Diagonal gradient backdrops, (0, 0) to (width, height)
const BACKDROPS: [Stops; 5] = [
    [(0.0, rgb(0xff9a9e)), (0.5, rgb(0xfecfef)), (1.0, rgb(0xfecfef))],
    [(0.0, rgb(0xa1c4fd)), (0.5, rgb(0xc2e9fb)), (1.0, rgb(0xc2e9fb))],
    [(0.0, rgb(0xd4fc79)), (0.5, rgb(0x96e6a1)), (1.0, rgb(0x96e6a1))],
    [(0.0, rgb(0xfbc2eb)), (0.5, rgb(0xa6c1ee)), (1.0, rgb(0xa6c1ee))],
    [(0.0, rgb(0xffecd2)), (0.5, rgb(0xfcb69f)), (1.0, rgb(0xfcb69f))],
];

pub struct BackgroundReplace {
    descriptor: EffectDescriptor,
    model: TrackedModel<dyn BodySegmenter, Option<SegmentationMask>>,
    current: usize,
    /// Rendered backdrop for `current` at `backdrop_size`
    backdrop: Vec<Rgba<u8>>,
    backdrop_size: (u32, u32),
}

impl BackgroundReplace {
    pub fn new(inference: InferenceContext) -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "background",
                name: "Background",
                icon: "🖼️",
                category: Category::Background,
            },
            model: TrackedModel::segmentation("background", inference),
            current: 0,
            backdrop: Vec::new(),
            backdrop_size: (0, 0),
        }
    }

    /// Index of the backdrop in use
    pub fn current_backdrop(&self) -> usize {
        self.current
    }

    fn render_backdrop(&mut self, width: u32, height: u32) {
        let stops = &BACKDROPS[self.current];
        let (w, h) = (width as f32, height as f32);
        let len2 = (w * w + h * h).max(f32::EPSILON);
        self.backdrop.clear();
        self.backdrop.reserve((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let t = ((x as f32 + 0.5) * w + (y as f32 + 0.5) * h) / len2;
                self.backdrop.push(gradient_color(stops, t));
            }
        }
        self.backdrop_size = (width, height);
    }
}

impl Effect for BackgroundReplace {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        if !self.model.ready() {
            return;
        }
        self.model.observe(frame.tick, surface);

        let Some(latest) = self.model.latest() else {
            return;
        };
        let Some(mask) = latest.as_ref() else {
            return;
        };

        let (width, height) = surface.dimensions();
        if self.backdrop_size != (width, height) {
            self.render_backdrop(width, height);
        }
        let data = surface.pixels_mut();
        for (i, (px, color)) in data.chunks_exact_mut(4).zip(&self.backdrop).enumerate() {
            let (x, y) = (i as u32 % width, i as u32 / width);
            if !mask.is_person(x, y, width, height) {
                px.copy_from_slice(&color.0);
            }
        }
    }

    fn reset(&mut self) {
        self.model.clear();
        self.current = (self.current + 1) % BACKDROPS.len();
        self.backdrop_size = (0, 0);
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
    use crate::render::SurfaceKind;
    use image::RgbaImage;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replaces_only_background() {
        let mask = SegmentationMask {
            mask: vec![1.0, 0.0],
            width: 2,
            height: 1,
        };
        let ctx = ready_context(
            tokio::runtime::Handle::current(),
            FixedFaces(Vec::new()),
            FixedMask(Some(mask)),
        );
        let mut effect = BackgroundReplace::new(ctx);
        let original = RgbaImage::from_pixel(8, 4, Rgba([0, 0, 0, 255]));

        let mut surface = RenderSurface::from_image(original.clone());
        for tick in 0..200 {
            surface = RenderSurface::from_image(original.clone());
            effect.apply(&mut surface, &FrameInfo::new(tick, SurfaceKind::Capture));
            if surface.pixel(7, 0) != Rgba([0, 0, 0, 255]) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(surface.pixel(x, y), Rgba([0, 0, 0, 255]));
            }
            for x in 4..8 {
                assert_ne!(surface.pixel(x, y), Rgba([0, 0, 0, 255]));
            }
        }
    }

    #[tokio::test]
    async fn test_reset_cycles_backdrops() {
        let ctx = ready_context(
            tokio::runtime::Handle::current(),
            FixedFaces(Vec::new()),
            FixedMask(None),
        );
        let mut effect = BackgroundReplace::new(ctx);
        assert_eq!(effect.current_backdrop(), 0);
        for _ in 0..BACKDROPS.len() {
            effect.reset();
        }
        assert_eq!(effect.current_backdrop(), 0);
        effect.reset();
        assert_eq!(effect.current_backdrop(), 1);
    }
}
