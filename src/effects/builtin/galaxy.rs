//! Animated spiral galaxy behind the segmented person

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::tracked::TrackedModel;
use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo, InferenceContext, TickGate};
use crate::ml::{BodySegmenter, SegmentationMask};
use crate::render::painter::rgba;
use crate::render::{Painter, RenderSurface};

const STAR_COUNT: usize = 200;
const NEBULA_COUNT: usize = 5;

struct Star {
    x: f32,
    y: f32,
    brightness: f32,
    size: f32,
    twinkle: f32,
}

pub struct Galaxy {
    descriptor: EffectDescriptor,
    model: TrackedModel<dyn BodySegmenter, Option<SegmentationMask>>,
    stars: Vec<Star>,
    /// Surface size the stars were scattered over
    star_field: (u32, u32),
    time: f32,
    clock: TickGate,
    rng: StdRng,
    /// Spiral field for the current tick, shared by both surfaces
    backdrop: Vec<[u8; 3]>,
    backdrop_size: (u32, u32),
}

impl Galaxy {
    pub fn new(inference: InferenceContext) -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "galaxy",
                name: "Galaxy",
                icon: "🌌",
                category: Category::Background,
            },
            model: TrackedModel::segmentation("galaxy", inference),
            stars: Vec::new(),
            star_field: (0, 0),
            time: 0.0,
            clock: TickGate::new(),
            rng: StdRng::from_os_rng(),
            backdrop: Vec::new(),
            backdrop_size: (0, 0),
        }
    }

    /// Scatter the stars over a `width` x `height` surface unless they
    /// already cover it
    fn ensure_stars(&mut self, width: u32, height: u32) {
        if !self.stars.is_empty() && self.star_field == (width, height) {
            return;
        }
        self.star_field = (width, height);
        let rng = &mut self.rng;
        self.stars = (0..STAR_COUNT)
            .map(|_| Star {
                x: rng.random::<f32>() * width as f32,
                y: rng.random::<f32>() * height as f32,
                brightness: rng.random::<f32>(),
                size: rng.random::<f32>() * 3.0 + 1.0,
                twinkle: rng.random::<f32>() * std::f32::consts::TAU,
            })
            .collect();
    }

    fn render_backdrop(&mut self, width: u32, height: u32) {
        self.backdrop.clear();
        self.backdrop.reserve((width * height) as usize);
        self.backdrop_size = (width, height);
        for y in 0..height {
            for x in 0..width {
                self.backdrop.push(spiral_color(x as f32, y as f32, width as f32, height as f32, self.time));
            }
        }
    }

    fn draw_overlays(&self, painter: &mut Painter<'_>, width: f32, height: f32) {
        for star in &self.stars {
            let alpha = (star.twinkle.sin() * 0.5 + 0.5) * star.brightness;
            painter.fill_circle(star.x, star.y, star.size, rgba(255, 255, 255, alpha));
            painter.fill_circle(star.x, star.y, star.size * 3.0, rgba(255, 255, 255, alpha * 0.3));
        }

        let stops = [
            (0.0, rgba(255, 100, 200, 0.3)),
            (0.5, rgba(100, 150, 255, 0.2)),
            (1.0, rgba(255, 100, 200, 0.0)),
        ];
        for i in 0..NEBULA_COUNT {
            let phase = self.time + i as f32;
            let x = (width / 6.0) * (i + 1) as f32 + phase.sin() * 50.0;
            let y = height / 2.0 + (self.time * 0.7 + i as f32).cos() * 100.0;
            let size = 80.0 + phase.sin() * 20.0;
            painter.radial_gradient_circle((x, y), size, (x, y), &stops, 1.0);
        }
    }
}

/// Galaxy colour at (x, y) on a `width` x `height` surface
fn spiral_color(x: f32, y: f32, width: f32, height: f32, time: f32) -> [u8; 3] {
    let (cx, cy) = (width / 2.0, height / 2.0);
    let max_distance = cx.hypot(cy).max(f32::EPSILON);
    let normalized = (x - cx).hypot(y - cy) / max_distance;

    let angle = (y - cy).atan2(x - cx) + time;
    let spiral = (angle * 3.0 + normalized * 10.0 + time * 2.0).sin() * 0.5 + 0.5;
    let brightness = (1.0 - normalized * 0.7) * spiral;

    let channel = |base: f32, boost: f32| (base + brightness * boost).round().clamp(0.0, 255.0) as u8;
    [
        channel(20.0 + spiral * 50.0, 100.0),
        channel(10.0 + spiral * 30.0, 50.0),
        channel(40.0 + spiral * 80.0, 120.0),
    ]
}

/// Replace every non-person pixel with the backdrop colour
fn composite_background(
    data: &mut [u8],
    backdrop: &[[u8; 3]],
    mask: &SegmentationMask,
    width: u32,
    height: u32,
) {
    for (i, (px, color)) in data.chunks_exact_mut(4).zip(backdrop).enumerate() {
        let (x, y) = (i as u32 % width, i as u32 / width);
        if !mask.is_person(x, y, width, height) {
            px[..3].copy_from_slice(color);
            px[3] = 255;
        }
    }
}

impl Effect for Galaxy {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        let (width, height) = surface.dimensions();
        let new_tick = self.clock.advance(frame.tick);
        if new_tick {
            self.time += 0.02;
        }
        if !self.model.ready() {
            return;
        }
        self.ensure_stars(width, height);
        self.model.observe(frame.tick, surface);

        let Some(latest) = self.model.latest() else {
            return;
        };
        let Some(mask) = latest.as_ref() else {
            return;
        };

        if new_tick {
            for star in &mut self.stars {
                star.twinkle += 0.1;
            }
        }
        if new_tick || self.backdrop_size != (width, height) {
            self.render_backdrop(width, height);
        }

        composite_background(surface.pixels_mut(), &self.backdrop, mask, width, height);
        self.draw_overlays(&mut surface.painter(), width as f32, height as f32);
    }

    fn reset(&mut self) {
        self.model.clear();
        self.stars.clear();
        self.star_field = (0, 0);
        self.backdrop.clear();
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
    use image::{Rgba, RgbaImage};
    use std::time::Duration;

    #[test]
    fn test_spiral_is_deterministic_in_time() {
        let a = spiral_color(3.0, 7.0, 32.0, 24.0, 0.5);
        let b = spiral_color(3.0, 7.0, 32.0, 24.0, 0.5);
        assert_eq!(a, b);
        assert_ne!(spiral_color(3.0, 7.0, 32.0, 24.0, 0.5), spiral_color(3.0, 7.0, 32.0, 24.0, 1.7));
    }

    #[test]
    fn test_composite_keeps_person() {
        let mask = SegmentationMask {
            mask: vec![1.0, 0.0],
            width: 2,
            height: 1,
        };
        let mut data = vec![1, 2, 3, 255, 1, 2, 3, 255, 1, 2, 3, 255, 1, 2, 3, 255];
        let backdrop = [[100, 50, 200]; 4];
        composite_background(&mut data, &backdrop, &mask, 4, 1);
        assert_eq!(&data[..8], &[1, 2, 3, 255, 1, 2, 3, 255]);
        assert_eq!(&data[8..], &[100, 50, 200, 255, 100, 50, 200, 255]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_background_is_replaced() {
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
        let mut galaxy = Galaxy::new(ctx);
        let original = RgbaImage::from_pixel(400, 300, Rgba([1, 2, 3, 255]));

        let mut replaced = false;
        for tick in 0..200 {
            let mut surface = RenderSurface::from_image(original.clone());
            galaxy.apply(&mut surface, &FrameInfo::new(tick, SurfaceKind::Display));
            if surface.pixel(399, 0) != Rgba([1, 2, 3, 255]) {
                replaced = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(replaced);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stars_rescatter_on_resize() {
        let ctx = ready_context(
            tokio::runtime::Handle::current(),
            FixedFaces(Vec::new()),
            FixedMask(None),
        );
        let mut galaxy = Galaxy::new(ctx);
        galaxy.ensure_stars(1280, 720);
        assert_eq!(galaxy.stars.len(), STAR_COUNT);

        galaxy.ensure_stars(120, 40);
        assert_eq!(galaxy.star_field, (120, 40));
        assert!(galaxy.stars.iter().all(|s| s.x < 120.0 && s.y < 40.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_no_mask_leaves_frame() {
        let ctx = ready_context(
            tokio::runtime::Handle::current(),
            FixedFaces(Vec::new()),
            FixedMask(None),
        );
        let mut galaxy = Galaxy::new(ctx);
        let original = RgbaImage::from_pixel(20, 20, Rgba([9, 9, 9, 255]));
        let mut surface = RenderSurface::from_image(original.clone());
        for tick in 0..40 {
            galaxy.apply(&mut surface, &FrameInfo::new(tick, SurfaceKind::Display));
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert_eq!(surface.image().as_raw(), original.as_raw());
    }
}
