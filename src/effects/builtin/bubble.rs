//! Rising soap bubbles

use rand::Rng;

use super::particles::ParticleSystem;
use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo};
use crate::render::painter::rgba;
use crate::render::RenderSurface;

/// Maximum number of live bubbles
pub const MAX_BUBBLES: usize = 200;

struct Bubble {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    size: f32,
    opacity: f32,
    life: f32,
}

pub struct Bubbles {
    descriptor: EffectDescriptor,
    bubbles: ParticleSystem<Bubble>,
}

impl Bubbles {
    pub fn new() -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "bubble",
                name: "Bubbles",
                icon: "🫧",
                category: Category::Decorate,
            },
            bubbles: ParticleSystem::new(MAX_BUBBLES),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.bubbles.seed(seed);
        self
    }

    pub fn bubble_count(&self) -> usize {
        self.bubbles.len()
    }
}

impl Default for Bubbles {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Bubbles {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        let (width, height) = (surface.width() as f32, surface.height() as f32);

        self.bubbles.step(
            frame.tick,
            |rng, out| {
                if rng.random::<f32>() > 0.9 {
                    for _ in 0..rng.random_range(1..=3) {
                        out.push(Bubble {
                            x: rng.random::<f32>() * width,
                            y: height + 10.0,
                            vx: (rng.random::<f32>() - 0.5) * 2.0,
                            vy: -(rng.random::<f32>() * 2.0 + 1.0),
                            size: rng.random::<f32>() * 30.0 + 10.0,
                            opacity: rng.random::<f32>() * 0.8 + 0.2,
                            life: 1.0,
                        });
                    }
                }
            },
            |bubble| {
                bubble.x += bubble.vx;
                bubble.y += bubble.vy;
                bubble.vx *= 0.99;
                bubble.vy += 0.01;
                bubble.life -= 0.005;
                bubble.opacity = bubble.life * 0.6;
                bubble.life > 0.0 && bubble.y > -50.0
            },
        );

        let stops = [
            (0.0, rgba(255, 255, 255, 0.8)),
            (0.3, rgba(200, 230, 255, 0.4)),
            (0.7, rgba(150, 200, 255, 0.2)),
            (1.0, rgba(100, 150, 255, 0.1)),
        ];
        let mut painter = surface.painter();
        for b in self.bubbles.particles() {
            let highlight = (b.x - b.size * 0.3, b.y - b.size * 0.3);
            painter.radial_gradient_circle((b.x, b.y), b.size, highlight, &stops, b.opacity);
            painter.fill_circle(
                highlight.0,
                highlight.1,
                b.size * 0.2,
                rgba(255, 255, 255, 0.6 * b.opacity),
            );
            painter.stroke_circle(b.x, b.y, b.size, rgba(200, 230, 255, 0.8 * b.opacity));
        }
    }

    fn reset(&mut self) {
        self.bubbles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SurfaceKind;

    #[test]
    fn test_bubble_count_stays_bounded() {
        let mut bubbles = Bubbles::new().with_seed(9);
        let mut surface = RenderSurface::new(40, 30);
        for tick in 0..10_000 {
            bubbles.apply(&mut surface, &FrameInfo::new(tick, SurfaceKind::Display));
            assert!(bubbles.bubble_count() <= MAX_BUBBLES);
        }
    }

    #[test]
    fn test_bubbles_drift_over_frame() {
        let mut bubbles = Bubbles::new().with_seed(11);
        let mut surface = RenderSurface::from_image(image::RgbaImage::from_pixel(
            64,
            64,
            image::Rgba([0, 0, 0, 255]),
        ));
        for tick in 0..300 {
            bubbles.apply(&mut surface, &FrameInfo::new(tick, SurfaceKind::Display));
        }
        assert!(surface.image().pixels().any(|p| p[2] > 0));
    }
}
