//! Fading sparkles

use rand::Rng;

use super::particles::ParticleSystem;
use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo};
use crate::render::painter::rgba;
use crate::render::RenderSurface;

/// Maximum number of live sparkles
pub const MAX_SPARKLES: usize = 100;

struct Glint {
    x: f32,
    y: f32,
    size: f32,
    opacity: f32,
}

/// Points of a star with `spikes` points alternating between the radii,
/// starting straight up
pub(crate) fn star_points(cx: f32, cy: f32, outer: f32, inner: f32, spikes: usize) -> Vec<(f32, f32)> {
    let step = std::f32::consts::PI / spikes as f32;
    let mut rot = std::f32::consts::FRAC_PI_2 * 3.0;
    let mut points = Vec::with_capacity(spikes * 2);
    for _ in 0..spikes {
        points.push((cx + rot.cos() * outer, cy + rot.sin() * outer));
        rot += step;
        points.push((cx + rot.cos() * inner, cy + rot.sin() * inner));
        rot += step;
    }
    points
}

pub struct Sparkle {
    descriptor: EffectDescriptor,
    glints: ParticleSystem<Glint>,
}

impl Sparkle {
    pub fn new() -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "sparkle",
                name: "Sparkle",
                icon: "✨",
                category: Category::Decorate,
            },
            glints: ParticleSystem::new(MAX_SPARKLES),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.glints.seed(seed);
        self
    }

    pub fn sparkle_count(&self) -> usize {
        self.glints.len()
    }
}

impl Default for Sparkle {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Sparkle {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        let (width, height) = (surface.width() as f32, surface.height() as f32);

        self.glints.step(
            frame.tick,
            |rng, out| {
                if rng.random::<f32>() > 0.7 {
                    out.push(Glint {
                        x: rng.random::<f32>() * width,
                        y: rng.random::<f32>() * height,
                        size: rng.random::<f32>() * 20.0 + 10.0,
                        opacity: 1.0,
                    });
                }
            },
            |glint| {
                glint.opacity -= 0.02;
                glint.opacity > 0.0
            },
        );

        let stops = [
            (0.0, rgba(255, 255, 255, 1.0)),
            (0.5, rgba(255, 223, 186, 0.8)),
            (1.0, rgba(255, 223, 186, 0.0)),
        ];
        let mut painter = surface.painter();
        for g in self.glints.particles() {
            // Drawn at the opacity from before this tick's fade
            let opacity = g.opacity + 0.02;
            painter.radial_gradient_rect(
                (g.x - g.size, g.y - g.size, g.size * 2.0, g.size * 2.0),
                (g.x, g.y),
                g.size,
                &stops,
                opacity,
            );
            painter.fill_polygon(
                &star_points(g.x, g.y, g.size / 2.0, 0.5, 4),
                rgba(255, 255, 255, 0.8 * opacity),
            );
        }
    }

    fn reset(&mut self) {
        self.glints.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SurfaceKind;

    #[test]
    fn test_sparkles_fade_out() {
        let mut sparkle = Sparkle::new().with_seed(21);
        let mut surface = RenderSurface::new(64, 48);
        for tick in 0..10_000 {
            sparkle.apply(&mut surface, &FrameInfo::new(tick, SurfaceKind::Display));
            // Each glint lives about 50 ticks and at most one spawns per tick
            assert!(sparkle.sparkle_count() <= 52);
        }
    }

    #[test]
    fn test_star_points_start_at_top() {
        let points = star_points(10.0, 10.0, 5.0, 1.0, 4);
        assert_eq!(points.len(), 8);
        assert!((points[0].0 - 10.0).abs() < 1e-4);
        assert!((points[0].1 - 5.0).abs() < 1e-4);
    }
}
