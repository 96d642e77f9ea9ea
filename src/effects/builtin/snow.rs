//! Falling snowflakes

use rand::Rng;

use super::particles::ParticleSystem;
use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo};
use crate::render::painter::rgba;
use crate::render::{Painter, RenderSurface};

/// Maximum number of live flakes
pub const MAX_FLAKES: usize = 400;

struct Flake {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    size: f32,
    /// Degrees
    rotation: f32,
    rotation_speed: f32,
}

pub struct Snow {
    descriptor: EffectDescriptor,
    flakes: ParticleSystem<Flake>,
}

impl Snow {
    pub fn new() -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "snow",
                name: "Snow",
                icon: "❄️",
                category: Category::Decorate,
            },
            flakes: ParticleSystem::new(MAX_FLAKES),
        }
    }

    /// Use a deterministic random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.flakes.seed(seed);
        self
    }

    pub fn flake_count(&self) -> usize {
        self.flakes.len()
    }
}

impl Default for Snow {
    fn default() -> Self {
        Self::new()
    }
}

fn rotate((x, y): (f32, f32), radians: f32) -> (f32, f32) {
    let (sin, cos) = radians.sin_cos();
    (x * cos - y * sin, x * sin + y * cos)
}

fn draw_flake(painter: &mut Painter<'_>, flake: &Flake) {
    let color = rgba(255, 255, 255, 0.8);
    let size = flake.size;
    let at = |p: (f32, f32), arm: f32| {
        let (x, y) = rotate(p, flake.rotation.to_radians() + arm);
        (flake.x + x, flake.y + y)
    };

    for i in 0..6 {
        let arm = (i as f32 * 60.0).to_radians();
        painter.line(at((0.0, 0.0), arm), at((0.0, -size), arm), color);
        let fork = at((0.0, -size * 0.6), arm);
        painter.line(fork, at((-size * 0.3, -size * 0.8), arm), color);
        painter.line(fork, at((size * 0.3, -size * 0.8), arm), color);
    }
    painter.fill_circle(flake.x, flake.y, size * 0.1, color);
}

impl Effect for Snow {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        let (width, height) = (surface.width() as f32, surface.height() as f32);

        self.flakes.step(
            frame.tick,
            |rng, out| {
                if rng.random::<f32>() > 0.88 {
                    let count = rng.random_range(1..=4);
                    for _ in 0..count {
                        out.push(Flake {
                            x: rng.random::<f32>() * width,
                            y: -10.0,
                            vx: (rng.random::<f32>() - 0.5) * 1.5,
                            vy: rng.random::<f32>() + 0.5,
                            size: rng.random::<f32>() * 6.0 + 2.0,
                            rotation: rng.random::<f32>() * 360.0,
                            rotation_speed: (rng.random::<f32>() - 0.5) * 4.0,
                        });
                    }
                }
            },
            |flake| {
                flake.x += flake.vx + (flake.y * 0.01).sin() * 0.3;
                flake.y += flake.vy;
                flake.rotation += flake.rotation_speed;
                flake.y < height + 20.0
            },
        );

        let mut painter = surface.painter();
        for flake in self.flakes.particles() {
            draw_flake(&mut painter, flake);
        }
    }

    fn reset(&mut self) {
        self.flakes.clear();
    }
}
