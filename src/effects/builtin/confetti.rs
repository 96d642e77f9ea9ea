//! Falling confetti

use image::Rgba;
use rand::Rng;

use super::particles::ParticleSystem;
use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo};
use crate::render::RenderSurface;

/// Maximum number of live pieces
pub const MAX_PIECES: usize = 300;

const COLORS: [[u8; 3]; 6] = [
    [0xFF, 0x69, 0xB4],
    [0xFF, 0xD7, 0x00],
    [0x00, 0xCE, 0xD1],
    [0xFF, 0x63, 0x47],
    [0x98, 0xFB, 0x98],
    [0xDD, 0xA0, 0xDD],
];

struct Piece {
    x: f32,
    y: f32,
    vx: f32,
    vy: f32,
    /// Degrees
    rotation: f32,
    color: Rgba<u8>,
    size: f32,
}

impl Piece {
    /// Corners of the size x size/2 strip, rotated about its centre
    fn corners(&self) -> [(f32, f32); 4] {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let (hw, hh) = (self.size / 2.0, self.size / 4.0);
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)]
            .map(|(x, y)| (self.x + x * cos - y * sin, self.y + x * sin + y * cos))
    }
}

pub struct Confetti {
    descriptor: EffectDescriptor,
    pieces: ParticleSystem<Piece>,
}

impl Confetti {
    pub fn new() -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "confetti",
                name: "Confetti",
                icon: "🎊",
                category: Category::Decorate,
            },
            pieces: ParticleSystem::new(MAX_PIECES),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.pieces.seed(seed);
        self
    }

    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }
}

impl Default for Confetti {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for Confetti {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        let (width, height) = (surface.width() as f32, surface.height() as f32);

        self.pieces.step(
            frame.tick,
            |rng, out| {
                if rng.random::<f32>() > 0.8 {
                    for _ in 0..3 {
                        let [r, g, b] = COLORS[rng.random_range(0..COLORS.len())];
                        out.push(Piece {
                            x: rng.random::<f32>() * width,
                            y: -10.0,
                            vx: (rng.random::<f32>() - 0.5) * 4.0,
                            vy: rng.random::<f32>() * 3.0 + 2.0,
                            rotation: rng.random::<f32>() * 360.0,
                            color: Rgba([r, g, b, 255]),
                            size: rng.random::<f32>() * 8.0 + 4.0,
                        });
                    }
                }
            },
            |piece| {
                piece.x += piece.vx;
                piece.y += piece.vy;
                piece.rotation += 5.0;
                piece.vy += 0.1;
                piece.y < height + 20.0
            },
        );

        let mut painter = surface.painter();
        for piece in self.pieces.particles() {
            painter.fill_polygon(&piece.corners(), piece.color);
        }
    }

    fn reset(&mut self) {
        self.pieces.clear();
    }
}
