//! Soft, hazy "cloud" look: lifted blue-leaning tones plus drifting white puffs

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo, TickGate};
use crate::render::painter::rgba;
use crate::render::RenderSurface;

const PUFFS: usize = 5;

pub struct Cloud {
    descriptor: EffectDescriptor,
    rng: StdRng,
    /// Puff layout seed for the current tick
    tick_seed: u64,
    clock: TickGate,
}

impl Cloud {
    pub fn new() -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "cloud",
                name: "Cloud",
                icon: "☁️",
                category: Category::Basic,
            },
            rng: StdRng::from_os_rng(),
            tick_seed: 0,
            clock: TickGate::new(),
        }
    }

    /// Use a deterministic random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Default for Cloud {
    fn default() -> Self {
        Self::new()
    }
}

fn haze(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        px[0] = px[0].saturating_add(50);
        px[1] = px[1].saturating_add(50);
        px[2] = px[2].saturating_add(70);
        px[3] = (px[3] as f32 * 0.9).round() as u8;
    }
}

impl Effect for Cloud {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        if self.clock.advance(frame.tick) {
            self.tick_seed = self.rng.random();
        }
        haze(surface.pixels_mut());

        let (w, h) = (surface.width() as f32, surface.height() as f32);
        let mut rng = StdRng::seed_from_u64(self.tick_seed);
        let mut painter = surface.painter();
        for _ in 0..PUFFS {
            let x = rng.random::<f32>() * w;
            let y = rng.random::<f32>() * h;
            let radius = rng.random::<f32>() * 100.0 + 50.0;
            painter.fill_circle(x, y, radius, rgba(255, 255, 255, 0.3));
        }
    }

    fn reset(&mut self) {
        self.clock.reset();
    }
}
