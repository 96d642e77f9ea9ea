//! Digital glitch: split colour channels, torn scanlines and static

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo, TickGate};
use crate::render::painter::rgba;
use crate::render::RenderSurface;

const CHANNEL_SHIFT: i64 = 5;
const TEAR_ATTEMPTS: usize = 20;

pub struct Glitch {
    descriptor: EffectDescriptor,
    rng: StdRng,
    tick_seed: u64,
    clock: TickGate,
    /// Scratch copy of the source pixels
    source: Vec<u8>,
}

impl Glitch {
    pub fn new() -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "glitch",
                name: "Glitch",
                icon: "📺",
                category: Category::Special,
            },
            rng: StdRng::from_os_rng(),
            tick_seed: 0,
            clock: TickGate::new(),
            source: Vec::new(),
        }
    }

    /// Use a deterministic random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Default for Glitch {
    fn default() -> Self {
        Self::new()
    }
}

/// Red is sampled from `CHANNEL_SHIFT` pixels to the left, blue from the
/// right; samples outside the frame keep the original value
fn split_channels(data: &mut [u8], source: &[u8], width: u32) {
    let width = width as i64;
    for (i, px) in data.chunks_exact_mut(4).enumerate() {
        let i = i as i64;
        let x = i % width;
        if x - CHANNEL_SHIFT >= 0 {
            px[0] = source[((i - CHANNEL_SHIFT) * 4) as usize];
        }
        if x + CHANNEL_SHIFT < width {
            px[2] = source[((i + CHANNEL_SHIFT) * 4 + 2) as usize];
        }
    }
}

/// Move row `y` horizontally by `offset` pixels, clearing what is left behind
fn tear_row(data: &mut [u8], width: u32, y: u32, offset: i64) {
    let row_bytes = width as usize * 4;
    let start = y as usize * row_bytes;
    let Some(row) = data.get_mut(start..start + row_bytes) else {
        return;
    };
    let line = row.to_vec();
    row.fill(0);
    for x in 0..width as i64 {
        let dst = x + offset;
        if (0..width as i64).contains(&dst) {
            let (s, d) = (x as usize * 4, dst as usize * 4);
            row[d..d + 4].copy_from_slice(&line[s..s + 4]);
        }
    }
}

impl Effect for Glitch {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        if self.clock.advance(frame.tick) {
            self.tick_seed = self.rng.random();
        }
        let (width, height) = surface.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let mut rng = StdRng::seed_from_u64(self.tick_seed);

        self.source.clear();
        self.source.extend_from_slice(surface.pixels_mut());
        split_channels(surface.pixels_mut(), &self.source, width);

        for _ in 0..TEAR_ATTEMPTS {
            let y = rng.random_range(0..height);
            let offset = (rng.random::<f32>() - 0.5) * 20.0;
            if rng.random::<f32>() > 0.7 {
                tear_row(surface.pixels_mut(), width, y, offset.floor() as i64);
            }
        }

        let specks = (width as f32 * height as f32 * 0.05) as usize;
        let mut painter = surface.painter();
        for _ in 0..specks {
            let x = rng.random_range(0..width);
            let y = rng.random_range(0..height);
            let alpha = rng.random::<f32>() * 0.3;
            painter.blend_pixel(x as i64, y as i64, rgba(255, 255, 255, alpha));
        }
    }

    fn reset(&mut self) {
        self.clock.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SurfaceKind;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_split_channels_shifts_red_and_blue() {
        // 12 pixels in one row, each channel encodes its column
        let source: Vec<u8> = (0..12u8).flat_map(|x| [x, x, x, 255]).collect();
        let mut data = source.clone();
        split_channels(&mut data, &source, 12);

        let px = |x: usize| &data[x * 4..x * 4 + 4];
        assert_eq!(px(6), &[1, 6, 11, 255]);
        // Edges keep their own samples
        assert_eq!(px(0), &[0, 0, 5, 255]);
        assert_eq!(px(11), &[6, 11, 11, 255]);
    }

    #[test]
    fn test_tear_row_moves_and_clears() {
        let mut data: Vec<u8> = (0..4u8).flat_map(|x| [x + 1, 0, 0, 255]).collect();
        tear_row(&mut data, 4, 0, 2);
        assert_eq!(data, vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 255, 2, 0, 0, 255]);

        // Out of range rows are ignored
        tear_row(&mut data, 4, 5, 1);
    }

    #[test]
    fn test_surfaces_match_within_tick() {
        let mut glitch = Glitch::new().with_seed(11);
        let frame = RgbaImage::from_fn(40, 30, |x, y| Rgba([x as u8 * 6, y as u8 * 8, 128, 255]));

        let mut capture = RenderSurface::from_image(frame.clone());
        let mut display = RenderSurface::from_image(frame.clone());
        glitch.apply(&mut capture, &FrameInfo::new(4, SurfaceKind::Capture));
        glitch.apply(&mut display, &FrameInfo::new(4, SurfaceKind::Display));
        assert_eq!(capture.image().as_raw(), display.image().as_raw());
        assert_ne!(capture.image().as_raw(), frame.as_raw());
    }

    #[test]
    fn test_degenerate_surface() {
        let mut glitch = Glitch::new().with_seed(1);
        let mut surface = RenderSurface::new(0, 0);
        glitch.apply(&mut surface, &FrameInfo::new(0, SurfaceKind::Display));
        assert_eq!(surface.dimensions(), (0, 0));
    }
}
