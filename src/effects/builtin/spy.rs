//! Near-black viewfinder with a spy HUD
//!
//! Display only: the on-screen preview goes dark while captures keep the
//! normally exposed frame.

use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo};
use crate::render::painter::rgba;
use crate::render::{Painter, RenderSurface};

const DIM: f32 = 0.05;
const GRID_SPACING: usize = 50;

pub struct Spy {
    descriptor: EffectDescriptor,
}

impl Spy {
    pub fn new() -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "spy",
                name: "Spy Camera",
                icon: "🕵️",
                category: Category::Special,
            },
        }
    }
}

impl Default for Spy {
    fn default() -> Self {
        Self::new()
    }
}

fn darken(data: &mut [u8]) {
    for px in data.chunks_exact_mut(4) {
        for c in &mut px[..3] {
            *c = (*c as f32 * DIM).round() as u8;
        }
    }
}

/// Recording dot is lit during the positive half of a ~628ms cycle
fn recording_dot_lit(elapsed_ms: f64) -> bool {
    (elapsed_ms * 0.01).sin() > 0.0
}

fn draw_hud(painter: &mut Painter<'_>, elapsed_ms: f64) {
    let (w, h) = (painter.width() as f32, painter.height() as f32);
    let grid = rgba(0, 255, 0, 0.1);
    for x in (0..painter.width() as usize).step_by(GRID_SPACING) {
        painter.fill_rect(x as f32, 0.0, 1.0, h, grid);
    }
    for y in (0..painter.height() as usize).step_by(GRID_SPACING) {
        painter.fill_rect(0.0, y as f32, w, 1.0, grid);
    }

    painter.fill_rect(10.0, 10.0, 120.0, 30.0, rgba(0, 255, 0, 0.3));

    if recording_dot_lit(elapsed_ms) {
        painter.fill_circle(w - 20.0, 20.0, 5.0, rgba(255, 0, 0, 1.0));
    }
}

impl Effect for Spy {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn display_only(&self) -> bool {
        true
    }

    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo) {
        darken(surface.pixels_mut());
        draw_hud(&mut surface.painter(), frame.elapsed.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SurfaceKind;
    use image::{Rgba, RgbaImage};
    use std::time::Duration;

    fn mean_luminance(image: &RgbaImage) -> f64 {
        let total: f64 = image
            .pixels()
            .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
            .sum();
        total / (image.width() * image.height()) as f64
    }

    #[test]
    fn test_display_is_nearly_black() {
        let input = RgbaImage::from_pixel(320, 240, Rgba([255, 255, 255, 255]));
        let mut surface = RenderSurface::from_image(input.clone());
        Spy::new().apply(&mut surface, &FrameInfo::new(0, SurfaceKind::Display));

        let before = mean_luminance(&input);
        let after = mean_luminance(surface.image());
        assert!(after <= before * 0.1, "luminance {after} vs {before}");
        // Alpha is untouched
        assert!(surface.image().pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn test_darken_keeps_alpha() {
        let mut data = vec![200, 100, 20, 77];
        darken(&mut data);
        assert_eq!(data, vec![10, 5, 1, 77]);
    }

    #[test]
    fn test_recording_dot_blinks() {
        assert!(recording_dot_lit(100.0));
        assert!(!recording_dot_lit(400.0));

        let mut frame = FrameInfo::new(0, SurfaceKind::Display);
        let black = RgbaImage::from_pixel(100, 60, Rgba([0, 0, 0, 255]));

        frame.elapsed = Duration::from_millis(100);
        let mut lit = RenderSurface::from_image(black.clone());
        Spy::new().apply(&mut lit, &frame);
        assert_eq!(lit.pixel(80, 20)[0], 255);

        frame.elapsed = Duration::from_millis(400);
        let mut dark = RenderSurface::from_image(black);
        Spy::new().apply(&mut dark, &frame);
        assert_eq!(dark.pixel(80, 20)[0], 0);
    }
}
