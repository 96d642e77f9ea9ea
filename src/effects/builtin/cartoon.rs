//! Cartoon shading: posterize, darken Sobel edges, boost saturation

use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo};
use crate::render::RenderSurface;

/// Levels per channel after quantization
const LEVELS: u32 = 4;

pub struct Cartoon {
    descriptor: EffectDescriptor,
    edges: Vec<f32>,
}

impl Cartoon {
    pub fn new() -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "cartoon",
                name: "Cartoon",
                icon: "🎬",
                category: Category::Color,
            },
            edges: Vec::new(),
        }
    }
}

impl Default for Cartoon {
    fn default() -> Self {
        Self::new()
    }
}

fn quantize(v: u8) -> u8 {
    let step = 255.0 / (LEVELS - 1) as f32;
    ((v as f32 / step).round() * step).round().clamp(0.0, 255.0) as u8
}

/// Sobel magnitude of the channel-mean intensity, normalized and capped at 1.
/// The one-pixel border has no full neighbourhood and stays at 0.
fn detect_edges(data: &[u8], width: usize, height: usize, edges: &mut Vec<f32>) {
    const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
    const SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

    edges.clear();
    edges.resize(width * height, 0.0);
    if width < 3 || height < 3 {
        return;
    }

    let intensity = |x: usize, y: usize| {
        let i = (y * width + x) * 4;
        (data[i] as f32 + data[i + 1] as f32 + data[i + 2] as f32) / 3.0
    };

    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let (mut gx, mut gy) = (0.0, 0.0);
            for ky in 0..3 {
                for kx in 0..3 {
                    let v = intensity(x + kx - 1, y + ky - 1);
                    gx += v * SOBEL_X[ky * 3 + kx];
                    gy += v * SOBEL_Y[ky * 3 + kx];
                }
            }
            edges[y * width + x] = ((gx * gx + gy * gy).sqrt() / 255.0).min(1.0);
        }
    }
}

fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;
    let mut h = 0.0;
    if diff != 0.0 {
        h = if max == r {
            ((g - b) / diff) % 6.0
        } else if max == g {
            (b - r) / diff + 2.0
        } else {
            (r - g) / diff + 4.0
        };
    }
    h /= 6.0;
    if h < 0.0 {
        h += 1.0;
    }
    let s = if max == 0.0 { 0.0 } else { diff / max };
    (h, s, max)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h * 6.0) % 2.0 - 1.0).abs());
    let m = v - c;
    let (r, g, b) = match h {
        h if h < 1.0 / 6.0 => (c, x, 0.0),
        h if h < 2.0 / 6.0 => (x, c, 0.0),
        h if h < 3.0 / 6.0 => (0.0, c, x),
        h if h < 4.0 / 6.0 => (0.0, x, c),
        h if h < 5.0 / 6.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    (
        ((r + m) * 255.0).round(),
        ((g + m) * 255.0).round(),
        ((b + m) * 255.0).round(),
    )
}

impl Effect for Cartoon {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, _frame: &FrameInfo) {
        let (width, height) = surface.dimensions();
        let data = surface.pixels_mut();

        for px in data.chunks_exact_mut(4) {
            px[0] = quantize(px[0]);
            px[1] = quantize(px[1]);
            px[2] = quantize(px[2]);
        }

        detect_edges(data, width as usize, height as usize, &mut self.edges);

        for (px, &edge) in data.chunks_exact_mut(4).zip(self.edges.iter()) {
            let (h, s, v) = rgb_to_hsv(px[0] as f32 / 255.0, px[1] as f32 / 255.0, px[2] as f32 / 255.0);
            let (r, g, b) = hsv_to_rgb(h, (s * 1.5).min(1.0), (v * 1.1).min(1.0));
            let factor = 1.0 - edge * 0.7;
            px[0] = (r * factor).floor().clamp(0.0, 255.0) as u8;
            px[1] = (g * factor).floor().clamp(0.0, 255.0) as u8;
            px[2] = (b * factor).floor().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SurfaceKind;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_quantize_levels() {
        assert_eq!(quantize(0), 0);
        assert_eq!(quantize(40), 0);
        assert_eq!(quantize(50), 85);
        assert_eq!(quantize(200), 170);
        assert_eq!(quantize(255), 255);
    }

    #[test]
    fn test_flat_gray_has_no_edges() {
        let mut surface =
            RenderSurface::from_image(RgbaImage::from_pixel(5, 5, Rgba([170, 170, 170, 255])));
        Cartoon::new().apply(&mut surface, &FrameInfo::new(1, SurfaceKind::Display));
        // Gray has no saturation to boost; value 2/3 * 1.1 -> 187
        for px in surface.image().pixels() {
            assert_eq!(*px, Rgba([187, 187, 187, 255]));
        }
    }

    #[test]
    fn test_edges_darken_boundary() {
        let mut image = RgbaImage::from_pixel(6, 6, Rgba([255, 255, 255, 255]));
        for y in 0..6 {
            for x in 0..3 {
                image.put_pixel(x, y, Rgba([0, 0, 0, 255]));
            }
        }
        let mut surface = RenderSurface::from_image(image);
        Cartoon::new().apply(&mut surface, &FrameInfo::new(1, SurfaceKind::Display));

        // Interior white pixel next to the boundary is darkened; border column is not
        assert!(surface.pixel(3, 2)[0] < 255);
        assert_eq!(surface.pixel(5, 2), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_tiny_surface_is_safe() {
        let mut surface = RenderSurface::from_image(RgbaImage::from_pixel(1, 2, Rgba([10, 200, 30, 255])));
        Cartoon::new().apply(&mut surface, &FrameInfo::new(1, SurfaceKind::Display));
        assert_eq!(surface.dimensions(), (1, 2));
    }
}
