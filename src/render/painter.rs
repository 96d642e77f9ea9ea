//! Alpha-blended 2D drawing on a render surface
//!
//! Thin layer over `imageproc::drawing` (which draws through a [`Blend`]
//! canvas so translucent colours composite over the frame) plus the gradient
//! fills the effects need.

use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_ellipse_mut, draw_filled_rect_mut, draw_hollow_circle_mut,
    draw_line_segment_mut, draw_polygon_mut, Blend,
};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// CSS-style colour: 8-bit channels with a [0, 1] alpha
pub fn rgba(r: u8, g: u8, b: u8, a: f32) -> Rgba<u8> {
    Rgba([r, g, b, (a.clamp(0.0, 1.0) * 255.0).round() as u8])
}

/// Scale a colour's alpha by `alpha`
pub fn with_alpha(color: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let a = (color[3] as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
    Rgba([color[0], color[1], color[2], a])
}

/// Colour at position `t` along a list of (offset, colour) gradient stops
pub fn gradient_color(stops: &[(f32, Rgba<u8>)], t: f32) -> Rgba<u8> {
    let Some(&(first_offset, first)) = stops.first() else {
        return Rgba([0, 0, 0, 0]);
    };
    if t <= first_offset {
        return first;
    }
    for pair in stops.windows(2) {
        let (o0, c0) = pair[0];
        let (o1, c1) = pair[1];
        if t <= o1 {
            let span = (o1 - o0).max(f32::EPSILON);
            let f = ((t - o0) / span).clamp(0.0, 1.0);
            let mut out = [0u8; 4];
            for (i, channel) in out.iter_mut().enumerate() {
                *channel = (c0[i] as f32 + (c1[i] as f32 - c0[i] as f32) * f).round() as u8;
            }
            return Rgba(out);
        }
    }
    stops[stops.len() - 1].1
}

/// Blended drawing on an RGBA image
pub struct Painter<'a> {
    image: &'a mut RgbaImage,
}

impl<'a> Painter<'a> {
    pub fn new(image: &'a mut RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    fn blended<R>(&mut self, draw: impl FnOnce(&mut Blend<RgbaImage>) -> R) -> R {
        let mut canvas = Blend(std::mem::take(&mut *self.image));
        let result = draw(&mut canvas);
        *self.image = canvas.0;
        result
    }

    /// Composite `color` over the pixel at (x, y), ignoring out-of-bounds coordinates
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        if x < 0 || y < 0 || x >= self.image.width() as i64 || y >= self.image.height() as i64 {
            return;
        }
        self.image.get_pixel_mut(x as u32, y as u32).blend(&color);
    }

    pub fn fill_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
        if radius <= 0.0 || color[3] == 0 {
            return;
        }
        let center = (cx.round() as i32, cy.round() as i32);
        let r = radius.round().max(1.0) as i32;
        self.blended(|canvas| draw_filled_circle_mut(canvas, center, r, color));
    }

    pub fn stroke_circle(&mut self, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
        if radius <= 0.0 || color[3] == 0 {
            return;
        }
        let center = (cx.round() as i32, cy.round() as i32);
        let r = radius.round().max(1.0) as i32;
        self.blended(|canvas| draw_hollow_circle_mut(canvas, center, r, color));
    }

    pub fn fill_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, color: Rgba<u8>) {
        if rx <= 0.0 || ry <= 0.0 || color[3] == 0 {
            return;
        }
        let center = (cx.round() as i32, cy.round() as i32);
        let (rx, ry) = (rx.round().max(1.0) as i32, ry.round().max(1.0) as i32);
        self.blended(|canvas| draw_filled_ellipse_mut(canvas, center, rx, ry, color));
    }

    pub fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Rgba<u8>) {
        if color[3] == 0 {
            return;
        }
        self.blended(|canvas| draw_line_segment_mut(canvas, from, to, color));
    }

    /// Fill an axis-aligned rectangle, clipped to the image
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
        let Some((x0, y0, x1, y1)) = self.clip_rect(x, y, w, h) else {
            return;
        };
        if color[3] == 0 {
            return;
        }
        let rect = Rect::at(x0 as i32, y0 as i32).of_size(x1 - x0, y1 - y0);
        self.blended(|canvas| draw_filled_rect_mut(canvas, rect, color));
    }

    /// Fill a polygon. Open or closed point lists are both accepted.
    pub fn fill_polygon(&mut self, points: &[(f32, f32)], color: Rgba<u8>) {
        let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
        for &(x, y) in points {
            let p = Point::new(x.round() as i32, y.round() as i32);
            if poly.last() != Some(&p) {
                poly.push(p);
            }
        }
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() < 3 || color[3] == 0 {
            return;
        }
        self.blended(|canvas| draw_polygon_mut(canvas, &poly, color));
    }

    /// Fill a polygon with a per-pixel colour (even-odd rule)
    pub fn fill_polygon_with(
        &mut self,
        points: &[(f32, f32)],
        mut shade: impl FnMut(f32, f32) -> Rgba<u8>,
    ) {
        if points.len() < 3 {
            return;
        }
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for &(x, y) in points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let Some((x0, y0, x1, y1)) = self.clip_rect(min_x, min_y, max_x - min_x + 1.0, max_y - min_y + 1.0)
        else {
            return;
        };

        for py in y0..y1 {
            let sy = py as f32 + 0.5;
            for px in x0..x1 {
                let sx = px as f32 + 0.5;
                if point_in_polygon(points, sx, sy) {
                    let color = shade(sx, sy);
                    if color[3] > 0 {
                        self.image.get_pixel_mut(px, py).blend(&color);
                    }
                }
            }
        }
    }

    /// Fill a rectangle with a radial gradient centred on (cx, cy). Pixels
    /// beyond `radius` take the last stop, as canvas gradients do.
    pub fn radial_gradient_rect(
        &mut self,
        rect: (f32, f32, f32, f32),
        center: (f32, f32),
        radius: f32,
        stops: &[(f32, Rgba<u8>)],
        alpha: f32,
    ) {
        let Some((x0, y0, x1, y1)) = self.clip_rect(rect.0, rect.1, rect.2, rect.3) else {
            return;
        };
        self.radial_fill(x0, y0, x1, y1, center, radius, stops, alpha, None);
    }

    /// Fill a disc with a radial gradient whose origin is `focus`
    pub fn radial_gradient_circle(
        &mut self,
        center: (f32, f32),
        radius: f32,
        focus: (f32, f32),
        stops: &[(f32, Rgba<u8>)],
        alpha: f32,
    ) {
        if radius <= 0.0 {
            return;
        }
        let Some((x0, y0, x1, y1)) = self.clip_rect(
            center.0 - radius,
            center.1 - radius,
            radius * 2.0 + 1.0,
            radius * 2.0 + 1.0,
        ) else {
            return;
        };
        self.radial_fill(x0, y0, x1, y1, focus, radius, stops, alpha, Some((center, radius)));
    }

    #[allow(clippy::too_many_arguments)]
    fn radial_fill(
        &mut self,
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
        origin: (f32, f32),
        radius: f32,
        stops: &[(f32, Rgba<u8>)],
        alpha: f32,
        disc: Option<((f32, f32), f32)>,
    ) {
        if radius <= 0.0 || alpha <= 0.0 {
            return;
        }
        for py in y0..y1 {
            let sy = py as f32 + 0.5;
            for px in x0..x1 {
                let sx = px as f32 + 0.5;
                if let Some(((cx, cy), r)) = disc {
                    if (sx - cx).powi(2) + (sy - cy).powi(2) > r * r {
                        continue;
                    }
                }
                let t = ((sx - origin.0).powi(2) + (sy - origin.1).powi(2)).sqrt() / radius;
                let color = with_alpha(gradient_color(stops, t), alpha);
                if color[3] > 0 {
                    self.image.get_pixel_mut(px, py).blend(&color);
                }
            }
        }
    }

    /// Clip a float rectangle to the image as integer [x0, x1) x [y0, y1)
    fn clip_rect(&self, x: f32, y: f32, w: f32, h: f32) -> Option<(u32, u32, u32, u32)> {
        if !(w > 0.0 && h > 0.0) {
            return None;
        }
        let (width, height) = self.image.dimensions();
        let x0 = x.floor().clamp(0.0, width as f32) as u32;
        let y0 = y.floor().clamp(0.0, height as f32) as u32;
        let x1 = (x + w).ceil().clamp(0.0, width as f32) as u32;
        let y1 = (y + h).ceil().clamp(0.0, height as f32) as u32;
        (x1 > x0 && y1 > y0).then_some((x0, y0, x1, y1))
    }
}

fn point_in_polygon(points: &[(f32, f32)], x: f32, y: f32) -> bool {
    let mut inside = false;
    let mut j = points.len() - 1;
    for i in 0..points.len() {
        let (xi, yi) = points[i];
        let (xj, yj) = points[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_color_interpolates() {
        let stops = [(0.0, Rgba([0, 0, 0, 255])), (1.0, Rgba([200, 100, 50, 255]))];
        assert_eq!(gradient_color(&stops, 0.5), Rgba([100, 50, 25, 255]));
        assert_eq!(gradient_color(&stops, -1.0), Rgba([0, 0, 0, 255]));
        assert_eq!(gradient_color(&stops, 3.0), Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn test_fill_rect_clips_to_image() {
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let mut painter = Painter::new(&mut image);
        painter.fill_rect(-10.0, 2.0, 100.0, 100.0, Rgba([255, 0, 0, 255]));
        painter.fill_rect(10.0, 10.0, 5.0, 5.0, Rgba([0, 255, 0, 255]));
        assert_eq!(*image.get_pixel(0, 3), Rgba([255, 0, 0, 255]));
        assert_eq!(*image.get_pixel(3, 1), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_translucent_fill_blends() {
        let mut image = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        Painter::new(&mut image).fill_circle(1.0, 1.0, 1.0, rgba(255, 255, 255, 0.5));
        let center = image.get_pixel(1, 1);
        assert!(center[0] > 100 && center[0] < 160);
        assert_eq!(center[3], 255);
    }

    #[test]
    fn test_polygon_with_closing_point() {
        let mut image = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let square = [(1.0, 1.0), (8.0, 1.0), (8.0, 8.0), (1.0, 8.0), (1.0, 1.0)];
        Painter::new(&mut image).fill_polygon(&square, Rgba([0, 0, 255, 255]));
        assert_eq!(*image.get_pixel(4, 4), Rgba([0, 0, 255, 255]));

        let mut image = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        Painter::new(&mut image).fill_polygon_with(&square, |_, _| Rgba([9, 9, 9, 255]));
        assert_eq!(*image.get_pixel(4, 4), Rgba([9, 9, 9, 255]));
        assert_eq!(*image.get_pixel(9, 9), Rgba([0, 0, 0, 255]));
    }
}
