//! Render surfaces
//!
//! A [`RenderSurface`] is a fixed-size RGBA8 buffer. The render loop keeps two
//! of them (display and capture) at the camera's native resolution.

use image::{Rgba, RgbaImage};

use crate::camera::CameraFrame;

/// Which of the two surfaces an effect is drawing to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Shown to the user
    Display,
    /// Encoded by capture
    Capture,
}

/// RGBA8 pixel buffer with fixed dimensions
pub struct RenderSurface {
    image: RgbaImage,
}

impl RenderSurface {
    /// Create a transparent surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    /// Wrap an existing image
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Read-only view of the pixels
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Mutable view of the pixels
    ///
    /// Only the pixel contents can change through this; the buffer is never
    /// handed out by value so effects cannot resize it.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    /// Copy the surface contents
    pub fn snapshot(&self) -> RgbaImage {
        self.image.clone()
    }

    /// Replace the pixels with a same-sized image. Returns false (and leaves
    /// the surface untouched) when the dimensions differ.
    pub fn replace(&mut self, image: RgbaImage) -> bool {
        if image.dimensions() != self.image.dimensions() {
            return false;
        }
        self.image = image;
        true
    }

    /// Blended drawing on this surface
    pub fn painter(&mut self) -> super::painter::Painter<'_> {
        super::painter::Painter::new(&mut self.image)
    }

    /// Fill every pixel with one colour
    pub fn clear(&mut self, color: Rgba<u8>) {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
    }

    /// Draw a camera frame onto the surface, flipping it horizontally when
    /// `mirrored` so that x maps to `width - 1 - x`
    ///
    /// Returns false if the frame does not match the surface dimensions.
    pub fn draw_frame(&mut self, frame: &CameraFrame, mirrored: bool) -> bool {
        let (width, height) = self.image.dimensions();
        if frame.width != width || frame.height != height {
            return false;
        }
        let row_bytes = (width * 4) as usize;
        if frame.data.len() < row_bytes * height as usize {
            return false;
        }

        let dst: &mut [u8] = &mut self.image;
        if !mirrored {
            dst.copy_from_slice(&frame.data[..row_bytes * height as usize]);
            return true;
        }

        for (src_row, dst_row) in frame
            .data
            .chunks_exact(row_bytes)
            .zip(dst.chunks_exact_mut(row_bytes))
        {
            for (src_px, dst_px) in src_row
                .chunks_exact(4)
                .rev()
                .zip(dst_row.chunks_exact_mut(4))
            {
                dst_px.copy_from_slice(src_px);
            }
        }
        true
    }
}
