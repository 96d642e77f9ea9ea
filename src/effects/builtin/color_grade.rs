//! Templated colour grading
//!
//! Every grade is a pure per-pixel function of RGB; alpha is never touched.
//! Results are rounded and clamped to the 8-bit range.

use image::Rgba;

use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo};
use crate::render::painter::rgba;
use crate::render::RenderSurface;

/// Rec. 601 luma
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

fn to_channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// A per-pixel colour function
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Grade {
    /// Per-channel `c * scale + offset`
    Affine { scale: [f32; 3], offset: [f32; 3] },
    /// 3x3 colour matrix, rows produce r, g, b
    Matrix([[f32; 3]; 3]),
    /// Grayscale from luma
    Luma,
    /// Four-band false-colour intensity map
    Thermal,
    /// Inverted, contrast-boosted luma with a blue tint and scanlines
    XRay,
}

impl Grade {
    pub const fn scale(r: f32, g: f32, b: f32) -> Self {
        Grade::Affine {
            scale: [r, g, b],
            offset: [0.0; 3],
        }
    }

    pub const fn affine(scale: [f32; 3], offset: [f32; 3]) -> Self {
        Grade::Affine { scale, offset }
    }

    /// Map one RGB triple
    pub fn map(&self, [r, g, b]: [u8; 3]) -> [u8; 3] {
        let (r, g, b) = (r as f32, g as f32, b as f32);
        match self {
            Grade::Affine { scale, offset } => [
                to_channel(r * scale[0] + offset[0]),
                to_channel(g * scale[1] + offset[1]),
                to_channel(b * scale[2] + offset[2]),
            ],
            Grade::Matrix(m) => {
                let row = |i: usize| to_channel(r * m[i][0] + g * m[i][1] + b * m[i][2]);
                [row(0), row(1), row(2)]
            }
            Grade::Luma => {
                let l = to_channel(luminance(r, g, b));
                [l, l, l]
            }
            Grade::Thermal => thermal(luminance(r, g, b) / 255.0),
            Grade::XRay => {
                let inverted = 255.0 - luminance(r, g, b);
                let enhanced = (inverted / 255.0).powf(0.4) * 255.0;
                [
                    to_channel(enhanced * 0.3),
                    to_channel(enhanced * 0.6),
                    to_channel(enhanced),
                ]
            }
        }
    }
}

fn thermal(intensity: f32) -> [u8; 3] {
    let floor = |v: f32| v.floor().clamp(0.0, 255.0) as u8;
    if intensity < 0.25 {
        [floor(intensity * 4.0 * 100.0), 0, floor(intensity * 4.0 * 200.0)]
    } else if intensity < 0.5 {
        let t = (intensity - 0.25) * 4.0;
        [0, floor(t * 200.0), floor(255.0 - t * 100.0)]
    } else if intensity < 0.75 {
        let t = (intensity - 0.5) * 4.0;
        [floor(t * 255.0), 255, floor(255.0 - t * 255.0)]
    } else {
        let t = (intensity - 0.75) * 4.0;
        [255, floor(255.0 - t * 255.0), 0]
    }
}

const SEPIA: [[f32; 3]; 3] = [
    [0.393, 0.769, 0.189],
    [0.349, 0.686, 0.168],
    [0.272, 0.534, 0.131],
];

/// A stateless full-frame colour grade
pub struct ColorGrade {
    descriptor: EffectDescriptor,
    grade: Grade,
}

impl ColorGrade {
    pub fn new(descriptor: EffectDescriptor, grade: Grade) -> Self {
        Self { descriptor, grade }
    }

    fn color(id: &'static str, name: &'static str, icon: &'static str, grade: Grade) -> Self {
        Self::new(
            EffectDescriptor {
                id,
                name,
                icon,
                category: Category::Color,
            },
            grade,
        )
    }

    /// Saturated boost, listed with the basic effects
    pub fn vivid() -> Self {
        Self::new(
            EffectDescriptor {
                id: "vivid",
                name: "Vivid",
                icon: "🌈",
                category: Category::Basic,
            },
            Grade::scale(1.5, 1.5, 1.5),
        )
    }

    pub fn monochrome() -> Self {
        Self::color("monochrome", "Monochrome", "⚫", Grade::Luma)
    }

    /// The colour-category grades in catalog order
    pub fn catalog() -> Vec<Self> {
        vec![
            Self::monochrome(),
            Self::color("sepia", "Sepia", "🟤", Grade::Matrix(SEPIA)),
            Self::color("warm", "Warm", "🔥", Grade::scale(1.3, 1.1, 0.8)),
            Self::color("cool", "Cool", "❄️", Grade::scale(0.7, 0.9, 1.3)),
            Self::color(
                "pastel",
                "Pastel",
                "🎀",
                Grade::affine([0.7; 3], [76.5; 3]),
            ),
            Self::color(
                "dreamy",
                "Dreamy",
                "✨",
                Grade::affine([0.9, 0.8, 1.1], [30.0, 20.0, 40.0]),
            ),
            Self::color(
                "emerald",
                "Emerald",
                "💚",
                Grade::affine([0.6, 1.4, 0.8], [-10.0, 40.0, 15.0]),
            ),
            Self::color(
                "ocean",
                "Ocean",
                "🌊",
                Grade::affine([0.5, 1.1, 1.4], [-20.0, 30.0, 50.0]),
            ),
            Self::color(
                "lavender",
                "Lavender",
                "💜",
                Grade::affine([1.1, 0.8, 1.3], [25.0, 15.0, 45.0]),
            ),
            Self::color(
                "sunset",
                "Sunset",
                "🌅",
                Grade::affine([1.2, 0.9, 0.6], [40.0, 20.0, -10.0]),
            ),
            Self::color(
                "cherry",
                "Cherry",
                "🍒",
                Grade::affine([1.3, 0.7, 0.9], [35.0, -15.0, 25.0]),
            ),
            Self::color("thermal", "Thermal", "🌡️", Grade::Thermal),
            Self::color("xray", "X-Ray", "🦴", Grade::XRay),
        ]
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }
}

impl Effect for ColorGrade {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, surface: &mut RenderSurface, _frame: &FrameInfo) {
        for px in surface.pixels_mut().chunks_exact_mut(4) {
            let [r, g, b] = self.grade.map([px[0], px[1], px[2]]);
            px[0] = r;
            px[1] = g;
            px[2] = b;
        }

        if self.grade == Grade::XRay {
            let (width, height) = surface.dimensions();
            let stripe: Rgba<u8> = rgba(0, 150, 255, 0.1);
            let mut painter = surface.painter();
            for y in (0..height).step_by(4) {
                painter.fill_rect(0.0, y as f32, width as f32, 2.0, stripe);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SurfaceKind;

    fn apply_to_solid(effect: &mut ColorGrade, color: [u8; 4]) -> RenderSurface {
        let mut surface = RenderSurface::from_image(image::RgbaImage::from_pixel(3, 3, Rgba(color)));
        effect.apply(&mut surface, &FrameInfo::new(1, SurfaceKind::Display));
        surface
    }

    #[test]
    fn test_monochrome_uses_luma() {
        let surface = apply_to_solid(&mut ColorGrade::monochrome(), [100, 150, 200, 77]);
        // round(100 * 0.299 + 150 * 0.587 + 200 * 0.114) = 141
        for px in surface.image().pixels() {
            assert_eq!(*px, Rgba([141, 141, 141, 77]));
        }
    }

    #[test]
    fn test_grade_is_deterministic() {
        for mut effect in ColorGrade::catalog() {
            let a = apply_to_solid(&mut effect, [12, 200, 99, 255]);
            let b = apply_to_solid(&mut effect, [12, 200, 99, 255]);
            assert_eq!(a.image().as_raw(), b.image().as_raw(), "{}", effect.id());
        }
    }

    #[test]
    fn test_affine_grades_clamp() {
        assert_eq!(Grade::scale(1.5, 1.5, 1.5).map([200, 100, 0]), [255, 150, 0]);
        assert_eq!(
            Grade::affine([0.5, 1.1, 1.4], [-20.0, 30.0, 50.0]).map([10, 0, 255]),
            [0, 30, 255]
        );
        assert_eq!(Grade::affine([0.7; 3], [76.5; 3]).map([0, 0, 0]), [77, 77, 77]);
    }

    #[test]
    fn test_sepia_matrix() {
        assert_eq!(Grade::Matrix(SEPIA).map([100, 100, 100]), [135, 120, 94]);
        assert_eq!(Grade::Matrix(SEPIA).map([255, 255, 255]), [255, 255, 239]);
    }

    #[test]
    fn test_thermal_bands() {
        assert_eq!(Grade::Thermal.map([0, 0, 0]), [0, 0, 0]);
        assert_eq!(Grade::Thermal.map([255, 255, 255]), [255, 0, 0]);
        // Intensity 0.5 lands in the cyan-to-yellow band
        let mid = Grade::Thermal.map([128, 128, 128]);
        assert_eq!(mid[1], 255);
    }

    #[test]
    fn test_xray_stripes_every_fourth_row() {
        let mut effect = ColorGrade::catalog()
            .into_iter()
            .find(|e| e.id() == "xray")
            .unwrap();
        let mut surface = RenderSurface::from_image(image::RgbaImage::from_pixel(
            2,
            8,
            Rgba([255, 255, 255, 255]),
        ));
        effect.apply(&mut surface, &FrameInfo::new(1, SurfaceKind::Capture));

        // White inverts to black; scanline rows pick up a faint blue
        assert_eq!(surface.pixel(0, 2), Rgba([0, 0, 0, 255]));
        assert!(surface.pixel(0, 0)[2] > 0);
        assert!(surface.pixel(0, 1)[2] > 0);
        assert!(surface.pixel(0, 4)[2] > 0);
    }
}
