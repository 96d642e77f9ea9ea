//! Rendering: surfaces, drawing, the per-tick compositor, still capture and
//! background camera control

pub mod capture;
pub mod painter;
pub mod pipeline;
pub mod surface;
pub mod worker;

pub use capture::{CaptureError, CapturedImage};
pub use painter::Painter;
pub use pipeline::{EffectSelection, RenderLoop, TickOutcome, DEFAULT_TARGET_FPS};
pub use surface::{RenderSurface, SurfaceKind};
pub use worker::{CameraOutcome, CameraRequest, SharedRenderLoop};
