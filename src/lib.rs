//! Selfie Camera - real-time camera effects with snapshot capture
//!
//! Captures live video from a user-facing camera, runs every frame through a
//! user-selected effect (colour grading, particle systems, ML-powered face
//! decorations and background replacement), and encodes the composited frame
//! as a PNG on demand.

pub mod app;
pub mod camera;
pub mod config;
pub mod effects;
pub mod ml;
pub mod render;

pub use app::App;
