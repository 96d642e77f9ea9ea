//! Camera capture module
//!
//! [`FrameSource`] owns the active stream and the facing preference. Streams
//! come from a [`CameraBackend`]; [`NokhwaBackend`] drives real devices with
//! frames captured on a background thread.

mod capture;
mod source;
#[cfg(test)]
mod synthetic;

use std::time::Instant;

pub use capture::NokhwaBackend;
pub use source::FrameSource;
#[cfg(test)]
pub(crate) use synthetic::{SyntheticBackend, SyntheticFeed};

/// Camera frame data
#[derive(Clone)]
pub struct CameraFrame {
    /// RGBA pixel data
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frame number
    pub frame_number: u64,
    /// Frame timestamp
    pub timestamp: Instant,
}

/// Information about an available camera
#[derive(Clone, Debug)]
pub struct CameraInfo {
    /// Camera index
    pub index: u32,
    /// Camera name
    pub name: String,
}

/// Which way the requested camera faces
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// User-facing; frames are mirrored before effects run
    #[default]
    Front,
    /// Environment-facing; frames are drawn as captured
    Back,
}

impl Facing {
    pub fn flipped(self) -> Self {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }

    pub fn is_mirrored(self) -> bool {
        self == Facing::Front
    }
}

/// Stream open request
#[derive(Clone, Debug)]
pub struct StreamRequest {
    pub facing: Facing,
    /// Preferred (not mandatory) resolution
    pub ideal_width: u32,
    pub ideal_height: u32,
    /// Explicit device index, overriding facing-based selection
    pub device: Option<u32>,
}

/// Camera acquisition errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera access was denied")]
    PermissionDenied,
    #[error("No camera found")]
    NotFound,
    #[error("Camera is in use by another application")]
    Busy,
    #[error("Camera unavailable: {0}")]
    Unavailable(String),
}

impl CameraError {
    /// Classify a backend error message
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        if ["permission", "denied", "not authorized", "unauthorized"]
            .iter()
            .any(|k| lower.contains(k))
        {
            CameraError::PermissionDenied
        } else if ["busy", "in use", "already in use", "resource temporarily unavailable"]
            .iter()
            .any(|k| lower.contains(k))
        {
            CameraError::Busy
        } else if ["not found", "no device", "no such", "no camera", "out of range", "invalid index"]
            .iter()
            .any(|k| lower.contains(k))
        {
            CameraError::NotFound
        } else {
            CameraError::Unavailable(message.to_string())
        }
    }
}

/// Source of camera streams
pub trait CameraBackend: Send {
    /// List video input devices
    fn enumerate(&self) -> Result<Vec<CameraInfo>, CameraError>;

    /// Open a stream. Returns once the stream is delivering frames and its
    /// native resolution is known.
    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError>;

    /// Whether the platform is a phone or tablet (front/back cameras are
    /// assumed even when enumeration reports a single device)
    fn is_mobile(&self) -> bool {
        cfg!(any(target_os = "android", target_os = "ios"))
    }
}

/// A running camera stream
pub trait CameraStream: Send {
    /// Latest decoded frame, if any
    fn latest_frame(&self) -> Option<CameraFrame>;

    /// Native stream resolution
    fn resolution(&self) -> (u32, u32);

    /// Stop frame delivery. Idempotent.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            CameraError::classify("Could not open device: Permission denied (os error 13)"),
            CameraError::PermissionDenied
        );
        assert_eq!(
            CameraError::classify("Device or resource busy"),
            CameraError::Busy
        );
        assert_eq!(
            CameraError::classify("No such file or directory"),
            CameraError::NotFound
        );
        assert!(matches!(
            CameraError::classify("format negotiation failed"),
            CameraError::Unavailable(_)
        ));
    }

    #[test]
    fn test_facing() {
        assert_eq!(Facing::default(), Facing::Front);
        assert!(Facing::Front.is_mirrored());
        assert!(!Facing::Back.is_mirrored());
        assert_eq!(Facing::Front.flipped(), Facing::Back);
    }
}
