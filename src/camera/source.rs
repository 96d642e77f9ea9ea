//! Frame source: the active camera stream and its facing preference

use super::{CameraBackend, CameraError, CameraFrame, CameraInfo, CameraStream, Facing, StreamRequest};

/// Owns the camera stream the render loop reads from
pub struct FrameSource {
    backend: Box<dyn CameraBackend>,
    stream: Option<Box<dyn CameraStream>>,
    facing: Facing,
    ideal_width: u32,
    ideal_height: u32,
    device: Option<u32>,
    /// Overrides the backend's mobile detection for the switch heuristic
    mobile_override: Option<bool>,
}

impl FrameSource {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self {
            backend,
            stream: None,
            facing: Facing::Front,
            ideal_width: 640,
            ideal_height: 480,
            device: None,
            mobile_override: None,
        }
    }

    /// Set the preferred (not mandatory) stream resolution
    pub fn with_ideal_resolution(mut self, width: u32, height: u32) -> Self {
        self.ideal_width = width.max(1);
        self.ideal_height = height.max(1);
        self
    }

    /// Pin the stream to a device index
    pub fn with_device(mut self, device: Option<u32>) -> Self {
        self.device = device;
        self
    }

    pub fn with_mobile_override(mut self, mobile: Option<bool>) -> Self {
        self.mobile_override = mobile;
        self
    }

    /// Open a stream for `facing`, replacing any running stream
    ///
    /// Returns the stream's native resolution once it is delivering frames.
    pub fn start(&mut self, facing: Facing) -> Result<(u32, u32), CameraError> {
        self.stop();
        self.facing = facing;

        let request = StreamRequest {
            facing,
            ideal_width: self.ideal_width,
            ideal_height: self.ideal_height,
            device: self.device,
        };
        let stream = self.backend.open(&request)?;
        let resolution = stream.resolution();
        log::info!(
            "Camera stream started ({:?}, {}x{})",
            facing,
            resolution.0,
            resolution.1
        );
        self.stream = Some(stream);
        Ok(resolution)
    }

    /// List video input devices
    pub fn enumerate(&self) -> Result<Vec<CameraInfo>, CameraError> {
        self.backend.enumerate()
    }

    /// Whether switching between front and back is offered
    ///
    /// True with more than one device, or on mobile platforms where a single
    /// enumerated device still usually means two physical cameras.
    pub fn can_switch(&self) -> bool {
        if self.mobile_override.unwrap_or_else(|| self.backend.is_mobile()) {
            return true;
        }
        match self.enumerate() {
            Ok(devices) => devices.len() > 1,
            Err(e) => {
                log::warn!("Failed to enumerate cameras: {}", e);
                false
            }
        }
    }

    /// Stop the current stream and restart with the opposite facing
    ///
    /// On failure the facing preference reverts and no stream is running; the
    /// caller has to `start` again.
    pub fn switch(&mut self) -> Result<(u32, u32), CameraError> {
        let previous = self.facing;
        match self.start(previous.flipped()) {
            Ok(resolution) => Ok(resolution),
            Err(e) => {
                log::warn!("Failed to switch camera: {}", e);
                self.facing = previous;
                Err(e)
            }
        }
    }

    /// Stop the stream. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            log::info!("Camera stream stopped");
        }
    }

    /// Latest decoded frame. `None` until the stream has decoded one.
    pub fn latest_frame(&self) -> Option<CameraFrame> {
        self.stream.as_ref().and_then(|s| s.latest_frame())
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Whether frames are flipped horizontally before effects
    pub fn is_mirrored(&self) -> bool {
        self.facing.is_mirrored()
    }

    pub fn resolution(&self) -> Option<(u32, u32)> {
        self.stream.as_ref().map(|s| s.resolution())
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{SyntheticBackend, SyntheticFeed};

    #[test]
    fn test_start_reports_resolution() {
        let feed = SyntheticFeed::solid(8, 6, [1, 2, 3, 255]);
        let mut source = FrameSource::new(Box::new(SyntheticBackend::new(feed)));
        assert!(source.latest_frame().is_none());

        assert_eq!(source.start(Facing::Front).unwrap(), (8, 6));
        assert!(source.is_active());
        assert!(source.is_mirrored());
        assert!(source.latest_frame().is_some());
    }

    #[test]
    fn test_start_failure_is_typed() {
        let backend = SyntheticBackend::new(SyntheticFeed::solid(2, 2, [0; 4]));
        backend.fail_next_open(CameraError::PermissionDenied);
        let mut source = FrameSource::new(Box::new(backend));

        assert_eq!(source.start(Facing::Front), Err(CameraError::PermissionDenied));
        assert!(!source.is_active());
    }

    #[test]
    fn test_switch_flips_facing() {
        let backend = SyntheticBackend::dual(
            SyntheticFeed::solid(4, 4, [255, 0, 0, 255]),
            SyntheticFeed::solid(6, 2, [0, 0, 255, 255]),
        );
        let log = backend.open_log();
        let mut source = FrameSource::new(Box::new(backend));

        assert!(source.can_switch());
        source.start(Facing::Front).unwrap();
        assert_eq!(source.switch().unwrap(), (6, 2));
        assert_eq!(source.facing(), Facing::Back);
        assert!(!source.is_mirrored());
        assert_eq!(*log.lock(), vec![Facing::Front, Facing::Back]);
    }

    #[test]
    fn test_failed_switch_reverts_facing_and_stays_stopped() {
        let backend = SyntheticBackend::dual(
            SyntheticFeed::solid(4, 4, [255, 0, 0, 255]),
            SyntheticFeed::solid(4, 4, [0, 0, 255, 255]),
        );
        let failure = backend.failure_handle();
        let mut source = FrameSource::new(Box::new(backend));

        source.start(Facing::Front).unwrap();
        *failure.lock() = Some(CameraError::Busy);

        assert_eq!(source.switch(), Err(CameraError::Busy));
        assert_eq!(source.facing(), Facing::Front);
        assert!(!source.is_active());
        assert!(source.latest_frame().is_none());

        // Caller restarts explicitly
        source.start(source.facing()).unwrap();
        assert!(source.is_active());
    }

    #[test]
    fn test_switch_heuristic() {
        let single = FrameSource::new(Box::new(SyntheticBackend::new(SyntheticFeed::empty())));
        assert!(!single.can_switch());

        let mobile = FrameSource::new(Box::new(
            SyntheticBackend::new(SyntheticFeed::empty()).with_mobile(true),
        ));
        assert!(mobile.can_switch());

        let forced = FrameSource::new(Box::new(SyntheticBackend::new(SyntheticFeed::empty())))
            .with_mobile_override(Some(true));
        assert!(forced.can_switch());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut source = FrameSource::new(Box::new(SyntheticBackend::new(SyntheticFeed::solid(
            2,
            2,
            [0; 4],
        ))));
        source.stop();
        source.start(Facing::Back).unwrap();
        source.stop();
        source.stop();
        assert!(!source.is_active());
        assert!(source.latest_frame().is_none());
    }
}
