//! Synthetic camera backend
//!
//! Serves frames from a shared [`SyntheticFeed`] instead of a device.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::{Rgba, RgbaImage};
use parking_lot::Mutex;

use super::{CameraBackend, CameraError, CameraFrame, CameraInfo, CameraStream, Facing, StreamRequest};

/// Shared handle to the image a synthetic stream delivers
///
/// An empty feed models a stream that is open but has not decoded a frame yet.
#[derive(Clone, Default)]
pub struct SyntheticFeed {
    image: Arc<Mutex<Option<RgbaImage>>>,
    truncated: Arc<AtomicBool>,
}

impl SyntheticFeed {
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(Mutex::new(Some(image))),
            truncated: Arc::default(),
        }
    }

    /// A feed that has not produced a frame yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// A solid-colour feed
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    /// Replace the delivered image
    pub fn publish(&self, image: RgbaImage) {
        *self.image.lock() = Some(image);
    }

    pub fn current(&self) -> Option<RgbaImage> {
        self.image.lock().clone()
    }

    /// Deliver frames whose pixel buffer is one row short
    pub fn set_truncated(&self, truncated: bool) {
        self.truncated.store(truncated, Ordering::Relaxed);
    }
}

/// Camera backend producing frames from a [`SyntheticFeed`]
pub struct SyntheticBackend {
    devices: Vec<CameraInfo>,
    feeds: Vec<(Facing, SyntheticFeed)>,
    default_feed: SyntheticFeed,
    fail_next: Arc<Mutex<Option<CameraError>>>,
    mobile: bool,
    opened: Arc<Mutex<Vec<Facing>>>,
}

impl SyntheticBackend {
    /// Backend with a single device delivering `feed`
    pub fn new(feed: SyntheticFeed) -> Self {
        Self {
            devices: vec![CameraInfo {
                index: 0,
                name: "Synthetic Camera".to_string(),
            }],
            feeds: Vec::new(),
            default_feed: feed,
            fail_next: Arc::new(Mutex::new(None)),
            mobile: false,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Backend with front and back devices delivering separate feeds
    pub fn dual(front: SyntheticFeed, back: SyntheticFeed) -> Self {
        let mut backend = Self::new(front.clone());
        backend.devices.push(CameraInfo {
            index: 1,
            name: "Synthetic Rear Camera".to_string(),
        });
        backend.feeds = vec![(Facing::Front, front), (Facing::Back, back)];
        backend
    }

    /// Make the next `open` fail with `error`
    pub fn fail_next_open(&self, error: CameraError) {
        *self.fail_next.lock() = Some(error);
    }

    /// Shared handle for injecting an `open` failure after the backend has
    /// been handed to a [`super::FrameSource`]
    pub fn failure_handle(&self) -> Arc<Mutex<Option<CameraError>>> {
        self.fail_next.clone()
    }

    pub fn with_mobile(mut self, mobile: bool) -> Self {
        self.mobile = mobile;
        self
    }

    /// Facing of every stream opened so far
    pub fn open_log(&self) -> Arc<Mutex<Vec<Facing>>> {
        self.opened.clone()
    }

    fn feed_for(&self, facing: Facing) -> SyntheticFeed {
        self.feeds
            .iter()
            .find(|(f, _)| *f == facing)
            .map(|(_, feed)| feed.clone())
            .unwrap_or_else(|| self.default_feed.clone())
    }
}

impl CameraBackend for SyntheticBackend {
    fn enumerate(&self) -> Result<Vec<CameraInfo>, CameraError> {
        Ok(self.devices.clone())
    }

    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        if let Some(err) = self.fail_next.lock().take() {
            return Err(err);
        }
        let feed = self.feed_for(request.facing);
        let resolution = feed
            .current()
            .map(|image| image.dimensions())
            .unwrap_or((request.ideal_width, request.ideal_height));
        self.opened.lock().push(request.facing);

        Ok(Box::new(SyntheticStream {
            feed,
            resolution,
            frame_number: AtomicU64::new(0),
            stopped: false,
        }))
    }

    fn is_mobile(&self) -> bool {
        self.mobile
    }
}

struct SyntheticStream {
    feed: SyntheticFeed,
    resolution: (u32, u32),
    frame_number: AtomicU64,
    stopped: bool,
}

impl CameraStream for SyntheticStream {
    fn latest_frame(&self) -> Option<CameraFrame> {
        if self.stopped {
            return None;
        }
        let image = self.feed.current()?;
        let (width, height) = image.dimensions();
        let mut data = image.into_raw();
        if self.feed.truncated.load(Ordering::Relaxed) {
            data.truncate(data.len().saturating_sub(width as usize * 4));
        }
        Some(CameraFrame {
            data,
            width,
            height,
            frame_number: self.frame_number.fetch_add(1, Ordering::Relaxed),
            timestamp: Instant::now(),
        })
    }

    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_delivers_feed() {
        let feed = SyntheticFeed::solid(2, 2, [255, 0, 0, 255]);
        let mut backend = SyntheticBackend::new(feed);
        let mut stream = backend
            .open(&StreamRequest {
                facing: Facing::Front,
                ideal_width: 640,
                ideal_height: 480,
                device: None,
            })
            .unwrap();

        assert_eq!(stream.resolution(), (2, 2));
        let a = stream.latest_frame().unwrap();
        let b = stream.latest_frame().unwrap();
        assert_eq!(&a.data[..4], &[255, 0, 0, 255]);
        assert!(b.frame_number > a.frame_number);

        stream.stop();
        assert!(stream.latest_frame().is_none());
    }

    #[test]
    fn test_empty_feed_has_no_frame() {
        let feed = SyntheticFeed::empty();
        let mut backend = SyntheticBackend::new(feed.clone());
        let stream = backend
            .open(&StreamRequest {
                facing: Facing::Front,
                ideal_width: 4,
                ideal_height: 3,
                device: None,
            })
            .unwrap();
        assert_eq!(stream.resolution(), (4, 3));
        assert!(stream.latest_frame().is_none());

        feed.publish(RgbaImage::new(4, 3));
        assert!(stream.latest_frame().is_some());
    }
}
