//! Native camera capture via nokhwa
//!
//! Each stream captures on its own thread and publishes the latest decoded
//! frame through a triple buffer; the render thread only reads.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use parking_lot::Mutex;

use super::{CameraBackend, CameraError, CameraFrame, CameraInfo, CameraStream, Facing, StreamRequest};

/// How long `open` waits for the first decoded frame
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

const FRONT_HINTS: &[&str] = &["front", "user", "facetime", "integrated", "built-in"];
const BACK_HINTS: &[&str] = &["back", "rear", "environment", "world"];

/// Camera backend for the platform's native capture API
#[derive(Default)]
pub struct NokhwaBackend;

impl NokhwaBackend {
    pub fn new() -> Self {
        Self
    }

    /// Pick a device index for the request
    fn select_device(devices: &[CameraInfo], request: &StreamRequest) -> u32 {
        if let Some(index) = request.device {
            return index;
        }
        let Some(first) = devices.first() else {
            return 0;
        };

        let hints = match request.facing {
            Facing::Front => FRONT_HINTS,
            Facing::Back => BACK_HINTS,
        };
        if let Some(device) = devices.iter().find(|d| {
            let name = d.name.to_lowercase();
            hints.iter().any(|h| name.contains(h))
        }) {
            return device.index;
        }

        match request.facing {
            Facing::Front => first.index,
            Facing::Back => devices.get(1).unwrap_or(first).index,
        }
    }
}

impl CameraBackend for NokhwaBackend {
    fn enumerate(&self) -> Result<Vec<CameraInfo>, CameraError> {
        let camera_list = nokhwa::query(ApiBackend::Auto)
            .map_err(|e| CameraError::classify(&e.to_string()))?;

        Ok(camera_list
            .iter()
            .enumerate()
            .map(|(idx, info)| CameraInfo {
                index: idx as u32,
                name: info.human_name().to_string(),
            })
            .collect())
    }

    fn open(&mut self, request: &StreamRequest) -> Result<Box<dyn CameraStream>, CameraError> {
        let devices = match self.enumerate() {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("Failed to enumerate cameras: {}", e);
                Vec::new()
            }
        };
        let index = Self::select_device(&devices, request);
        let stream = NokhwaStream::start(index, request.ideal_width, request.ideal_height)?;
        Ok(Box::new(stream))
    }
}

/// A running nokhwa capture thread
pub struct NokhwaStream {
    /// Current frame (latest captured) - triple buffered
    frames: [Arc<Mutex<Option<CameraFrame>>>; 3],
    /// Index of the latest complete frame
    latest_frame_idx: Arc<AtomicU64>,
    /// Whether capture is running
    running: Arc<AtomicBool>,
    /// Capture thread handle
    thread_handle: Option<std::thread::JoinHandle<()>>,
    /// Native stream resolution
    width: u32,
    height: u32,
}

impl NokhwaStream {
    /// Spawn the capture thread and wait for the first decoded frame
    fn start(camera_index: u32, ideal_width: u32, ideal_height: u32) -> Result<Self, CameraError> {
        let frames: [Arc<Mutex<Option<CameraFrame>>>; 3] = [
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
        ];
        let latest_frame_idx = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let frames_clone = frames.clone();
        let latest_frame_idx_clone = latest_frame_idx.clone();
        let running_clone = running.clone();

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                capture_thread(
                    camera_index,
                    ideal_width,
                    ideal_height,
                    frames_clone,
                    latest_frame_idx_clone,
                    running_clone,
                    ready_tx,
                );
            })
            .map_err(|e| CameraError::Unavailable(format!("Failed to spawn capture thread: {}", e)))?;

        let mut stream = Self {
            frames,
            latest_frame_idx,
            running,
            thread_handle: Some(thread_handle),
            width: 0,
            height: 0,
        };

        match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok((width, height))) => {
                stream.width = width;
                stream.height = height;
                Ok(stream)
            }
            Ok(Err(e)) => {
                stream.stop();
                Err(e)
            }
            Err(_) => {
                stream.stop();
                Err(CameraError::Unavailable(
                    "camera did not deliver a frame in time".to_string(),
                ))
            }
        }
    }
}

impl CameraStream for NokhwaStream {
    fn latest_frame(&self) -> Option<CameraFrame> {
        let idx = self.latest_frame_idx.load(Ordering::Acquire);
        let slot = (idx % 3) as usize;
        self.frames[slot].lock().clone()
    }

    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for NokhwaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open the camera, trying the ideal format first and then progressively
/// looser requests
fn open_camera(camera_index: u32, ideal_width: u32, ideal_height: u32) -> Result<Camera, CameraError> {
    let index = CameraIndex::Index(camera_index);
    let ideal = Resolution::new(ideal_width, ideal_height);

    let attempts = [
        RequestedFormatType::Closest(CameraFormat::new(ideal, FrameFormat::MJPEG, 30)),
        RequestedFormatType::HighestResolution(ideal),
        RequestedFormatType::None,
    ];

    let mut last_error = None;
    for attempt in attempts {
        let requested = RequestedFormat::new::<RgbAFormat>(attempt);
        match Camera::new(index.clone(), requested) {
            Ok(camera) => return Ok(camera),
            Err(e) => {
                log::warn!("Failed to open camera {} ({:?}): {}", camera_index, attempt, e);
                last_error = Some(e.to_string());
            }
        }
    }

    Err(last_error
        .map(|e| CameraError::classify(&e))
        .unwrap_or(CameraError::NotFound))
}

/// Camera capture thread
fn capture_thread(
    camera_index: u32,
    ideal_width: u32,
    ideal_height: u32,
    frames: [Arc<Mutex<Option<CameraFrame>>>; 3],
    latest_frame_idx: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    ready_tx: Sender<Result<(u32, u32), CameraError>>,
) {
    log::info!("Starting camera capture thread (camera {})", camera_index);

    let mut camera = match open_camera(camera_index, ideal_width, ideal_height) {
        Ok(camera) => camera,
        Err(e) => {
            log::error!("Failed to open camera {}: {}", camera_index, e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        log::error!("Failed to open camera stream: {}", e);
        let _ = ready_tx.send(Err(CameraError::classify(&e.to_string())));
        return;
    }

    log::info!(
        "Camera opened: {} ({}x{})",
        camera.info().human_name(),
        camera.resolution().width(),
        camera.resolution().height()
    );

    let mut ready_tx = Some(ready_tx);
    let mut write_idx: u64 = 0;
    let mut frame_number: u64 = 0;

    while running.load(Ordering::Acquire) {
        match camera.frame() {
            Ok(frame) => match frame.decode_image::<RgbAFormat>() {
                Ok(image) => {
                    let width = image.width();
                    let height = image.height();

                    let camera_frame = CameraFrame {
                        data: image.into_raw(),
                        width,
                        height,
                        frame_number,
                        timestamp: Instant::now(),
                    };
                    frame_number += 1;

                    // Write to the next buffer slot
                    let slot = (write_idx % 3) as usize;
                    *frames[slot].lock() = Some(camera_frame);

                    // Update latest frame index
                    latest_frame_idx.store(write_idx, Ordering::Release);
                    write_idx = write_idx.wrapping_add(1);

                    if let Some(tx) = ready_tx.take() {
                        let _ = tx.send(Ok((width, height)));
                    }
                }
                Err(e) => {
                    log::warn!("Failed to decode frame: {}", e);
                }
            },
            Err(e) => {
                log::warn!("Failed to capture frame: {}", e);
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }

    if let Err(e) = camera.stop_stream() {
        log::warn!("Failed to stop camera stream: {}", e);
    }
    log::info!("Camera capture thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(facing: Facing) -> StreamRequest {
        StreamRequest {
            facing,
            ideal_width: 640,
            ideal_height: 480,
            device: None,
        }
    }

    fn devices(names: &[&str]) -> Vec<CameraInfo> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| CameraInfo {
                index: i as u32,
                name: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_select_device_by_name() {
        let list = devices(&["Rear Camera", "Front Camera"]);
        assert_eq!(NokhwaBackend::select_device(&list, &request(Facing::Front)), 1);
        assert_eq!(NokhwaBackend::select_device(&list, &request(Facing::Back)), 0);
    }

    #[test]
    fn test_select_device_fallback_order() {
        let list = devices(&["USB Webcam", "Capture Card"]);
        assert_eq!(NokhwaBackend::select_device(&list, &request(Facing::Front)), 0);
        assert_eq!(NokhwaBackend::select_device(&list, &request(Facing::Back)), 1);

        let single = devices(&["USB Webcam"]);
        assert_eq!(NokhwaBackend::select_device(&single, &request(Facing::Back)), 0);
        assert_eq!(NokhwaBackend::select_device(&[], &request(Facing::Front)), 0);
    }

    #[test]
    fn test_explicit_device_wins() {
        let list = devices(&["Front Camera", "Rear Camera"]);
        let mut req = request(Facing::Front);
        req.device = Some(1);
        assert_eq!(NokhwaBackend::select_device(&list, &req), 1);
    }
}
