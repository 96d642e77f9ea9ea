//! Camera start/switch off the host thread
//!
//! Opening a device can block for seconds. [`SharedRenderLoop`] runs those
//! operations on a short-lived thread while the host keeps presenting; the
//! host ticks through [`SharedRenderLoop::try_lock`] and simply skips frames
//! while the camera is being opened.

use std::sync::Arc;

use crossbeam_channel::{Receiver, TryRecvError};
use parking_lot::{Mutex, MutexGuard};

use super::pipeline::RenderLoop;
use crate::camera::{CameraError, Facing};

/// Camera operation to run in the background
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraRequest {
    Start(Facing),
    Switch,
}

/// Completed camera operation and its result
pub type CameraOutcome = (CameraRequest, Result<(u32, u32), CameraError>);

/// A [`RenderLoop`] whose camera operations run on a worker thread
pub struct SharedRenderLoop {
    inner: Arc<Mutex<RenderLoop>>,
    pending: Option<(CameraRequest, Receiver<CameraOutcome>)>,
}

impl SharedRenderLoop {
    pub fn new(render_loop: RenderLoop) -> Self {
        Self {
            inner: Arc::new(Mutex::new(render_loop)),
            pending: None,
        }
    }

    /// Start `request` on a worker thread. Returns false if another request
    /// is still pending or the thread could not be spawned.
    pub fn request_camera(&mut self, request: CameraRequest) -> bool {
        if self.pending.is_some() {
            return false;
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        let inner = self.inner.clone();
        let spawned = std::thread::Builder::new()
            .name("camera-open".to_string())
            .spawn(move || {
                let mut render_loop = inner.lock();
                let result = match request {
                    CameraRequest::Start(facing) => render_loop.start(facing),
                    CameraRequest::Switch => render_loop.switch_camera(),
                };
                drop(render_loop);
                let _ = tx.send((request, result));
            });

        match spawned {
            Ok(_) => {
                log::debug!("Camera request {:?} started", request);
                self.pending = Some((request, rx));
                true
            }
            Err(e) => {
                log::error!("Failed to spawn camera worker: {}", e);
                false
            }
        }
    }

    /// Result of the pending request, once it has finished
    pub fn poll_camera(&mut self) -> Option<CameraOutcome> {
        let (request, rx) = self.pending.as_ref()?;
        let request = *request;
        match rx.try_recv() {
            Ok(outcome) => {
                self.pending = None;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                log::error!("Camera worker exited without a result");
                Some((
                    request,
                    Err(CameraError::Unavailable("camera worker failed".to_string())),
                ))
            }
        }
    }

    /// Whether a camera request has not been polled to completion yet
    pub fn camera_busy(&self) -> bool {
        self.pending.is_some()
    }

    /// The render loop, unless a camera operation currently holds it
    pub fn try_lock(&self) -> Option<MutexGuard<'_, RenderLoop>> {
        self.inner.try_lock()
    }

    /// The render loop, waiting for any camera operation to finish
    pub fn lock(&self) -> MutexGuard<'_, RenderLoop> {
        self.inner.lock()
    }
}
