//! Render loop / compositor
//!
//! Every accepted tick pulls the latest camera frame, draws it (mirrored for
//! the front camera) onto the capture and display surfaces, and runs the
//! selected effect over each. Display-only effects never touch the capture
//! surface.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::capture::CapturedImage;
use super::surface::{RenderSurface, SurfaceKind};
use crate::camera::{CameraError, Facing, FrameSource};
use crate::effects::{EffectDescriptor, EffectRegistry, FrameInfo};

/// Default processing rate
pub const DEFAULT_TARGET_FPS: u32 = 30;

/// Shared handle to the selected effect id
///
/// Written by the UI, read once per tick by the render loop. Changes take
/// effect on the next tick.
#[derive(Clone, Debug)]
pub struct EffectSelection {
    id: Arc<RwLock<String>>,
}

impl EffectSelection {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Arc::new(RwLock::new(id.into())),
        }
    }

    pub fn set(&self, id: impl Into<String>) {
        *self.id.write() = id.into();
    }

    pub fn get(&self) -> String {
        self.id.read().clone()
    }
}

impl Default for EffectSelection {
    fn default() -> Self {
        Self::new("none")
    }
}

/// What a call to [`RenderLoop::on_frame`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The loop is not running
    Stopped,
    /// Too soon after the previous tick
    Throttled,
    /// No decoded camera frame yet
    NotReady,
    /// Both surfaces were drawn
    Rendered { tick: u64 },
}

/// Rolling frames-per-second estimate
#[derive(Debug)]
struct FpsCounter {
    starts: VecDeque<Instant>,
    max_samples: usize,
}

impl FpsCounter {
    fn new(max_samples: usize) -> Self {
        Self {
            starts: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    fn record(&mut self, at: Instant) {
        self.starts.push_back(at);
        if self.starts.len() > self.max_samples {
            self.starts.pop_front();
        }
    }

    fn fps(&self) -> f64 {
        let (Some(first), Some(last)) = (self.starts.front(), self.starts.back()) else {
            return 0.0;
        };
        let duration = last.duration_since(*first).as_secs_f64();
        if self.starts.len() < 2 || duration <= 0.0 {
            return 0.0;
        }
        (self.starts.len() - 1) as f64 / duration
    }

    fn clear(&mut self) {
        self.starts.clear();
    }
}

/// Drives the camera frame through the selected effect onto two surfaces
pub struct RenderLoop {
    source: FrameSource,
    registry: EffectRegistry,
    selection: EffectSelection,
    display: Option<RenderSurface>,
    capture: Option<RenderSurface>,
    frame_interval: Duration,
    /// When the next tick is due; ticks stay on a fixed grid from the first one
    next_tick_at: Option<Instant>,
    started_at: Option<Instant>,
    tick: u64,
    /// Effect id applied on the previous tick
    active_id: Option<String>,
    running: bool,
    fps: FpsCounter,
}

impl RenderLoop {
    pub fn new(source: FrameSource, registry: EffectRegistry, selection: EffectSelection) -> Self {
        Self {
            source,
            registry,
            selection,
            display: None,
            capture: None,
            frame_interval: interval_for(DEFAULT_TARGET_FPS),
            next_tick_at: None,
            started_at: None,
            tick: 0,
            active_id: None,
            running: false,
            fps: FpsCounter::new(60),
        }
    }

    /// Processing rate, clamped to 1..=120
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.frame_interval = interval_for(fps);
        self
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Start the camera and begin accepting ticks
    ///
    /// Surfaces are allocated from the first decoded frame. On failure the
    /// loop is left stopped with no surfaces.
    pub fn start(&mut self, facing: Facing) -> Result<(u32, u32), CameraError> {
        self.running = false;
        self.capture = None;
        self.display = None;
        self.next_tick_at = None;
        self.fps.clear();

        let resolution = self.source.start(facing)?;
        self.running = true;
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(resolution)
    }

    /// Stop ticking and release the camera. Safe to call at any point, any
    /// number of times.
    pub fn stop(&mut self) {
        if self.running {
            log::info!("Render loop stopped");
        }
        self.running = false;
        self.source.stop();
        self.fps.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Host frame callback
    pub fn on_frame(&mut self, now: Instant) -> TickOutcome {
        if !self.running {
            return TickOutcome::Stopped;
        }
        // Host callbacks jitter around the schedule; accept slightly early ones
        let tolerance = self.frame_interval / 8;
        let due = self.next_tick_at.unwrap_or(now);
        if now + tolerance < due {
            return TickOutcome::Throttled;
        }
        self.next_tick_at = Some(if now > due + self.frame_interval {
            now + self.frame_interval
        } else {
            due + self.frame_interval
        });

        let Some(frame) = self.source.latest_frame() else {
            return TickOutcome::NotReady;
        };
        if frame.width == 0 || frame.height == 0 {
            return TickOutcome::NotReady;
        }

        let dimensions = (frame.width, frame.height);
        if self.capture.as_ref().map(|s| s.dimensions()) != Some(dimensions) {
            log::debug!("Allocating render surfaces at {}x{}", frame.width, frame.height);
            self.capture = Some(RenderSurface::new(frame.width, frame.height));
            self.display = Some(RenderSurface::new(frame.width, frame.height));
        }

        let selected = self.selection.get();
        if self.active_id.as_deref() != Some(selected.as_str()) {
            match self.registry.get_mut(&selected) {
                Some(effect) => {
                    effect.reset();
                    log::info!("Effect selected: {}", selected);
                }
                None => log::warn!("Unknown effect '{}', passing frames through", selected),
            }
            self.active_id = Some(selected.clone());
        }

        let mirrored = self.source.is_mirrored();
        let (Some(capture), Some(display)) = (self.capture.as_mut(), self.display.as_mut()) else {
            return TickOutcome::NotReady;
        };
        if !capture.draw_frame(&frame, mirrored) || !display.draw_frame(&frame, mirrored) {
            log::warn!("Dropping malformed camera frame #{}", frame.frame_number);
            return TickOutcome::NotReady;
        }

        self.tick += 1;
        let elapsed = self
            .started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        let info = |target| FrameInfo {
            tick: self.tick,
            target,
            elapsed,
            mirrored,
        };
        let capture_info = info(SurfaceKind::Capture);
        let display_info = info(SurfaceKind::Display);

        if let Some(effect) = self.registry.get_mut(&selected) {
            if !effect.display_only() {
                effect.apply(capture, &capture_info);
            }
            effect.apply(display, &display_info);
        }

        self.fps.record(now);
        TickOutcome::Rendered { tick: self.tick }
    }

    /// Encode the capture surface as PNG
    ///
    /// `None` until a frame has been rendered.
    pub fn capture(&self) -> Option<CapturedImage> {
        let surface = self.capture.as_ref()?;
        match CapturedImage::encode(surface.image()) {
            Ok(image) => Some(image),
            Err(e) => {
                log::error!("Capture failed: {}", e);
                None
            }
        }
    }

    /// Flip between front and back cameras
    ///
    /// On failure one restart with the previous facing is attempted so the
    /// preview does not stay dark; the switch error is still returned.
    pub fn switch_camera(&mut self) -> Result<(u32, u32), CameraError> {
        self.capture = None;
        self.display = None;
        self.next_tick_at = None;

        match self.source.switch() {
            Ok(resolution) => {
                self.running = true;
                Ok(resolution)
            }
            Err(e) => {
                let facing = self.source.facing();
                match self.source.start(facing) {
                    Ok(_) => log::info!("Restarted {:?} camera after failed switch", facing),
                    Err(restart) => {
                        log::error!("Failed to restart camera: {}", restart);
                        self.running = false;
                    }
                }
                Err(e)
            }
        }
    }

    pub fn can_switch_camera(&self) -> bool {
        self.source.can_switch()
    }

    pub fn source(&self) -> &FrameSource {
        &self.source
    }

    pub fn registry(&self) -> &EffectRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EffectRegistry {
        &mut self.registry
    }

    pub fn selection(&self) -> &EffectSelection {
        &self.selection
    }

    /// Descriptor of the effect applied on the last tick
    pub fn active_effect(&self) -> Option<&EffectDescriptor> {
        let id = self.active_id.as_deref()?;
        self.registry.get(id).map(|e| e.descriptor())
    }

    pub fn display_surface(&self) -> Option<&RenderSurface> {
        self.display.as_ref()
    }

    pub fn capture_surface(&self) -> Option<&RenderSurface> {
        self.capture.as_ref()
    }

    /// Rendered ticks per second over the recent window
    pub fn fps(&self) -> f64 {
        self.fps.fps()
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn interval_for(fps: u32) -> Duration {
    Duration::from_secs_f64(1.0 / fps.clamp(1, 120) as f64)
}
