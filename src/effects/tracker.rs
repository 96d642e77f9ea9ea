//! Inference state for ML-backed effects
//!
//! An [`InferenceTracker`] walks `Uninitialized -> Loading -> Ready` (or
//! `Failed`) without ever blocking the render thread. Model acquisition runs
//! as a task on the Tokio runtime; per-frame queries run on the blocking pool
//! against a snapshot of the surface, at most one at a time, and their result
//! is drawn on a later tick.
//!
//! Background tasks only hold a weak reference to the tracker state, so
//! results that arrive after the effect is gone are dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use image::RgbaImage;
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::ml::InferenceError;

/// Load state of an effect's model
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Loading,
    Ready,
    Failed,
}

enum Phase<M: ?Sized> {
    Uninitialized,
    Loading,
    Ready(Arc<M>),
    Failed,
}

struct Shared<M: ?Sized, O> {
    phase: Mutex<Phase<M>>,
    latest: Mutex<Option<Arc<O>>>,
    query_in_flight: AtomicBool,
}

/// Clears the in-flight flag when a query ends, including by panic
struct QueryGuard<M: ?Sized, O>(Weak<Shared<M, O>>);

impl<M: ?Sized, O> Drop for QueryGuard<M, O> {
    fn drop(&mut self) {
        if let Some(shared) = self.0.upgrade() {
            shared.query_in_flight.store(false, Ordering::Release);
        }
    }
}

/// Tracks one effect's model and its latest inference result
pub struct InferenceTracker<M: ?Sized + Send + Sync + 'static, O: Send + Sync + 'static> {
    name: &'static str,
    runtime: Handle,
    shared: Arc<Shared<M, O>>,
}

impl<M: ?Sized + Send + Sync + 'static, O: Send + Sync + 'static> InferenceTracker<M, O> {
    pub fn new(name: &'static str, runtime: Handle) -> Self {
        Self {
            name,
            runtime,
            shared: Arc::new(Shared {
                phase: Mutex::new(Phase::Uninitialized),
                latest: Mutex::new(None),
                query_in_flight: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> TrackerState {
        match &*self.shared.phase.lock() {
            Phase::Uninitialized => TrackerState::Uninitialized,
            Phase::Loading => TrackerState::Loading,
            Phase::Ready(_) => TrackerState::Ready,
            Phase::Failed => TrackerState::Failed,
        }
    }

    /// Start acquiring the model if nothing has been attempted yet, and
    /// report the current state
    ///
    /// `acquire` is only invoked on the `Uninitialized -> Loading` transition,
    /// so calling this every tick never duplicates a construction.
    pub fn ensure_loaded(
        &self,
        acquire: impl FnOnce() -> BoxFuture<'static, Result<Arc<M>, InferenceError>>,
    ) -> TrackerState {
        {
            let mut phase = self.shared.phase.lock();
            match &*phase {
                Phase::Uninitialized => *phase = Phase::Loading,
                Phase::Loading => return TrackerState::Loading,
                Phase::Ready(_) => return TrackerState::Ready,
                Phase::Failed => return TrackerState::Failed,
            }
        }

        let name = self.name;
        let weak: Weak<Shared<M, O>> = Arc::downgrade(&self.shared);
        let future = acquire();
        self.runtime.spawn(async move {
            let result = future.await;
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut phase = shared.phase.lock();
            *phase = match result {
                Ok(model) => {
                    log::info!("{}: model ready", name);
                    Phase::Ready(model)
                }
                Err(e) => {
                    log::error!("{}: model loading failed, effect disabled: {}", name, e);
                    Phase::Failed
                }
            };
        });

        TrackerState::Loading
    }

    /// Run `query` against a snapshot of the surface if the model is ready and
    /// no other query is in flight. Returns true if a query was started.
    ///
    /// A failed query is logged and clears the latest result, which effects
    /// treat as "nothing detected".
    pub fn submit(
        &self,
        snapshot: impl FnOnce() -> RgbaImage,
        query: fn(&M, &RgbaImage) -> Result<O, InferenceError>,
    ) -> bool {
        let model = match &*self.shared.phase.lock() {
            Phase::Ready(model) => model.clone(),
            _ => return false,
        };
        if self.shared.query_in_flight.swap(true, Ordering::AcqRel) {
            return false;
        }

        let image = snapshot();
        let name = self.name;
        let guard = QueryGuard(Arc::downgrade(&self.shared));
        self.runtime.spawn_blocking(move || {
            let result = query(&model, &image);
            let Some(shared) = guard.0.upgrade() else {
                return;
            };
            let mut latest = shared.latest.lock();
            match result {
                Ok(output) => *latest = Some(Arc::new(output)),
                Err(e) => {
                    log::warn!("{}: inference failed: {}", name, e);
                    *latest = None;
                }
            }
        });
        true
    }

    /// Latest completed inference result
    pub fn latest(&self) -> Option<Arc<O>> {
        self.shared.latest.lock().clone()
    }

    pub fn is_query_in_flight(&self) -> bool {
        self.shared.query_in_flight.load(Ordering::Acquire)
    }

    /// Allow a failed model to be acquired again on the next tick.
    /// Returns true if the tracker was in the failed state.
    pub fn retry(&self) -> bool {
        let mut phase = self.shared.phase.lock();
        if matches!(&*phase, Phase::Failed) {
            *phase = Phase::Uninitialized;
            true
        } else {
            false
        }
    }

    /// Drop the latest result
    pub fn clear(&self) {
        *self.shared.latest.lock() = None;
    }
}
