//! Model plumbing shared by the inference-backed effects

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use image::RgbaImage;

use crate::effects::{InferenceContext, InferenceTracker, TickGate, TrackerState};
use crate::ml::{BodySegmenter, Face, FaceLandmarker, InferenceError, SegmentationMask};
use crate::render::RenderSurface;

type Acquire<M> = fn(&InferenceContext) -> BoxFuture<'static, Result<Arc<M>, InferenceError>>;
type Query<M, O> = fn(&M, &RgbaImage) -> Result<O, InferenceError>;

/// An effect's handle on a shared model: loads through the cache, queries
/// once per tick against the first surface drawn that tick
pub(crate) struct TrackedModel<M: ?Sized + Send + Sync + 'static, O: Send + Sync + 'static> {
    tracker: InferenceTracker<M, O>,
    inference: InferenceContext,
    acquire: Acquire<M>,
    query: Query<M, O>,
    gate: TickGate,
}

impl TrackedModel<dyn FaceLandmarker, Vec<Face>> {
    pub fn faces(name: &'static str, inference: InferenceContext) -> Self {
        Self {
            tracker: InferenceTracker::new(name, inference.runtime.clone()),
            inference,
            acquire: |ctx| {
                let cache = ctx.cache.clone();
                async move { cache.face_landmarker().await }.boxed()
            },
            query: |model, image| model.estimate_faces(image),
            gate: TickGate::new(),
        }
    }
}

impl TrackedModel<dyn BodySegmenter, Option<SegmentationMask>> {
    pub fn segmentation(name: &'static str, inference: InferenceContext) -> Self {
        Self {
            tracker: InferenceTracker::new(name, inference.runtime.clone()),
            inference,
            acquire: |ctx| {
                let cache = ctx.cache.clone();
                async move { cache.body_segmenter().await }.boxed()
            },
            query: |model, image| model.segment_people(image),
            gate: TickGate::new(),
        }
    }
}

impl<M: ?Sized + Send + Sync + 'static, O: Send + Sync + 'static> TrackedModel<M, O> {
    /// Kick off loading if needed; true once the model is usable
    pub fn ready(&self) -> bool {
        let acquire = self.acquire;
        let inference = &self.inference;
        self.tracker.ensure_loaded(|| acquire(inference)) == TrackerState::Ready
    }

    /// Queue a query on the first call of each tick
    pub fn observe(&mut self, tick: u64, surface: &RenderSurface) {
        if self.gate.advance(tick) {
            self.tracker.submit(|| surface.snapshot(), self.query);
        }
    }

    pub fn latest(&self) -> Option<Arc<O>> {
        self.tracker.latest()
    }

    pub fn state(&self) -> TrackerState {
        self.tracker.state()
    }

    pub fn retry(&mut self) -> bool {
        self.tracker.retry()
    }

    pub fn clear(&mut self) {
        self.tracker.clear();
        self.gate.reset();
    }
}
