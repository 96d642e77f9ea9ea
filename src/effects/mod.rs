//! Effects module
//!
//! Provides the per-frame filters that mutate a render surface in place,
//! and the registry the render loop looks them up in.

pub mod builtin;
pub mod registry;
pub mod tracker;
pub mod traits;

use std::sync::Arc;

use crate::ml::InferenceCache;

pub use registry::{EffectRegistry, RegistryError};
pub use tracker::{InferenceTracker, TrackerState};
pub use traits::{Category, Effect, EffectDescriptor, FrameInfo, TickGate};

/// Shared handles for inference-backed effects
#[derive(Clone)]
pub struct InferenceContext {
    /// Session-wide model cache
    pub cache: Arc<InferenceCache>,
    /// Runtime that model loading and queries run on
    pub runtime: tokio::runtime::Handle,
}

impl InferenceContext {
    pub fn new(cache: Arc<InferenceCache>, runtime: tokio::runtime::Handle) -> Self {
        Self { cache, runtime }
    }
}
