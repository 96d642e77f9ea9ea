//! Lazily-constructed, session-wide inference resources
//!
//! Each resource lives in a [`ResourceCell`]: the first caller starts
//! construction, concurrent callers await the same in-flight future, and the
//! outcome (handle or error) is memoized for the rest of the session.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use super::{BodySegmenter, FaceLandmarker, InferenceError};

/// Result of constructing a resource
pub type LoadResult<T> = Result<Arc<T>, InferenceError>;

/// Factory producing the construction future for a resource
pub type Loader<T> = Box<dyn Fn() -> BoxFuture<'static, LoadResult<T>> + Send + Sync>;

enum Slot<T: ?Sized> {
    Empty,
    Loading(Shared<BoxFuture<'static, LoadResult<T>>>),
    Ready(Arc<T>),
    Failed(InferenceError),
}

/// Single-flight, memoized holder for one inference resource
pub struct ResourceCell<T: ?Sized + Send + Sync + 'static> {
    name: &'static str,
    loader: Loader<T>,
    slot: Mutex<Slot<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> ResourceCell<T> {
    pub fn new(name: &'static str, loader: Loader<T>) -> Self {
        Self {
            name,
            loader,
            slot: Mutex::new(Slot::Empty),
        }
    }

    /// Get the resource, constructing it on first use
    ///
    /// A construction failure is returned to every caller that awaited the
    /// attempt and to every later caller until [`ResourceCell::reset_failure`].
    pub async fn get(&self) -> LoadResult<T> {
        let pending = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Ready(resource) => return Ok(resource.clone()),
                Slot::Failed(err) => return Err(err.clone()),
                Slot::Loading(pending) => pending.clone(),
                Slot::Empty => {
                    log::info!("Loading {}...", self.name);
                    let pending = (self.loader)().shared();
                    *slot = Slot::Loading(pending.clone());
                    pending
                }
            }
        };

        let result = pending.await;

        let mut slot = self.slot.lock();
        if matches!(&*slot, Slot::Loading(_)) {
            *slot = match &result {
                Ok(resource) => {
                    log::info!("Loaded {}", self.name);
                    Slot::Ready(resource.clone())
                }
                Err(e) => {
                    log::error!("Failed to load {}: {}", self.name, e);
                    Slot::Failed(e.clone())
                }
            };
        }
        result
    }

    /// The resource, if construction already succeeded
    pub fn ready(&self) -> Option<Arc<T>> {
        match &*self.slot.lock() {
            Slot::Ready(resource) => Some(resource.clone()),
            _ => None,
        }
    }

    /// The cached construction error, if any
    pub fn failure(&self) -> Option<InferenceError> {
        match &*self.slot.lock() {
            Slot::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Forget a cached failure so the next `get` constructs again.
    /// Returns true if a failure was cleared.
    pub fn reset_failure(&self) -> bool {
        let mut slot = self.slot.lock();
        if matches!(&*slot, Slot::Failed(_)) {
            log::info!("Clearing cached failure for {}", self.name);
            *slot = Slot::Empty;
            true
        } else {
            false
        }
    }
}

/// Session-wide cache of the face landmarker and body segmenter
pub struct InferenceCache {
    face: ResourceCell<dyn FaceLandmarker>,
    segmenter: ResourceCell<dyn BodySegmenter>,
}

impl InferenceCache {
    /// Create a cache from explicit loaders
    pub fn new(face: Loader<dyn FaceLandmarker>, segmenter: Loader<dyn BodySegmenter>) -> Self {
        Self {
            face: ResourceCell::new("face landmarker", face),
            segmenter: ResourceCell::new("body segmenter", segmenter),
        }
    }

    /// Create a cache backed by the ONNX Runtime models in `model_dir`
    /// (searched for next to the executable when `None`)
    pub fn onnx(model_dir: Option<PathBuf>) -> Self {
        let face_dir = model_dir.clone();
        let seg_dir = model_dir;
        Self::new(
            Box::new(move || {
                let dir = face_dir.clone();
                async move {
                    let landmarker = super::onnx::load_blocking(move || {
                        super::onnx::OnnxFaceLandmarker::load(dir.as_deref())
                    })
                    .await?;
                    Ok(Arc::new(landmarker) as Arc<dyn FaceLandmarker>)
                }
                .boxed()
            }),
            Box::new(move || {
                let dir = seg_dir.clone();
                async move {
                    let segmenter = super::onnx::load_blocking(move || {
                        super::onnx::OnnxSegmenter::load(dir.as_deref())
                    })
                    .await?;
                    Ok(Arc::new(segmenter) as Arc<dyn BodySegmenter>)
                }
                .boxed()
            }),
        )
    }

    /// Get the shared face landmarker
    pub async fn face_landmarker(&self) -> LoadResult<dyn FaceLandmarker> {
        self.face.get().await
    }

    /// Get the shared body segmenter
    pub async fn body_segmenter(&self) -> LoadResult<dyn BodySegmenter> {
        self.segmenter.get().await
    }

    /// Clear a cached face landmarker failure
    pub fn retry_face_landmarker(&self) -> bool {
        self.face.reset_failure()
    }

    /// Clear a cached body segmenter failure
    pub fn retry_body_segmenter(&self) -> bool {
        self.segmenter.reset_failure()
    }

    pub fn face_cell(&self) -> &ResourceCell<dyn FaceLandmarker> {
        &self.face
    }

    pub fn segmenter_cell(&self) -> &ResourceCell<dyn BodySegmenter> {
        &self.segmenter
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ml::{Face, SegmentationMask};
    use image::RgbaImage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) struct FixedFaces(pub Vec<Face>);

    impl FaceLandmarker for FixedFaces {
        fn estimate_faces(&self, _image: &RgbaImage) -> Result<Vec<Face>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    pub(crate) struct FixedMask(pub Option<SegmentationMask>);

    impl BodySegmenter for FixedMask {
        fn segment_people(
            &self,
            _image: &RgbaImage,
        ) -> Result<Option<SegmentationMask>, InferenceError> {
            Ok(self.0.clone())
        }
    }

    fn counting_face_loader(
        calls: Arc<AtomicUsize>,
        fail: bool,
    ) -> Loader<dyn FaceLandmarker> {
        Box::new(move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                if fail {
                    Err(InferenceError::ModelNotFound("face_landmark.onnx".to_string()))
                } else {
                    Ok(Arc::new(FixedFaces(Vec::new())) as Arc<dyn FaceLandmarker>)
                }
            }
            .boxed()
        })
    }

    fn unused_segmenter_loader() -> Loader<dyn BodySegmenter> {
        Box::new(|| async { Ok(Arc::new(FixedMask(None)) as Arc<dyn BodySegmenter>) }.boxed())
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_construction() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = InferenceCache::new(
            counting_face_loader(calls.clone(), false),
            unused_segmenter_loader(),
        );

        let (a, b) = tokio::join!(cache.face_landmarker(), cache.face_landmarker());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Memoized afterwards
        let c = cache.face_landmarker().await.unwrap();
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_cached_until_reset() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = InferenceCache::new(
            counting_face_loader(calls.clone(), true),
            unused_segmenter_loader(),
        );

        let (a, b) = tokio::join!(cache.face_landmarker(), cache.face_landmarker());
        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(cache.face_landmarker().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.face_cell().failure().is_some());

        assert!(cache.retry_face_landmarker());
        assert!(cache.face_landmarker().await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resources_are_independent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = InferenceCache::new(
            counting_face_loader(calls.clone(), true),
            unused_segmenter_loader(),
        );

        assert!(cache.face_landmarker().await.is_err());
        assert!(cache.body_segmenter().await.is_ok());
        assert!(cache.segmenter_cell().ready().is_some());
        assert!(cache.face_cell().ready().is_none());
    }
}
