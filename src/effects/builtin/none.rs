//! Pass-through effect

use crate::effects::{Category, Effect, EffectDescriptor, FrameInfo};
use crate::render::RenderSurface;

/// Leaves the camera frame untouched
pub struct PassThrough {
    descriptor: EffectDescriptor,
}

impl PassThrough {
    pub fn new() -> Self {
        Self {
            descriptor: EffectDescriptor {
                id: "none",
                name: "None",
                icon: "🎨",
                category: Category::Basic,
            },
        }
    }
}

impl Default for PassThrough {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for PassThrough {
    fn descriptor(&self) -> &EffectDescriptor {
        &self.descriptor
    }

    fn apply(&mut self, _surface: &mut RenderSurface, _frame: &FrameInfo) {}
}
