//! Effect contract
//!
//! Every filter is an [`Effect`]: it receives a render surface that already
//! holds the (mirrored) camera frame and mutates it in place.

use std::time::Duration;

use crate::render::{RenderSurface, SurfaceKind};

/// UI grouping for effects
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Basic,
    Color,
    Decorate,
    Face,
    Background,
    Special,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Category; 6] = [
        Category::Basic,
        Category::Color,
        Category::Decorate,
        Category::Face,
        Category::Background,
        Category::Special,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Basic => "basic",
            Category::Color => "color",
            Category::Decorate => "decorate",
            Category::Face => "face",
            Category::Background => "background",
            Category::Special => "special",
        }
    }

    /// Get display name for UI
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Basic => "Basic",
            Category::Color => "Color",
            Category::Decorate => "Decorate",
            Category::Face => "Face",
            Category::Background => "Background",
            Category::Special => "Special",
        }
    }
}

/// Static description of an effect
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectDescriptor {
    /// Registry-unique identifier
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Icon glyph
    pub icon: &'static str,
    pub category: Category,
}

/// Per-apply context
#[derive(Clone, Copy, Debug)]
pub struct FrameInfo {
    /// Render loop tick; identical for the capture and display applies of one frame
    pub tick: u64,
    /// Surface being drawn
    pub target: SurfaceKind,
    /// Time since the render loop started
    pub elapsed: Duration,
    /// Whether the camera frame was mirrored onto the surface
    pub mirrored: bool,
}

impl FrameInfo {
    pub fn new(tick: u64, target: SurfaceKind) -> Self {
        Self {
            tick,
            target,
            elapsed: Duration::ZERO,
            mirrored: true,
        }
    }
}

/// A filter applied to every rendered frame
///
/// `apply` runs on the render thread and must not block: inference-backed
/// effects hand work to the runtime and draw the latest completed result.
/// Recoverable conditions (model still loading, no face in frame) are handled
/// inside `apply` by drawing less, never by panicking.
pub trait Effect: Send {
    fn descriptor(&self) -> &EffectDescriptor;

    fn id(&self) -> &'static str {
        self.descriptor().id
    }

    /// Effects that only make sense on screen (the capture surface never
    /// sees them)
    fn display_only(&self) -> bool {
        false
    }

    /// Mutate the surface in place
    fn apply(&mut self, surface: &mut RenderSurface, frame: &FrameInfo);

    /// Discard accumulated state (particles, animation clocks)
    fn reset(&mut self) {}

    /// Allow a model that failed to load to be acquired again. Returns true
    /// if the effect was pinned inert by a load failure.
    fn retry_inference(&mut self) -> bool {
        false
    }
}

/// Advances stateful effects once per render tick
///
/// `apply` runs once per surface per tick; simulation steps belong to the
/// first apply of a tick so both surfaces show the same state.
#[derive(Debug, Default)]
pub struct TickGate {
    last_tick: Option<u64>,
}

impl TickGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time it is called for `tick`
    pub fn advance(&mut self, tick: u64) -> bool {
        if self.last_tick == Some(tick) {
            return false;
        }
        self.last_tick = Some(tick);
        true
    }

    pub fn reset(&mut self) {
        self.last_tick = None;
    }
}
