//! Built-in effects
//!
//! One module per effect family. [`register_builtin_effects`] registers them
//! in catalog order; the registry keeps that order for cycling.

pub mod background;
pub mod bubble;
pub mod cartoon;
pub mod catears;
pub mod cloud;
pub mod color_grade;
pub mod confetti;
pub mod crown;
pub mod galaxy;
pub mod glitch;
pub mod makeup;
pub mod none;
pub mod snow;
pub mod sparkle;
pub mod spy;

mod particles;
mod tracked;

pub use background::BackgroundReplace;
pub use bubble::Bubbles;
pub use cartoon::Cartoon;
pub use catears::CatEars;
pub use cloud::Cloud;
pub use color_grade::{ColorGrade, Grade};
pub use confetti::Confetti;
pub use crown::Crown;
pub use galaxy::Galaxy;
pub use glitch::Glitch;
pub use makeup::Makeup;
pub use none::PassThrough;
pub use snow::Snow;
pub use sparkle::Sparkle;
pub use spy::Spy;

use super::{EffectRegistry, InferenceContext, RegistryError};

/// Register every built-in effect
pub fn register_builtin_effects(
    registry: &mut EffectRegistry,
    inference: &InferenceContext,
) -> Result<(), RegistryError> {
    registry.register(PassThrough::new())?;
    registry.register(ColorGrade::vivid())?;
    registry.register(Cloud::new())?;

    for grade in ColorGrade::catalog() {
        registry.register(grade)?;
    }
    registry.register(Cartoon::new())?;

    registry.register(Snow::new())?;
    registry.register(Bubbles::new())?;
    registry.register(Confetti::new())?;
    registry.register(Sparkle::new())?;

    registry.register(Crown::new(inference.clone()))?;
    registry.register(CatEars::new(inference.clone()))?;
    registry.register(Makeup::new(inference.clone()))?;

    registry.register(Galaxy::new(inference.clone()))?;
    registry.register(BackgroundReplace::new(inference.clone()))?;

    registry.register(Glitch::new())?;
    registry.register(Spy::new())?;

    log::info!("Registered {} effects", registry.len());
    Ok(())
}
