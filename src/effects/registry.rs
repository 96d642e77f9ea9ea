//! Effect registry
//!
//! Holds one instance of every effect, in registration order, and answers
//! lookups by id and category.

use std::collections::HashMap;

use super::traits::{Category, Effect, EffectDescriptor};

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Effect id already registered: {0}")]
    DuplicateId(String),
}

/// Registry of available effects
pub struct EffectRegistry {
    /// Effects in registration order
    effects: Vec<Box<dyn Effect>>,
    /// Position in `effects` by id
    index: HashMap<&'static str, usize>,
    /// Ids grouped by category, in registration order
    categories: HashMap<Category, Vec<&'static str>>,
}

impl Default for EffectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            effects: Vec::new(),
            index: HashMap::new(),
            categories: HashMap::new(),
        }
    }

    /// Register an effect. Ids must be unique.
    pub fn register(&mut self, effect: impl Effect + 'static) -> Result<(), RegistryError> {
        self.register_boxed(Box::new(effect))
    }

    pub fn register_boxed(&mut self, effect: Box<dyn Effect>) -> Result<(), RegistryError> {
        let descriptor = effect.descriptor();
        let id = descriptor.id;
        let category = descriptor.category;

        if self.index.contains_key(id) {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }

        self.categories.entry(category).or_default().push(id);
        self.index.insert(id, self.effects.len());
        self.effects.push(effect);
        Ok(())
    }

    /// Get an effect by id
    pub fn get(&self, id: &str) -> Option<&dyn Effect> {
        self.index.get(id).map(|&i| self.effects[i].as_ref())
    }

    /// Get an effect by id for applying
    pub fn get_mut(&mut self, id: &str) -> Option<&mut (dyn Effect + 'static)> {
        let i = *self.index.get(id)?;
        Some(self.effects[i].as_mut())
    }

    /// Check if an id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Descriptors of every effect in registration order
    pub fn list_all(&self) -> impl Iterator<Item = &EffectDescriptor> {
        self.effects.iter().map(|e| e.descriptor())
    }

    /// Descriptors of the effects in one category
    pub fn list_by_category(&self, category: Category) -> Vec<&EffectDescriptor> {
        self.categories
            .get(&category)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.get(id).map(|e| e.descriptor()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Categories that have at least one effect, in display order
    pub fn categories(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.categories.contains_key(c))
            .collect()
    }

    /// Id `offset` places after `id` in registration order, wrapping around
    pub fn neighbor(&self, id: &str, offset: isize) -> Option<&'static str> {
        if self.effects.is_empty() {
            return None;
        }
        let len = self.effects.len() as isize;
        let current = self.index.get(id).map(|&i| i as isize).unwrap_or(0);
        let next = (current + offset).rem_euclid(len) as usize;
        Some(self.effects[next].id())
    }

    /// Un-pin every effect disabled by a model load failure. Returns how
    /// many effects were affected.
    pub fn retry_inference(&mut self) -> usize {
        self.effects
            .iter_mut()
            .map(|e| e.retry_inference())
            .filter(|&retried| retried)
            .count()
    }

    /// Get the number of registered effects
    pub fn len(&self) -> usize {
        self.effects.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::traits::FrameInfo;
    use crate::render::RenderSurface;

    // Mock effect for testing
    struct MockEffect {
        descriptor: EffectDescriptor,
        applied: usize,
    }

    impl MockEffect {
        fn new(id: &'static str, category: Category) -> Self {
            Self {
                descriptor: EffectDescriptor {
                    id,
                    name: id,
                    icon: "*",
                    category,
                },
                applied: 0,
            }
        }
    }

    impl Effect for MockEffect {
        fn descriptor(&self) -> &EffectDescriptor {
            &self.descriptor
        }

        fn apply(&mut self, _surface: &mut RenderSurface, _frame: &FrameInfo) {
            self.applied += 1;
        }
    }

    #[test]
    fn test_registry_new() {
        let registry = EffectRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.get("none").is_none());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = EffectRegistry::new();
        registry.register(MockEffect::new("snow", Category::Decorate)).unwrap();
        assert_eq!(
            registry.register(MockEffect::new("snow", Category::Basic)),
            Err(RegistryError::DuplicateId("snow".to_string()))
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list_by_category(Category::Basic).len(), 0);
    }

    #[test]
    fn test_registry_categories_and_order() {
        let mut registry = EffectRegistry::new();
        registry.register(MockEffect::new("spy", Category::Special)).unwrap();
        registry.register(MockEffect::new("sepia", Category::Color)).unwrap();
        registry.register(MockEffect::new("monochrome", Category::Color)).unwrap();

        let all: Vec<_> = registry.list_all().map(|d| d.id).collect();
        assert_eq!(all, vec!["spy", "sepia", "monochrome"]);

        let color: Vec<_> = registry
            .list_by_category(Category::Color)
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(color, vec!["sepia", "monochrome"]);
        assert_eq!(registry.categories(), vec![Category::Color, Category::Special]);
    }

    #[test]
    fn test_get_mut_returns_matching_instance() {
        let mut registry = EffectRegistry::new();
        registry.register(MockEffect::new("a", Category::Basic)).unwrap();
        registry.register(MockEffect::new("b", Category::Basic)).unwrap();

        let mut surface = RenderSurface::new(1, 1);
        let frame = FrameInfo::new(1, crate::render::SurfaceKind::Display);
        let effect = registry.get_mut("b").unwrap();
        assert_eq!(effect.id(), "b");
        effect.apply(&mut surface, &frame);
        assert_eq!(registry.get("a").unwrap().id(), "a");
    }

    #[test]
    fn test_neighbor_wraps() {
        let mut registry = EffectRegistry::new();
        for id in ["a", "b", "c"] {
            registry.register(MockEffect::new(id, Category::Basic)).unwrap();
        }
        assert_eq!(registry.neighbor("c", 1), Some("a"));
        assert_eq!(registry.neighbor("a", -1), Some("c"));
        assert_eq!(registry.neighbor("missing", 1), Some("b"));
    }
}
