use std::fmt;

use layers::Backend;

use crate::adapter::MapEngine;

/// Adapters owned by the application, at most one per backend.
///
/// Ordering contract: iteration follows registration order; re-registering a
/// backend keeps its original slot.
#[derive(Default)]
pub struct EngineRegistry {
    engines: Vec<Box<dyn MapEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, returning the one it replaced for the same backend.
    pub fn register(&mut self, engine: Box<dyn MapEngine>) -> Option<Box<dyn MapEngine>> {
        let backend = engine.backend();
        match self.engines.iter().position(|e| e.backend() == backend) {
            Some(idx) => Some(std::mem::replace(&mut self.engines[idx], engine)),
            None => {
                self.engines.push(engine);
                None
            }
        }
    }

    pub fn unregister(&mut self, backend: Backend) -> Option<Box<dyn MapEngine>> {
        let idx = self.engines.iter().position(|e| e.backend() == backend)?;
        Some(self.engines.remove(idx))
    }

    pub fn get(&self, backend: Backend) -> Option<&dyn MapEngine> {
        self.engines
            .iter()
            .find(|e| e.backend() == backend)
            .map(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, backend: Backend) -> Option<&mut Box<dyn MapEngine>> {
        self.engines.iter_mut().find(|e| e.backend() == backend)
    }

    /// Returns `false` when no adapter is registered for `backend`.
    pub fn set_active(&mut self, backend: Backend, active: bool) -> bool {
        match self.get_mut(backend) {
            Some(engine) => {
                engine.set_active(active);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn MapEngine> {
        self.engines.iter().map(|e| e.as_ref())
    }

    pub fn iter_active(&self) -> impl Iterator<Item = &dyn MapEngine> {
        self.iter().filter(|e| e.is_active())
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn MapEngine>> {
        self.engines.iter_mut().filter(|e| e.is_active())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn MapEngine>> {
        self.engines.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.engines
                    .iter()
                    .map(|e| (e.backend(), e.is_active())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::EngineRegistry;
    use crate::adapter::{MapEngine, Viewport};
    use crate::defaults::EngineDefaults;
    use crate::globe::GlobeEngine;
    use crate::planar::PlanarEngine;
    use foundation::math::Projection;
    use layers::Backend;
    use layers::vector::StaticFeatureLoader;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn planar() -> Box<dyn MapEngine> {
        Box::new(PlanarEngine::new(
            Projection::Epsg4326,
            Viewport::new(800.0, 600.0),
            Rc::new(StaticFeatureLoader::new()),
            EngineDefaults::default(),
        ))
    }

    fn globe() -> Box<dyn MapEngine> {
        Box::new(GlobeEngine::new(
            Viewport::new(800.0, 600.0),
            Rc::new(StaticFeatureLoader::new()),
            EngineDefaults::default(),
        ))
    }

    #[test]
    fn one_adapter_per_backend_in_registration_order() {
        let mut registry = EngineRegistry::new();
        assert!(registry.register(globe()).is_none());
        assert!(registry.register(planar()).is_none());
        assert!(registry.register(globe()).is_some());
        assert_eq!(registry.len(), 2);

        let order: Vec<Backend> = registry.iter().map(|e| e.backend()).collect();
        assert_eq!(order, vec![Backend::Globe, Backend::Planar]);
    }

    #[test]
    fn active_flags_filter_iteration() {
        let mut registry = EngineRegistry::new();
        registry.register(planar());
        registry.register(globe());
        assert!(registry.set_active(Backend::Planar, false));
        let active: Vec<Backend> = registry.iter_active().map(|e| e.backend()).collect();
        assert_eq!(active, vec![Backend::Globe]);

        assert!(registry.unregister(Backend::Globe).is_some());
        assert!(!registry.set_active(Backend::Globe, true));
        assert_eq!(registry.iter_active().count(), 0);
        assert!(registry.get(Backend::Planar).is_some_and(|e| !e.is_active()));
    }
}
