use crate::components::{
    ComponentBounds, ComponentProperties, LayerTag, PointMarker, Transform, VectorGeometry,
    Visibility,
};
use crate::entity::EntityId;
use foundation::handles::Handle;

/// Column store of entity components.
///
/// Indices are never reused; a despawned slot simply stays empty.
#[derive(Debug, Default)]
pub struct World {
    next_index: u32,
    alive: Vec<bool>,
    transforms: Vec<Option<Transform>>,
    bounds: Vec<Option<ComponentBounds>>,
    visibility: Vec<Option<Visibility>>,
    properties: Vec<Option<ComponentProperties>>,
    layer_tags: Vec<Option<LayerTag>>,
    markers: Vec<Option<PointMarker>>,
    geometries: Vec<Option<VectorGeometry>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> EntityId {
        let id = EntityId(Handle::new(self.next_index, 0));
        self.next_index += 1;
        let idx = id.index() as usize;
        self.ensure_capacity(idx);
        self.alive[idx] = true;
        id
    }

    /// Removes every component of `entity`. Returns `false` if it was not alive.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        let idx = entity.index() as usize;
        if !self.is_alive(entity) {
            return false;
        }
        self.alive[idx] = false;
        self.transforms[idx] = None;
        self.bounds[idx] = None;
        self.visibility[idx] = None;
        self.properties[idx] = None;
        self.layer_tags[idx] = None;
        self.markers[idx] = None;
        self.geometries[idx] = None;
        true
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.alive
            .get(entity.index() as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_transform(&mut self, entity: EntityId, transform: Transform) {
        self.ensure_capacity(entity.index() as usize);
        self.transforms[entity.index() as usize] = Some(transform);
    }

    pub fn set_bounds(&mut self, entity: EntityId, bounds: ComponentBounds) {
        self.ensure_capacity(entity.index() as usize);
        self.bounds[entity.index() as usize] = Some(bounds);
    }

    pub fn set_visibility(&mut self, entity: EntityId, visibility: Visibility) {
        self.ensure_capacity(entity.index() as usize);
        self.visibility[entity.index() as usize] = Some(visibility);
    }

    pub fn set_properties(&mut self, entity: EntityId, properties: ComponentProperties) {
        self.ensure_capacity(entity.index() as usize);
        self.properties[entity.index() as usize] = Some(properties);
    }

    pub fn set_layer_tag(&mut self, entity: EntityId, tag: LayerTag) {
        self.ensure_capacity(entity.index() as usize);
        self.layer_tags[entity.index() as usize] = Some(tag);
    }

    pub fn set_marker(&mut self, entity: EntityId, marker: Option<PointMarker>) {
        self.ensure_capacity(entity.index() as usize);
        self.markers[entity.index() as usize] = marker;
    }

    pub fn set_geometry(&mut self, entity: EntityId, geometry: VectorGeometry) {
        self.ensure_capacity(entity.index() as usize);
        self.geometries[entity.index() as usize] = Some(geometry);
    }

    pub fn transform(&self, entity: EntityId) -> Option<Transform> {
        self.transforms
            .get(entity.index() as usize)
            .and_then(|t| *t)
    }

    pub fn bounds(&self, entity: EntityId) -> Option<ComponentBounds> {
        self.bounds.get(entity.index() as usize).and_then(|b| *b)
    }

    /// Entities without an explicit visibility component are visible.
    pub fn is_visible(&self, entity: EntityId) -> bool {
        self.visibility
            .get(entity.index() as usize)
            .and_then(|v| *v)
            .is_none_or(|v| v.is_shown())
    }

    pub fn properties(&self, entity: EntityId) -> Option<&ComponentProperties> {
        self.properties
            .get(entity.index() as usize)
            .and_then(|p| p.as_ref())
    }

    pub fn layer_tag(&self, entity: EntityId) -> Option<&LayerTag> {
        self.layer_tags
            .get(entity.index() as usize)
            .and_then(|t| t.as_ref())
    }

    pub fn marker(&self, entity: EntityId) -> Option<&PointMarker> {
        self.markers
            .get(entity.index() as usize)
            .and_then(|m| m.as_ref())
    }

    pub fn geometry(&self, entity: EntityId) -> Option<&VectorGeometry> {
        self.geometries
            .get(entity.index() as usize)
            .and_then(|g| g.as_ref())
    }

    /// Visible entities that have both a transform and explicit bounds.
    pub fn pickable(&self) -> Vec<(EntityId, ComponentBounds)> {
        let mut out = Vec::new();
        for (idx, alive) in self.alive.iter().enumerate() {
            if !alive {
                continue;
            }
            let entity = EntityId(Handle::new(idx as u32, 0));
            if !self.is_visible(entity) || self.transform(entity).is_none() {
                continue;
            }
            let Some(bounds) = self.bounds(entity) else {
                continue;
            };
            out.push((entity, bounds));
        }
        out
    }

    fn ensure_capacity(&mut self, idx: usize) {
        if self.alive.len() <= idx {
            let new_len = idx + 1;
            self.alive.resize(new_len, false);
            self.transforms.resize(new_len, None);
            self.bounds.resize(new_len, None);
            self.visibility.resize(new_len, None);
            self.properties.resize(new_len, None);
            self.layer_tags.resize(new_len, None);
            self.markers.resize(new_len, None);
            self.geometries.resize(new_len, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::World;
    use crate::components::{ComponentBounds, LayerTag, Transform, Visibility};
    use foundation::math::Vec3;

    fn spawn_box(world: &mut World, tag: &str) -> crate::entity::EntityId {
        let e = world.spawn();
        world.set_transform(e, Transform::identity());
        world.set_bounds(e, ComponentBounds::around(Vec3::new(0.0, 0.0, 0.0), 1.0));
        world.set_layer_tag(e, LayerTag::new(tag));
        e
    }

    #[test]
    fn hidden_entities_are_not_pickable() {
        let mut world = World::new();
        let a = spawn_box(&mut world, "a");
        let b = spawn_box(&mut world, "a");
        world.set_visibility(b, Visibility::Filtered);

        let pickable: Vec<_> = world.pickable().into_iter().map(|(e, _)| e).collect();
        assert_eq!(pickable, vec![a]);
    }

    #[test]
    fn despawn_clears_components() {
        let mut world = World::new();
        let a = spawn_box(&mut world, "storms");
        assert_eq!(world.len(), 1);
        assert!(world.despawn(a));
        assert!(!world.despawn(a));
        assert!(world.is_empty());
        assert!(world.transform(a).is_none());
        assert!(world.layer_tag(a).is_none());
        assert!(world.pickable().is_empty());
    }
}
