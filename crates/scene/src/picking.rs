use foundation::math::Vec3;

use crate::World;
use crate::entity::EntityId;
use crate::spatial::{Bvh, Item as BvhItem};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self { origin, dir }
    }

    pub fn at(&self, t: f64) -> Vec3 {
        self.origin + self.dir.scale(t)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickHit {
    pub entity: EntityId,
    pub distance: f64,
    pub point: Vec3,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PickOptions {
    pub max_distance: f64,
    /// Upper bound on returned hits; `0` means unlimited.
    pub limit: usize,
}

impl Default for PickOptions {
    fn default() -> Self {
        Self {
            max_distance: 1.0e30,
            limit: 0,
        }
    }
}

/// BVH over the entities that were pickable when it was built.
///
/// Stale once entity bounds or visibility change; rebuild after either.
#[derive(Debug, Clone, Default)]
pub struct PickIndex {
    bvh: Bvh,
}

impl PickIndex {
    pub fn build(world: &World) -> Self {
        let items = world
            .pickable()
            .into_iter()
            .map(|(entity, b)| BvhItem {
                entity,
                bounds: b.to_aabb3(),
            })
            .collect();
        Self {
            bvh: Bvh::build(items),
        }
    }

    pub fn len(&self) -> usize {
        self.bvh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bvh.is_empty()
    }

    /// Indexed entities whose bounds the ray passes through, nearest first.
    ///
    /// Equal distances fall back to ascending `EntityId::index()`.
    pub fn pick_all(&self, ray: Ray, opts: PickOptions) -> Vec<PickHit> {
        let Some(dir) = ray.dir.normalize() else {
            return Vec::new();
        };
        if self.bvh.is_empty() {
            return Vec::new();
        }

        let unit = Ray::new(ray.origin, dir);
        let hits = self.bvh.ray_hits(
            [ray.origin.x, ray.origin.y, ray.origin.z],
            [dir.x, dir.y, dir.z],
            0.0,
            opts.max_distance,
        );
        let take = if opts.limit == 0 { hits.len() } else { opts.limit };
        hits.into_iter()
            .take(take)
            .map(|(entity, t)| PickHit {
                entity,
                distance: t,
                point: unit.at(t),
            })
            .collect()
    }
}
