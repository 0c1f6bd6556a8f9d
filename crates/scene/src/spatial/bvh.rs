use foundation::bounds::Aabb3;

use crate::entity::EntityId;

/// Bounding volume hierarchy over marker bounds, rebuilt whenever the pickable
/// set changes.
///
/// Items live in one array; each leaf owns a contiguous range of it.
/// `ray_hits` returns nearest entry first, ties by ascending `EntityId::index()`.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<Node>,
    items: Vec<Item>,
}

#[derive(Debug, Copy, Clone)]
struct Node {
    bounds: Aabb3,
    kind: NodeKind,
}

#[derive(Debug, Copy, Clone)]
enum NodeKind {
    Leaf { start: usize, end: usize },
    Split { left: usize, right: usize },
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Item {
    pub entity: EntityId,
    pub bounds: Aabb3,
}

const MAX_LEAF_ITEMS: usize = 6;

impl Bvh {
    pub fn build(mut items: Vec<Item>) -> Self {
        // Stable input order so equal-centroid items split the same way every build.
        items.sort_by_key(|i| i.entity.index());
        let mut nodes = Vec::with_capacity(2 * items.len() / MAX_LEAF_ITEMS + 1);
        if !items.is_empty() {
            let len = items.len();
            subdivide(&mut nodes, &mut items, 0, len);
        }
        Self { nodes, items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Items a ray enters within `[t_min, t_max]`, with the entry distance.
    ///
    /// Distances are in units of `dir`; pass a unit vector for metres.
    pub fn ray_hits(
        &self,
        origin: [f64; 3],
        dir: [f64; 3],
        t_min: f64,
        t_max: f64,
    ) -> Vec<(EntityId, f64)> {
        let mut hits = Vec::new();
        if self.nodes.is_empty() {
            return hits;
        }
        let inv = dir.map(|d| if d.abs() < 1e-12 { f64::INFINITY } else { 1.0 / d });

        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = self.nodes[idx];
            if slab_entry(origin, dir, inv, &node.bounds, t_min, t_max).is_none() {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { start, end } => {
                    hits.extend(self.items[start..end].iter().filter_map(|item| {
                        slab_entry(origin, dir, inv, &item.bounds, t_min, t_max)
                            .map(|t| (item.entity, t))
                    }));
                }
                NodeKind::Split { left, right } => {
                    stack.push(right);
                    stack.push(left);
                }
            }
        }

        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.index().cmp(&b.0.index())));
        hits
    }
}

fn subdivide(nodes: &mut Vec<Node>, items: &mut [Item], start: usize, end: usize) -> usize {
    let bounds = enclose(&items[start..end]);
    let idx = nodes.len();
    nodes.push(Node {
        bounds,
        kind: NodeKind::Leaf { start, end },
    });
    if end - start <= MAX_LEAF_ITEMS {
        return idx;
    }

    let axis = longest_axis(&bounds);
    let mid = start + (end - start) / 2;
    items[start..end].select_nth_unstable_by(mid - start, |a, b| {
        center(&a.bounds, axis)
            .total_cmp(&center(&b.bounds, axis))
            .then(a.entity.index().cmp(&b.entity.index()))
    });

    let left = subdivide(nodes, items, start, mid);
    let right = subdivide(nodes, items, mid, end);
    nodes[idx].kind = NodeKind::Split { left, right };
    idx
}

fn center(b: &Aabb3, axis: usize) -> f64 {
    0.5 * (b.min[axis] + b.max[axis])
}

/// Ties prefer the lower axis.
fn longest_axis(b: &Aabb3) -> usize {
    let ext = [0, 1, 2].map(|a| b.max[a] - b.min[a]);
    let mut best = 0;
    for axis in 1..3 {
        if ext[axis] > ext[best] {
            best = axis;
        }
    }
    best
}

fn enclose(items: &[Item]) -> Aabb3 {
    items.iter().skip(1).fold(items[0].bounds, |mut acc, item| {
        for axis in 0..3 {
            acc.min[axis] = acc.min[axis].min(item.bounds.min[axis]);
            acc.max[axis] = acc.max[axis].max(item.bounds.max[axis]);
        }
        acc
    })
}

/// Entry distance of the ray into `b`, clamped to 0 when the origin is inside.
fn slab_entry(
    origin: [f64; 3],
    dir: [f64; 3],
    inv: [f64; 3],
    b: &Aabb3,
    mut near: f64,
    mut far: f64,
) -> Option<f64> {
    for axis in 0..3 {
        if inv[axis].is_infinite() {
            if origin[axis] < b.min[axis] || origin[axis] > b.max[axis] {
                return None;
            }
            continue;
        }
        let t0 = (b.min[axis] - origin[axis]) * inv[axis];
        let t1 = (b.max[axis] - origin[axis]) * inv[axis];
        let (lo, hi) = if dir[axis] < 0.0 { (t1, t0) } else { (t0, t1) };
        near = near.max(lo);
        far = far.min(hi);
        if far < near {
            return None;
        }
    }
    Some(near.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::{Bvh, Item};
    use crate::entity::EntityId;
    use foundation::bounds::Aabb3;
    use foundation::handles::Handle;

    fn id(idx: u32) -> EntityId {
        EntityId(Handle::new(idx, 0))
    }

    /// Markers spaced along +x at a fixed height, like a storm track seen from above.
    fn track(n: u32) -> Vec<Item> {
        (0..n)
            .map(|i| Item {
                entity: id(i),
                bounds: Aabb3::around([f64::from(i) * 4.0, 0.0, 0.0], 1.5),
            })
            .collect()
    }

    #[test]
    fn vertical_ray_hits_single_marker() {
        let bvh = Bvh::build(track(40));
        assert_eq!(bvh.len(), 40);
        let hits = bvh.ray_hits([80.0, 0.0, 100.0], [0.0, 0.0, -1.0], 0.0, 1.0e6);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, id(20));
        assert!((hits[0].1 - 98.5).abs() < 1e-9);
    }

    #[test]
    fn grazing_ray_orders_by_depth() {
        let bvh = Bvh::build(track(15));
        let hits = bvh.ray_hits([200.0, 0.0, 0.0], [-1.0, 0.0, 0.0], 0.0, 1.0e6);
        let order: Vec<u32> = hits.iter().map(|(e, _)| e.index()).collect();
        assert_eq!(order, (0..15).rev().collect::<Vec<_>>());
    }

    #[test]
    fn stacked_markers_tie_by_index() {
        let mut items = track(3);
        items.push(Item {
            entity: id(9),
            bounds: items[1].bounds,
        });
        items.reverse();
        let hits = Bvh::build(items).ray_hits([4.0, 0.0, 50.0], [0.0, 0.0, -1.0], 0.0, 1.0e6);
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![id(1), id(9)]);
    }

    #[test]
    fn range_limit_and_misses() {
        let bvh = Bvh::build(track(8));
        assert!(bvh.ray_hits([8.0, 0.0, 100.0], [0.0, 0.0, -1.0], 0.0, 50.0).is_empty());
        assert!(bvh.ray_hits([2.0, 0.0, 100.0], [0.0, 0.0, -1.0], 0.0, 1.0e6).is_empty());
        assert!(Bvh::build(Vec::new()).is_empty());
    }
}
