use foundation::math::Vec3;

/// Geometry in world (ECEF) coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum VectorGeometry {
    Point { position: Vec3 },
    Line { vertices: Vec<Vec3> },
    Area { rings: Vec<Vec<Vec3>> },
}

impl VectorGeometry {
    /// Only points carry markers and can be picked.
    pub fn is_point(&self) -> bool {
        matches!(self, VectorGeometry::Point { .. })
    }
}
