/// Concentric point marker, drawn outermost ring first.
#[derive(Debug, Clone, PartialEq)]
pub struct PointMarker {
    pub rings: Vec<MarkerRing>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarkerRing {
    /// Radius in screen pixels.
    pub radius_px: f64,
    pub color: [u8; 4],
}

impl MarkerRing {
    pub const fn new(radius_px: f64, color: [u8; 4]) -> Self {
        Self { radius_px, color }
    }
}

impl PointMarker {
    pub fn new(rings: Vec<MarkerRing>) -> Self {
        Self { rings }
    }

    pub fn dot(radius_px: f64, color: [u8; 4]) -> Self {
        Self::new(vec![MarkerRing::new(radius_px, color)])
    }

    /// Largest ring radius; what hit testing measures against.
    pub fn radius_px(&self) -> f64 {
        self.rings.iter().map(|r| r.radius_px).fold(0.0, f64::max)
    }
}
