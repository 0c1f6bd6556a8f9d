use foundation::math::{Geodetic, Vec3, ecef_to_geodetic, geodetic_to_ecef};

/// Entity position in world (ECEF) coordinates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 0.0),
        }
    }

    pub fn translate(position: Vec3) -> Self {
        Self { position }
    }

    pub fn from_lon_lat(lon_deg: f64, lat_deg: f64, alt_m: f64) -> Self {
        let ecef = geodetic_to_ecef(Geodetic::from_degrees(lon_deg, lat_deg, alt_m));
        Self::translate(ecef.into())
    }

    /// `[lon, lat]` in degrees.
    pub fn lon_lat(&self) -> [f64; 2] {
        let geo = ecef_to_geodetic(self.position.into());
        [geo.lon_deg(), geo.lat_deg()]
    }
}
