//! Map projections used by the planar engine.
//!
//! The reference projection for anything crossing an engine boundary is
//! EPSG:4326 (lon/lat degrees). Planar views may run natively in EPSG:3857.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::WGS84_A;
use crate::bounds::Extent;

/// Half the width of the Web Mercator world square (meters).
pub const MERCATOR_HALF_SIZE: f64 = std::f64::consts::PI * WGS84_A;

/// Latitude at which the Web Mercator square is clipped.
pub const MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Projection {
    /// Geographic lon/lat degrees.
    #[default]
    Epsg4326,
    /// Spherical Web Mercator (meters).
    Epsg3857,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionError {
    UnsupportedCode(String),
    NonFinite { x: f64, y: f64 },
    OutOfDomain { x: f64, y: f64 },
}

impl fmt::Display for ProjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionError::UnsupportedCode(code) => write!(f, "unsupported projection: {code}"),
            ProjectionError::NonFinite { x, y } => write!(f, "non-finite coordinate ({x}, {y})"),
            ProjectionError::OutOfDomain { x, y } => {
                write!(f, "coordinate ({x}, {y}) outside projection domain")
            }
        }
    }
}

impl std::error::Error for ProjectionError {}

impl Projection {
    pub fn from_code(code: &str) -> Result<Self, ProjectionError> {
        match code.to_uppercase().as_str() {
            "EPSG:4326" | "CRS:84" => Ok(Projection::Epsg4326),
            "EPSG:3857" | "EPSG:900913" => Ok(Projection::Epsg3857),
            _ => Err(ProjectionError::UnsupportedCode(code.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Projection::Epsg4326 => "EPSG:4326",
            Projection::Epsg3857 => "EPSG:3857",
        }
    }

    /// Valid native bounds of the projection.
    pub fn world_extent(&self) -> Extent {
        match self {
            Projection::Epsg4326 => Extent::WORLD,
            Projection::Epsg3857 => Extent::new(
                -MERCATOR_HALF_SIZE,
                -MERCATOR_HALF_SIZE,
                MERCATOR_HALF_SIZE,
                MERCATOR_HALF_SIZE,
            ),
        }
    }

    /// Lon/lat degrees to native coordinates.
    ///
    /// Mercator clips latitude to [`MERCATOR_MAX_LAT`]; latitudes beyond the poles are rejected.
    pub fn forward(&self, lon: f64, lat: f64) -> Result<[f64; 2], ProjectionError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(ProjectionError::NonFinite { x: lon, y: lat });
        }
        match self {
            Projection::Epsg4326 => Ok([lon, lat]),
            Projection::Epsg3857 => {
                if lat.abs() > 90.0 {
                    return Err(ProjectionError::OutOfDomain { x: lon, y: lat });
                }
                let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
                let x = WGS84_A * lon.to_radians();
                let y = WGS84_A * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
                Ok([x, y])
            }
        }
    }

    /// Native coordinates to lon/lat degrees.
    ///
    /// No range check is applied; callers decide whether the result is plausible.
    pub fn inverse(&self, x: f64, y: f64) -> Result<[f64; 2], ProjectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::NonFinite { x, y });
        }
        match self {
            Projection::Epsg4326 => Ok([x, y]),
            Projection::Epsg3857 => {
                let lon = (x / WGS84_A).to_degrees();
                let lat = (2.0 * (y / WGS84_A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
                Ok([lon, lat])
            }
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<String> for Projection {
    type Error = ProjectionError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        Projection::from_code(&code)
    }
}

impl From<Projection> for String {
    fn from(p: Projection) -> Self {
        p.code().to_string()
    }
}

/// Transform a point between projections, passing through lon/lat.
pub fn transform(point: [f64; 2], from: Projection, to: Projection) -> Result<[f64; 2], ProjectionError> {
    if from == to {
        if !point[0].is_finite() || !point[1].is_finite() {
            return Err(ProjectionError::NonFinite { x: point[0], y: point[1] });
        }
        return Ok(point);
    }
    let [lon, lat] = from.inverse(point[0], point[1])?;
    to.forward(lon, lat)
}

/// Transform an extent by its four corners.
///
/// Either every corner transforms or the whole call fails; there is no partial result.
pub fn transform_extent(extent: Extent, from: Projection, to: Projection) -> Result<Extent, ProjectionError> {
    let corners = [
        [extent.west, extent.south],
        [extent.west, extent.north],
        [extent.east, extent.south],
        [extent.east, extent.north],
    ];
    let mut out = Vec::with_capacity(corners.len());
    for c in corners {
        out.push(transform(c, from, to)?);
    }
    Extent::from_points(out).ok_or(ProjectionError::NonFinite {
        x: extent.west,
        y: extent.south,
    })
}
