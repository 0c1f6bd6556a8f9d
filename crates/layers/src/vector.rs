use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use foundation::bounds::Extent;
use serde_json::Value;

use crate::layer::{Handling, LayerDescriptor};

pub type Properties = BTreeMap<String, Value>;

/// Feature geometry in lon/lat degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point([f64; 2]),
    LineString(Vec<[f64; 2]>),
    Polygon(Vec<Vec<[f64; 2]>>),
}

impl Geometry {
    pub fn positions(&self) -> Vec<[f64; 2]> {
        match self {
            Geometry::Point(p) => vec![*p],
            Geometry::LineString(line) => line.clone(),
            Geometry::Polygon(rings) => rings.iter().flatten().copied().collect(),
        }
    }

    pub fn extent(&self) -> Option<Extent> {
        Extent::from_points(self.positions())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<String>,
    pub geometry: Geometry,
    pub properties: Properties,
}

impl Feature {
    pub fn point(lon: f64, lat: f64, properties: Properties) -> Self {
        Self {
            id: None,
            geometry: Geometry::Point([lon, lat]),
            properties,
        }
    }
}

/// Combined lon/lat extent of all features.
pub fn features_extent(features: &[Feature]) -> Option<Extent> {
    Extent::from_points(features.iter().flat_map(|f| f.geometry.positions()))
}

#[derive(Debug)]
pub enum LoadError {
    NotFound(String),
    UnsupportedFormat(Handling),
    Io(std::io::Error),
    Decode(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::NotFound(url) => write!(f, "no feature source at {url}"),
            LoadError::UnsupportedFormat(h) => write!(f, "unsupported vector format: {h:?}"),
            LoadError::Io(e) => write!(f, "io error: {e}"),
            LoadError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        LoadError::Io(e)
    }
}

/// Source of a vector layer's features.
pub trait FeatureLoader {
    fn load(&self, layer: &LayerDescriptor, url: &str) -> Result<Vec<Feature>, LoadError>;
}

/// Decode a GeoJSON `FeatureCollection` or single `Feature`.
///
/// Multi-geometries are split into one feature per part. Geometry types
/// without a counterpart are skipped.
pub fn decode_geojson(text: &str) -> Result<Vec<Feature>, LoadError> {
    let root: Value = serde_json::from_str(text).map_err(|e| LoadError::Decode(e.to_string()))?;
    match root.get("type").and_then(Value::as_str) {
        Some("FeatureCollection") => {
            let items = root
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| LoadError::Decode("FeatureCollection without features".into()))?;
            let mut out = Vec::new();
            for item in items {
                decode_feature(item, &mut out);
            }
            Ok(out)
        }
        Some("Feature") => {
            let mut out = Vec::new();
            decode_feature(&root, &mut out);
            Ok(out)
        }
        other => Err(LoadError::Decode(format!(
            "expected Feature or FeatureCollection, got {other:?}"
        ))),
    }
}

fn decode_feature(value: &Value, out: &mut Vec<Feature>) {
    let id = match value.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let properties: Properties = value
        .get("properties")
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    let Some(geometry) = value.get("geometry") else {
        tracing::debug!(?id, "feature without geometry skipped");
        return;
    };
    for geometry in decode_geometry(geometry) {
        out.push(Feature {
            id: id.clone(),
            geometry,
            properties: properties.clone(),
        });
    }
}

fn decode_geometry(value: &Value) -> Vec<Geometry> {
    let kind = value.get("type").and_then(Value::as_str).unwrap_or("");
    let coords = value.get("coordinates");
    let parsed = match kind {
        "Point" => coords.and_then(position).map(|p| vec![Geometry::Point(p)]),
        "MultiPoint" => coords
            .and_then(positions)
            .map(|ps| ps.into_iter().map(Geometry::Point).collect()),
        "LineString" => coords.and_then(positions).map(|l| vec![Geometry::LineString(l)]),
        "MultiLineString" => coords.and_then(Value::as_array).and_then(|lines| {
            lines
                .iter()
                .map(|l| positions(l).map(Geometry::LineString))
                .collect()
        }),
        "Polygon" => coords.and_then(rings).map(|r| vec![Geometry::Polygon(r)]),
        "MultiPolygon" => coords.and_then(Value::as_array).and_then(|polys| {
            polys
                .iter()
                .map(|p| rings(p).map(Geometry::Polygon))
                .collect()
        }),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        tracing::debug!(kind, "unsupported or malformed geometry skipped");
        Vec::new()
    })
}

fn position(value: &Value) -> Option<[f64; 2]> {
    let arr = value.as_array()?;
    // Altitude, when present, is ignored.
    let lon = arr.first()?.as_f64()?;
    let lat = arr.get(1)?.as_f64()?;
    Some([lon, lat])
}

fn positions(value: &Value) -> Option<Vec<[f64; 2]>> {
    value.as_array()?.iter().map(position).collect()
}

fn rings(value: &Value) -> Option<Vec<Vec<[f64; 2]>>> {
    value.as_array()?.iter().map(positions).collect()
}

/// In-memory loader keyed by URL. Counts loads so callers can observe caching.
#[derive(Debug, Default)]
pub struct StaticFeatureLoader {
    sources: HashMap<String, Vec<Feature>>,
    loads: Cell<usize>,
}

impl StaticFeatureLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, features: Vec<Feature>) -> Self {
        self.insert(url, features);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, features: Vec<Feature>) {
        self.sources.insert(url.into(), features);
    }

    pub fn load_count(&self) -> usize {
        self.loads.get()
    }
}

impl FeatureLoader for StaticFeatureLoader {
    fn load(&self, _layer: &LayerDescriptor, url: &str) -> Result<Vec<Feature>, LoadError> {
        self.loads.set(self.loads.get() + 1);
        self.sources
            .get(url)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(url.to_string()))
    }
}

/// Reads GeoJSON files relative to a root directory.
#[derive(Debug, Clone)]
pub struct GeoJsonFileLoader {
    root: PathBuf,
}

impl GeoJsonFileLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FeatureLoader for GeoJsonFileLoader {
    fn load(&self, layer: &LayerDescriptor, url: &str) -> Result<Vec<Feature>, LoadError> {
        match layer.handling {
            Handling::VectorGeojson | Handling::VectorCluster => {}
            other => return Err(LoadError::UnsupportedFormat(other)),
        }
        let path = self.root.join(url.trim_start_matches('/'));
        if !path.is_file() {
            return Err(LoadError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(&path)?;
        let features = decode_geojson(&text)?;
        tracing::debug!(layer = %layer.id, path = %path.display(), count = features.len(), "features loaded");
        Ok(features)
    }
}
