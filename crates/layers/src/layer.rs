use std::fmt;

use chrono::{DateTime, Utc};
use foundation::bounds::Extent;
use foundation::time::format_moment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Rendering backend a map engine adapter drives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Backend {
    #[serde(rename = "2D")]
    Planar,
    #[serde(rename = "3D")]
    Globe,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Planar => f.write_str("2D"),
            Backend::Globe => f.write_str("3D"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    #[default]
    Data,
    Basemap,
    Reference,
}

/// How a layer's data is fetched and drawn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handling {
    Wmts,
    VectorGeojson,
    VectorKml,
    VectorTopojson,
    VectorCluster,
}

impl Handling {
    pub fn is_vector(&self) -> bool {
        !matches!(self, Handling::Wmts)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStyleMode {
    Storm,
}

/// Per-backend rewrite applied to a layer's source URL.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UrlRewrite {
    #[default]
    Identity,
    /// Replaces `{Time}` with the layer's displayed time in its time format.
    InsertTime,
    Prefix { prefix: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UrlFunctions {
    #[serde(default, rename = "2D")]
    pub planar: Option<UrlRewrite>,
    #[serde(default, rename = "3D")]
    pub globe: Option<UrlRewrite>,
}

impl UrlFunctions {
    pub fn for_backend(&self, backend: Backend) -> Option<&UrlRewrite> {
        match backend {
            Backend::Planar => self.planar.as_ref(),
            Backend::Globe => self.globe.as_ref(),
        }
    }
}

fn default_opacity() -> f32 {
    1.0
}

/// Catalog entry describing one map layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerDescriptor {
    pub id: LayerId,
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "type")]
    pub layer_type: LayerType,
    pub handling: Handling,
    /// West, south, east, north in lon/lat degrees.
    #[serde(default)]
    pub extent: Option<Extent>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub url_functions: UrlFunctions,
    #[serde(default)]
    pub vector_style: Option<VectorStyleMode>,
    /// Moment-style format of the features' time field.
    #[serde(default)]
    pub time_format: Option<String>,
    /// Currently displayed time of the layer.
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub display_index: u32,
}

impl LayerDescriptor {
    pub fn new(id: impl Into<String>, handling: Handling) -> Self {
        Self {
            id: LayerId::new(id),
            title: String::new(),
            layer_type: LayerType::Data,
            handling,
            extent: None,
            urls: Vec::new(),
            url_functions: UrlFunctions::default(),
            vector_style: None,
            time_format: None,
            time: None,
            opacity: 1.0,
            is_active: false,
            display_index: 0,
        }
    }

    pub fn is_storm(&self) -> bool {
        self.vector_style == Some(VectorStyleMode::Storm)
    }

    /// Whether the layer follows the global map time.
    pub fn is_time_enabled(&self) -> bool {
        self.time_format.is_some()
    }

    /// First source URL, rewritten for `backend`.
    pub fn resolve_url(&self, backend: Backend) -> Option<String> {
        let url = self.urls.first()?;
        let rewrite = self
            .url_functions
            .for_backend(backend)
            .cloned()
            .unwrap_or_default();
        Some(match rewrite {
            UrlRewrite::Identity => url.clone(),
            UrlRewrite::InsertTime => {
                let stamp = match (self.time, self.time_format.as_deref()) {
                    (Some(t), Some(fmt)) => format_moment(t, fmt),
                    (Some(t), None) => t.format("%Y-%m-%d").to_string(),
                    (None, _) => String::new(),
                };
                url.replace("{Time}", &stamp)
            }
            UrlRewrite::Prefix { prefix } => format!("{prefix}{url}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Backend, Handling, LayerDescriptor, LayerType, UrlRewrite, VectorStyleMode};
    use chrono::{TimeZone, Utc};
    use foundation::bounds::Extent;
    use pretty_assertions::assert_eq;

    #[test]
    fn deserializes_catalog_json() {
        let layer: LayerDescriptor = serde_json::from_str(
            r#"{
                "id": "hurricane_irma",
                "title": "Hurricane Irma",
                "type": "data",
                "handling": "vector_geojson",
                "extent": [-90, 10, -20, 40],
                "urls": ["tracks/irma.json"],
                "urlFunctions": {"3D": {"kind": "prefix", "prefix": "/proxy/"}},
                "vectorStyle": "storm",
                "timeFormat": "YYYY-MM-DD HHmm",
                "displayIndex": 3
            }"#,
        )
        .expect("parse");

        assert_eq!(layer.layer_type, LayerType::Data);
        assert_eq!(layer.handling, Handling::VectorGeojson);
        assert_eq!(layer.extent, Some(Extent::new(-90.0, 10.0, -20.0, 40.0)));
        assert_eq!(layer.vector_style, Some(VectorStyleMode::Storm));
        assert_eq!(layer.opacity, 1.0);
        assert!(!layer.is_active);
        assert!(layer.is_storm());
        assert!(layer.is_time_enabled());
        assert_eq!(layer.display_index, 3);
    }

    #[test]
    fn url_rewrite_per_backend() {
        let mut layer = LayerDescriptor::new("sst", Handling::Wmts);
        layer.urls = vec!["tiles/sst/{Time}/{z}/{x}/{y}.png".to_string()];
        layer.time_format = Some("YYYY-MM-DD".to_string());
        layer.time = Some(Utc.with_ymd_and_hms(2017, 9, 1, 0, 0, 0).unwrap());
        layer.url_functions.planar = Some(UrlRewrite::InsertTime);
        layer.url_functions.globe = Some(UrlRewrite::Prefix {
            prefix: "https://cache/".to_string(),
        });

        assert_eq!(
            layer.resolve_url(Backend::Planar).as_deref(),
            Some("tiles/sst/2017-09-01/{z}/{x}/{y}.png")
        );
        assert_eq!(
            layer.resolve_url(Backend::Globe).as_deref(),
            Some("https://cache/tiles/sst/{Time}/{z}/{x}/{y}.png")
        );
    }

    #[test]
    fn no_urls_resolves_to_none() {
        let layer = LayerDescriptor::new("empty", Handling::VectorGeojson);
        assert_eq!(layer.resolve_url(Backend::Planar), None);
    }
}
