use std::collections::BTreeMap;
use std::path::Path;

use layers::{LayerDescriptor, LayerId};
use serde::{Deserialize, Serialize};

/// On-disk catalog document: `{"layers": [...]}`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub layers: Vec<LayerDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    NotFound(String),
    DuplicateId(String),
    Corrupt(String),
    Io(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::NotFound(id) => write!(f, "layer not found: {id}"),
            CatalogError::DuplicateId(id) => write!(f, "duplicate layer id: {id}"),
            CatalogError::Corrupt(msg) => write!(f, "layer catalog corrupt: {msg}"),
            CatalogError::Io(msg) => write!(f, "layer catalog error: {msg}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// Read access to the session's layer descriptors.
pub trait LayerCatalog {
    fn resolve_layer_by_id(&self, id: &str) -> Option<&LayerDescriptor>;

    /// Ordering contract: ascending display index, ties broken by id.
    fn layers(&self) -> Vec<&LayerDescriptor>;
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryLayerCatalog {
    entries: BTreeMap<LayerId, LayerDescriptor>,
}

impl InMemoryLayerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts either a catalog document or a bare array of descriptors.
    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| CatalogError::Corrupt(e.to_string()))?;
        let layers: Vec<LayerDescriptor> = if value.is_array() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value::<CatalogSnapshot>(value).map(|s| s.layers)
        }
        .map_err(|e| CatalogError::Corrupt(e.to_string()))?;

        let mut catalog = Self::new();
        for layer in layers {
            if catalog.entries.contains_key(&layer.id) {
                return Err(CatalogError::DuplicateId(layer.id.0));
            }
            catalog.upsert(layer);
        }
        tracing::debug!(count = catalog.len(), "layer catalog loaded");
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn upsert(&mut self, layer: LayerDescriptor) {
        self.entries.insert(layer.id.clone(), layer);
    }

    pub fn remove(&mut self, id: &str) -> Option<LayerDescriptor> {
        self.entries.remove(&LayerId::new(id))
    }

    pub fn get_mut(&mut self, id: &str) -> Result<&mut LayerDescriptor, CatalogError> {
        self.entries
            .get_mut(&LayerId::new(id))
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LayerDescriptor> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            layers: self.layers().into_iter().cloned().collect(),
        }
    }
}

impl LayerCatalog for InMemoryLayerCatalog {
    fn resolve_layer_by_id(&self, id: &str) -> Option<&LayerDescriptor> {
        self.entries.get(&LayerId::new(id))
    }

    fn layers(&self) -> Vec<&LayerDescriptor> {
        let mut out: Vec<&LayerDescriptor> = self.entries.values().collect();
        out.sort_by(|a, b| {
            a.display_index
                .cmp(&b.display_index)
                .then_with(|| a.id.cmp(&b.id))
        });
        out
    }
}
