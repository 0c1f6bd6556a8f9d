use std::collections::BTreeMap;

use serde_json::Value;

/// Feature attributes carried by an entity (GeoJSON-style property bag).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentProperties {
    pub values: BTreeMap<String, Value>,
}

impl ComponentProperties {
    pub fn new(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }
}
