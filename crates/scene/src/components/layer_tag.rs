/// Back-reference from a rendered entity to the layer that spawned it.
///
/// Lookup only: the world owns the entity, the layer index owns the entity list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayerTag(pub String);

impl LayerTag {
    pub fn new(layer_id: impl Into<String>) -> Self {
        Self(layer_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
