/// Draw state of an entity, with the reason it is hidden.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Shown,
    /// The owning layer is switched off.
    LayerHidden,
    /// The layer is on but its style rejects this feature.
    Filtered,
}

impl Visibility {
    /// Layer state wins over per-feature styling.
    pub fn resolve(layer_visible: bool, styled: bool) -> Self {
        match (layer_visible, styled) {
            (false, _) => Visibility::LayerHidden,
            (true, false) => Visibility::Filtered,
            (true, true) => Visibility::Shown,
        }
    }

    pub fn is_shown(&self) -> bool {
        matches!(self, Visibility::Shown)
    }
}
