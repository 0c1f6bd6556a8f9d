use catalog::LayerCatalog;
use layers::LayerDescriptor;

use crate::alerts::{ZOOM_TO_LAYER_FAILED, add_alert};
use crate::state::MapState;

/// A layer given either by identifier or as a full descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerRef {
    Id(String),
    Layer(LayerDescriptor),
}

impl From<&str> for LayerRef {
    fn from(id: &str) -> Self {
        LayerRef::Id(id.to_string())
    }
}

impl From<String> for LayerRef {
    fn from(id: String) -> Self {
        LayerRef::Id(id)
    }
}

impl From<LayerDescriptor> for LayerRef {
    fn from(layer: LayerDescriptor) -> Self {
        LayerRef::Layer(layer)
    }
}

/// Zoom every active engine to a layer.
///
/// An identifier missing from the catalog raises one alert and touches no
/// engine. Engines that fail to zoom are not reported to the user.
pub fn zoom_to_layer(state: MapState, layer: LayerRef) -> MapState {
    let layer = match layer {
        LayerRef::Layer(layer) => layer,
        LayerRef::Id(id) => {
            let resolved = state.catalog.resolve_layer_by_id(&id).cloned();
            match resolved {
                Some(layer) => layer,
                None => {
                    let alert = ZOOM_TO_LAYER_FAILED.render(&[("LAYER", id.as_str())]);
                    return add_alert(state, alert);
                }
            }
        }
    };

    let mut state = state;
    let mut zoomed = 0usize;
    for engine in state.engines.iter_active_mut() {
        match engine.zoom_to_layer(&layer) {
            Ok(()) => zoomed += 1,
            Err(e) => {
                tracing::debug!(backend = %engine.backend(), layer = %layer.id, error = %e, "engine did not zoom");
            }
        }
    }
    tracing::debug!(layer = %layer.id, zoomed, "zoom to layer");
    state
}
