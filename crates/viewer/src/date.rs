use chrono::{DateTime, Utc};
use layers::LayerDescriptor;

use crate::state::MapState;

/// Set the global map date and re-anchor every time-enabled layer to it.
///
/// Active time-enabled layers are pushed to each active engine that holds them,
/// so time-windowed styling follows the global clock.
pub fn set_map_date(mut state: MapState, date: DateTime<Utc>) -> MapState {
    state.view.date = date;

    let mut touched: Vec<LayerDescriptor> = Vec::new();
    for layer in state.catalog.iter_mut() {
        if !layer.is_time_enabled() {
            continue;
        }
        layer.time = Some(date);
        if layer.is_active {
            touched.push(layer.clone());
        }
    }

    for engine in state.engines.iter_active_mut() {
        for layer in &touched {
            if !engine.has_layer(&layer.id) {
                continue;
            }
            if let Err(e) = engine.update_layer(layer) {
                tracing::debug!(backend = %engine.backend(), layer = %layer.id, error = %e, "layer not re-timed");
            }
        }
    }
    tracing::debug!(%date, layers = touched.len(), "map date set");
    state
}
