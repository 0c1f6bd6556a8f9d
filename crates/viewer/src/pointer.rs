//! Pointer hover/click reduction: coordinates and data under the pointer.

use catalog::LayerCatalog;
use engine::{ClickEvent, EngineRegistry, GeoCoordinate, MapEngine, PickedFeature, Pixel};
use foundation::time::format_moment;
use layers::LayerDescriptor;
use layers::symbology::{
    INTENSITY_FIELD, PRESSURE_FIELD, StormCategory, TIME_FIELD, classify, feature_time,
    property_f64,
};
use layers::vector::Properties;
use serde::Serialize;

use crate::date::set_map_date;
use crate::state::MapState;

const READOUT_TIME_FORMAT: &str = "MMM DD, HH:mm [UTC]";

/// A picked feature joined with its layer's descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinedFeature {
    pub layer: LayerDescriptor,
    pub properties: Properties,
    /// `[lon, lat]` in degrees.
    pub coords: [f64; 2],
}

impl JoinedFeature {
    /// Text shown for a storm-track point under the pointer.
    pub fn storm_readout(&self) -> StormReadout {
        let intensity = property_f64(&self.properties, INTENSITY_FIELD);
        let category = classify(intensity.unwrap_or(f64::NAN));
        StormReadout {
            title: self.layer.title.clone(),
            category,
            label: category.label(),
            color: category.color(),
            text_color: category.text_color(),
            time: feature_time(&self.properties, self.layer.time_format.as_deref())
                .map(|t| format_moment(t, READOUT_TIME_FORMAT)),
            lon: self.coords[0],
            lat: self.coords[1],
            intensity_kt: intensity,
            min_sea_level_pressure_mb: property_f64(&self.properties, PRESSURE_FIELD),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StormReadout {
    pub title: String,
    pub category: StormCategory,
    pub label: &'static str,
    pub color: &'static str,
    pub text_color: &'static str,
    pub time: Option<String>,
    pub lon: f64,
    pub lat: f64,
    pub intensity_kt: Option<f64>,
    pub min_sea_level_pressure_mb: Option<f64>,
}

/// Pointer slice of the view state. Replaced wholesale on every event.
///
/// When `is_valid` is false every other field holds its default, so two
/// invalid slices always compare equal.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerState {
    pub is_valid: bool,
    pub lat: f64,
    pub lon: f64,
    pub x: f64,
    pub y: f64,
    pub data: Vec<JoinedFeature>,
    pub show_data: bool,
}

/// First active adapter yielding a valid coordinate wins; adapter errors
/// count as no coordinate.
fn resolve_pointer(
    engines: &EngineRegistry,
    catalog: &dyn LayerCatalog,
    pixel_for: impl Fn(&dyn MapEngine) -> Option<Pixel>,
) -> PointerState {
    for engine in engines.iter_active() {
        let Some(pixel) = pixel_for(engine) else {
            continue;
        };
        let coord = match engine.lat_lon_from_pixel(pixel) {
            Ok(c) if c.is_valid => c,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(backend = %engine.backend(), error = %e, "no coordinate from engine");
                continue;
            }
        };
        let data = join_features(catalog, engine.data_at_point(&coord, pixel));
        return valid_state(coord, pixel, data);
    }
    PointerState::default()
}

fn valid_state(coord: GeoCoordinate, pixel: Pixel, data: Vec<JoinedFeature>) -> PointerState {
    PointerState {
        is_valid: true,
        lat: coord.lat,
        lon: coord.lon,
        x: pixel.x,
        y: pixel.y,
        show_data: !data.is_empty(),
        data,
    }
}

fn join_features(catalog: &dyn LayerCatalog, picked: Vec<PickedFeature>) -> Vec<JoinedFeature> {
    picked
        .into_iter()
        .filter_map(|f| {
            let Some(layer) = catalog.resolve_layer_by_id(f.layer_id.as_str()) else {
                tracing::debug!(layer = %f.layer_id, "picked feature from unknown layer dropped");
                return None;
            };
            Some(JoinedFeature {
                layer: layer.clone(),
                properties: f.properties,
                coords: f.coords,
            })
        })
        .collect()
}

pub fn on_pointer_hover(mut state: MapState, pixel: Pixel) -> MapState {
    state.view.pixel_hover = resolve_pointer(&state.engines, &state.catalog, |_| Some(pixel));
    state
}

/// Like hover, and a click on a feature also moves the map date to the feature's time.
pub fn on_pointer_click(mut state: MapState, click: ClickEvent) -> MapState {
    let pointer = resolve_pointer(&state.engines, &state.catalog, |engine| {
        engine.pixel_from_click(&click)
    });

    let clicked_time = pointer.data.first().and_then(|feature| {
        let format = feature.layer.time_format.as_deref();
        let time = feature_time(&feature.properties, format);
        if time.is_none() {
            tracing::warn!(
                layer = %feature.layer.id,
                value = ?feature.properties.get(TIME_FIELD),
                format = ?format,
                "clicked feature time does not parse"
            );
        }
        time
    });

    state.view.pixel_click = pointer;
    match clicked_time {
        Some(date) => set_map_date(state, date),
        None => state,
    }
}
