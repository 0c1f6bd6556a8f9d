//! Storm-track classification and the point markers derived from it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use foundation::time::{TimeWindow, parse_iso8601, parse_moment};
use scene::components::{MarkerRing, PointMarker};
use serde::Serialize;
use serde_json::Value;

use crate::layer::{LayerDescriptor, VectorStyleMode};

/// Saffir-Simpson tiers, weakest first.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StormCategory {
    TropicalDepression,
    TropicalStorm,
    Category1,
    Category2,
    Category3,
    Category4,
    Category5,
}

/// Injected into the engine adapters; [`classify`] is the production value.
pub type Classifier = fn(f64) -> StormCategory;

/// Classify a sustained wind intensity in knots.
///
/// Upper bounds are inclusive: 33 is a depression, 34 a storm, 136 a
/// category 4, 137 a category 5. NaN is a depression.
pub fn classify(intensity: f64) -> StormCategory {
    if !(intensity > 33.0) {
        StormCategory::TropicalDepression
    } else if intensity <= 63.0 {
        StormCategory::TropicalStorm
    } else if intensity <= 82.0 {
        StormCategory::Category1
    } else if intensity <= 95.0 {
        StormCategory::Category2
    } else if intensity <= 112.0 {
        StormCategory::Category3
    } else if intensity <= 136.0 {
        StormCategory::Category4
    } else {
        StormCategory::Category5
    }
}

impl StormCategory {
    pub const ALL: [StormCategory; 7] = [
        StormCategory::TropicalDepression,
        StormCategory::TropicalStorm,
        StormCategory::Category1,
        StormCategory::Category2,
        StormCategory::Category3,
        StormCategory::Category4,
        StormCategory::Category5,
    ];

    pub fn color(&self) -> &'static str {
        match self {
            StormCategory::TropicalDepression => "#1976d2",
            StormCategory::TropicalStorm => "#26c6da",
            StormCategory::Category1 => "#ffee58",
            StormCategory::Category2 => "#ffca28",
            StormCategory::Category3 => "#ffb300",
            StormCategory::Category4 => "#fb8c00",
            StormCategory::Category5 => "#e53935",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StormCategory::TropicalDepression => "Tropical Depression",
            StormCategory::TropicalStorm => "Tropical Storm",
            StormCategory::Category1 => "Category 1 Hurricane",
            StormCategory::Category2 => "Category 2 Hurricane",
            StormCategory::Category3 => "Category 3 Hurricane",
            StormCategory::Category4 => "Category 4 Hurricane",
            StormCategory::Category5 => "Category 5 Hurricane",
        }
    }

    /// The two strongest tiers need light text on their marker color.
    pub fn light_text(&self) -> bool {
        matches!(self, StormCategory::Category4 | StormCategory::Category5)
    }

    pub fn text_color(&self) -> &'static str {
        if self.light_text() { "#ffffff" } else { "#000000" }
    }

    pub fn rgba(&self) -> [u8; 4] {
        hex_to_rgba(self.color())
    }
}

impl fmt::Display for StormCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn hex_to_rgba(hex: &str) -> [u8; 4] {
    let h = hex.trim_start_matches('#');
    let channel = |i: usize| {
        h.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
            .unwrap_or(0)
    };
    [channel(0), channel(2), channel(4), 255]
}

const HALO: [u8; 4] = [255, 255, 255, 90];
const OUTLINE: [u8; 4] = [33, 33, 33, 200];
const DEFAULT_POINT: [u8; 4] = [3, 169, 244, 255];

/// Halo, dark outline, category-colored core.
pub fn storm_marker(category: StormCategory) -> PointMarker {
    PointMarker::new(vec![
        MarkerRing::new(11.0, HALO),
        MarkerRing::new(7.0, OUTLINE),
        MarkerRing::new(5.5, category.rgba()),
    ])
}

pub const INTENSITY_FIELD: &str = "intensity";
pub const TIME_FIELD: &str = "dtg";
pub const PRESSURE_FIELD: &str = "minSeaLevelPres";

/// Numeric property; numeric strings are accepted too.
pub fn property_f64(properties: &BTreeMap<String, Value>, key: &str) -> Option<f64> {
    match properties.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a feature timestamp with the layer's time format, ISO 8601 when none is set.
pub fn feature_time(
    properties: &BTreeMap<String, Value>,
    time_format: Option<&str>,
) -> Option<DateTime<Utc>> {
    let raw = properties.get(TIME_FIELD)?.as_str()?;
    match time_format {
        Some(fmt) => parse_moment(raw, fmt).ok(),
        None => parse_iso8601(raw).ok(),
    }
}

/// Per-feature style resolution for a vector layer.
#[derive(Debug, Clone)]
pub struct FeatureStyler {
    mode: VectorStyleMode,
    classifier: Classifier,
    window: Option<TimeWindow>,
    time_format: Option<String>,
}

impl FeatureStyler {
    /// Style for `layer`, or `None` when the layer does not ask for a styling mode.
    ///
    /// Storm layers with a displayed time only show the day starting at that time.
    pub fn for_layer(layer: &LayerDescriptor, classifier: Classifier) -> Option<Self> {
        let mode = layer.vector_style?;
        Some(Self {
            mode,
            classifier,
            window: layer.time.map(TimeWindow::one_day),
            time_format: layer.time_format.clone(),
        })
    }

    pub fn window(&self) -> Option<TimeWindow> {
        self.window
    }

    /// Marker for a feature, or `None` when the feature should be hidden.
    pub fn style(&self, properties: &BTreeMap<String, Value>) -> Option<PointMarker> {
        match self.mode {
            VectorStyleMode::Storm => {
                if let Some(window) = self.window {
                    let t = feature_time(properties, self.time_format.as_deref())?;
                    if !window.contains(t) {
                        return None;
                    }
                }
                let intensity = property_f64(properties, INTENSITY_FIELD).unwrap_or(f64::NAN);
                Some(storm_marker((self.classifier)(intensity)))
            }
        }
    }
}

/// Marker for point features of layers without a styling mode.
pub fn default_point_marker() -> PointMarker {
    PointMarker::new(vec![
        MarkerRing::new(6.0, HALO),
        MarkerRing::new(4.0, DEFAULT_POINT),
    ])
}

#[cfg(test)]
mod tests {
    use super::{FeatureStyler, StormCategory, classify, storm_marker};
    use crate::layer::{Handling, LayerDescriptor, VectorStyleMode};
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn assert_tier(values: &[f64], want: StormCategory) {
        for v in values {
            assert_eq!(classify(*v), want, "intensity {v}");
        }
    }

    #[test]
    fn documented_boundaries() {
        assert_tier(&[0.0, 15.0, 32.0, 33.0], StormCategory::TropicalDepression);
        assert_tier(&[34.0, 50.0, 62.0, 63.0], StormCategory::TropicalStorm);
        assert_tier(&[64.0, 70.0, 81.0, 82.0], StormCategory::Category1);
        assert_tier(&[83.0, 88.0, 94.0, 95.0], StormCategory::Category2);
        assert_tier(&[96.0, 100.0, 111.0, 112.0], StormCategory::Category3);
        assert_tier(&[113.0, 120.0, 135.0, 136.0], StormCategory::Category4);
        assert_tier(&[137.0, 140.0, 150.0, 200.0], StormCategory::Category5);
    }

    #[test]
    fn classification_is_monotonic_and_total() {
        let mut prev = classify(0.0);
        for knots in 0..=1000 {
            let c = classify(knots as f64);
            assert!(c >= prev, "tier dropped at {knots}");
            prev = c;
        }
        assert_eq!(prev, StormCategory::Category5);
        // Fractional values between integer tiers fall upward.
        assert_eq!(classify(33.5), StormCategory::TropicalStorm);
        assert_eq!(classify(136.2), StormCategory::Category5);
        assert_eq!(classify(-5.0), StormCategory::TropicalDepression);
        assert_eq!(classify(f64::NAN), StormCategory::TropicalDepression);
        assert_eq!(classify(f64::INFINITY), StormCategory::Category5);
    }

    #[test]
    fn only_top_tiers_use_light_text() {
        let light: Vec<StormCategory> = StormCategory::ALL
            .into_iter()
            .filter(|c| c.light_text())
            .collect();
        assert_eq!(light, vec![StormCategory::Category4, StormCategory::Category5]);
        assert_eq!(StormCategory::Category5.text_color(), "#ffffff");
        assert_eq!(StormCategory::Category1.text_color(), "#000000");
    }

    #[test]
    fn marker_core_carries_category_color() {
        let m = storm_marker(StormCategory::Category5);
        assert_eq!(m.rings.len(), 3);
        assert_eq!(m.rings[2].color, [0xe5, 0x39, 0x35, 255]);
        assert_eq!(m.radius_px(), 11.0);
    }

    fn storm_layer() -> LayerDescriptor {
        let mut layer = LayerDescriptor::new("irma", Handling::VectorGeojson);
        layer.vector_style = Some(VectorStyleMode::Storm);
        layer.time_format = Some("YYYY-MM-DD HHmm".to_string());
        layer
    }

    fn props(dtg: &str, intensity: f64) -> BTreeMap<String, serde_json::Value> {
        let mut p = BTreeMap::new();
        p.insert("dtg".to_string(), json!(dtg));
        p.insert("intensity".to_string(), json!(intensity));
        p
    }

    #[test]
    fn styler_only_for_styled_layers() {
        let plain = LayerDescriptor::new("plain", Handling::VectorGeojson);
        assert!(FeatureStyler::for_layer(&plain, classify).is_none());
        assert!(FeatureStyler::for_layer(&storm_layer(), classify).is_some());
    }

    #[test]
    fn windowed_styler_hides_features_outside_the_day() {
        let mut layer = storm_layer();
        let anchor = Utc.with_ymd_and_hms(2017, 8, 10, 0, 0, 0).unwrap();
        layer.time = Some(anchor);
        let styler = FeatureStyler::for_layer(&layer, classify).expect("styler");
        assert_eq!(styler.window().map(|w| w.end), Some(anchor + Duration::days(1)));

        assert!(styler.style(&props("2017-08-10 0000", 40.0)).is_some());
        assert!(styler.style(&props("2017-08-10 2359", 40.0)).is_some());
        assert!(styler.style(&props("2017-08-11 0000", 40.0)).is_none());
        assert!(styler.style(&props("2017-08-09 2359", 40.0)).is_none());
        assert!(styler.style(&props("garbage", 40.0)).is_none());
    }

    #[test]
    fn unwindowed_styler_uses_injected_classifier() {
        fn always_cat5(_: f64) -> StormCategory {
            StormCategory::Category5
        }
        let styler = FeatureStyler::for_layer(&storm_layer(), always_cat5).expect("styler");
        let marker = styler.style(&props("not a time", 10.0)).expect("shown");
        assert_eq!(marker, storm_marker(StormCategory::Category5));
    }
}
