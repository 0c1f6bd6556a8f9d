//! Reducers driving the planar and globe engines together.

use std::rc::Rc;

use catalog::{InMemoryLayerCatalog, LayerCatalog};
use chrono::{TimeZone, Utc};
use engine::globe::GlobeEngine;
use engine::planar::PlanarEngine;
use engine::{ClickEvent, EngineDefaults, EngineRegistry, MapEngine, Pixel, Viewport};
use foundation::math::Projection;
use layers::symbology::StormCategory;
use layers::vector::{Feature, Properties, StaticFeatureLoader};
use layers::{Backend, LayerDescriptor};
use pretty_assertions::assert_eq;
use serde_json::json;
use viewer::{MapState, on_pointer_click, on_pointer_hover, set_map_date, zoom_to_layer};

const CATALOG: &str = r#"{
  "layers": [
    {
      "id": "irma",
      "title": "Hurricane Irma",
      "handling": "vector_geojson",
      "urls": ["irma.json"],
      "vectorStyle": "storm",
      "timeFormat": "YYYY-MM-DD HHmm",
      "isActive": true,
      "displayIndex": 3
    },
    {
      "id": "blue-marble",
      "title": "Blue Marble",
      "type": "basemap",
      "handling": "wmts",
      "urls": ["https://tiles.example.org/bm/{z}/{x}/{y}.jpg"],
      "isActive": true
    }
  ]
}"#;

fn track_point(lon: f64, lat: f64, dtg: &str, intensity: f64) -> Feature {
    let mut props = Properties::new();
    props.insert("dtg".to_string(), json!(dtg));
    props.insert("intensity".to_string(), json!(intensity));
    props.insert("minSeaLevelPres".to_string(), json!(920));
    Feature::point(lon, lat, props)
}

fn loader() -> Rc<StaticFeatureLoader> {
    Rc::new(StaticFeatureLoader::new().with(
        "irma.json",
        vec![
            track_point(-60.0, 17.0, "2017-09-05 1200", 150.0),
            track_point(-64.5, 18.2, "2017-09-06 1200", 155.0),
        ],
    ))
}

fn layer(catalog: &InMemoryLayerCatalog, id: &str) -> LayerDescriptor {
    catalog
        .resolve_layer_by_id(id)
        .cloned()
        .expect("layer in catalog")
}

/// Planar engine centred near the track, plus the pixels of both track points.
fn planar(catalog: &InMemoryLayerCatalog) -> (PlanarEngine, Pixel, Pixel) {
    let mut engine = PlanarEngine::new(
        Projection::Epsg4326,
        Viewport::new(800.0, 600.0),
        loader(),
        EngineDefaults::default(),
    );
    engine.set_view([-62.0, 17.5], 0.01);
    for l in catalog.layers() {
        engine.add_layer(l, false).expect("add");
    }
    assert_eq!(engine.resolve_pending_loads(), 1);
    let early = engine.pixel_from_lon_lat(-60.0, 17.0).expect("project");
    let late = engine.pixel_from_lon_lat(-64.5, 18.2).expect("project");
    (engine, early, late)
}

fn globe(catalog: &InMemoryLayerCatalog) -> GlobeEngine {
    let mut engine = GlobeEngine::new(
        Viewport::new(800.0, 600.0),
        loader(),
        EngineDefaults::default(),
    );
    engine.set_camera(-64.5, 18.2, 2_000_000.0);
    for l in catalog.layers() {
        engine.add_layer(l, false).expect("add");
    }
    assert_eq!(engine.resolve_pending_loads(), 1);
    engine
}

fn start_date() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 9, 1, 0, 0, 0).unwrap()
}

#[test]
fn hover_and_click_on_planar_track() {
    let catalog = InMemoryLayerCatalog::from_json_str(CATALOG).expect("catalog");
    let (planar, early, late) = planar(&catalog);
    let mut engines = EngineRegistry::new();
    engines.register(Box::new(planar));
    let state = MapState::new(engines, catalog, start_date());

    let state = on_pointer_hover(state, late);
    let hover = &state.view.pixel_hover;
    assert!(hover.is_valid);
    assert!((hover.lon - -64.5).abs() < 1e-9 && (hover.lat - 18.2).abs() < 1e-9);
    assert_eq!(hover.data.len(), 1);
    let readout = hover.data[0].storm_readout();
    assert_eq!(readout.title, "Hurricane Irma");
    assert_eq!(readout.category, StormCategory::Category5);
    assert_eq!(readout.time.as_deref(), Some("Sep 06, 12:00 UTC"));

    let state = on_pointer_click(state, ClickEvent::new(late.x, late.y));
    assert_eq!(state.view.date, Utc.with_ymd_and_hms(2017, 9, 6, 12, 0, 0).unwrap());
    assert_eq!(layer(&state.catalog, "irma").time, Some(state.view.date));

    // The earlier track point falls outside the new one-day window.
    let state = on_pointer_hover(state, early);
    assert!(state.view.pixel_hover.is_valid);
    assert!(state.view.pixel_hover.data.is_empty());
    let state = on_pointer_hover(state, late);
    assert_eq!(state.view.pixel_hover.data.len(), 1);
}

#[test]
fn globe_answers_when_planar_is_inactive() {
    let catalog = InMemoryLayerCatalog::from_json_str(CATALOG).expect("catalog");
    let (planar, _, _) = planar(&catalog);
    let mut engines = EngineRegistry::new();
    engines.register(Box::new(planar));
    engines.register(Box::new(globe(&catalog)));
    assert!(engines.set_active(Backend::Planar, false));
    let state = MapState::new(engines, catalog, start_date());

    let state = on_pointer_hover(state, Pixel::new(400.0, 300.0));
    let hover = &state.view.pixel_hover;
    assert!(hover.is_valid);
    assert!((hover.lon - -64.5).abs() < 1e-6);
    assert_eq!(hover.data.len(), 1);
    assert_eq!(hover.data[0].layer.id.as_str(), "irma");

    // Off the track but still on the globe.
    let state = on_pointer_hover(state, Pixel::new(20.0, 20.0));
    assert!(state.view.pixel_hover.is_valid);
    assert!(state.view.pixel_hover.data.is_empty());
}

#[test]
fn both_engines_agree_on_the_topmost_feature() {
    let catalog = InMemoryLayerCatalog::from_json_str(
        r#"{
          "layers": [
            {"id": "lower", "title": "Lower", "handling": "vector_geojson",
             "urls": ["lower.json"], "vectorStyle": "storm", "displayIndex": 1, "isActive": true},
            {"id": "upper", "title": "Upper", "handling": "vector_geojson",
             "urls": ["upper.json"], "vectorStyle": "storm", "displayIndex": 2, "isActive": true}
          ]
        }"#,
    )
    .expect("catalog");
    let loader = Rc::new(
        StaticFeatureLoader::new()
            .with(
                "lower.json",
                vec![
                    track_point(-64.5, 18.2, "2017-09-06 1200", 40.0),
                    track_point(-64.5, 18.2, "2017-09-06 1200", 50.0),
                ],
            )
            .with(
                "upper.json",
                vec![
                    track_point(-64.5, 18.2, "2017-09-06 1200", 140.0),
                    track_point(-64.5, 18.2, "2017-09-06 1200", 150.0),
                ],
            ),
    );

    let mut planar = PlanarEngine::new(
        Projection::Epsg4326,
        Viewport::new(800.0, 600.0),
        loader.clone(),
        EngineDefaults::default(),
    );
    planar.set_view([-64.5, 18.2], 0.01);
    let mut globe = GlobeEngine::new(Viewport::new(800.0, 600.0), loader, EngineDefaults::default());
    globe.set_camera(-64.5, 18.2, 2_000_000.0);
    // Lower layer registered first so insertion order cannot mask display order.
    for id in ["lower", "upper"] {
        let l = layer(&catalog, id);
        planar.add_layer(&l, false).expect("add");
        globe.add_layer(&l, false).expect("add");
    }
    assert_eq!(planar.resolve_pending_loads(), 2);
    assert_eq!(globe.resolve_pending_loads(), 2);

    let centre = Pixel::new(400.0, 300.0);
    let on_planar = planar.data_at_point(&planar.lat_lon_from_pixel(centre).expect("converts"), centre);
    let on_globe = globe.data_at_point(&globe.lat_lon_from_pixel(centre).expect("converts"), centre);
    assert_eq!(on_planar.len(), 1);
    assert_eq!(on_globe.len(), 1);
    assert_eq!(on_planar[0].layer_id.as_str(), "upper");
    assert_eq!(on_globe[0].layer_id, on_planar[0].layer_id);
    assert_eq!(on_globe[0].properties, on_planar[0].properties);
    assert_eq!(on_globe[0].properties["intensity"], json!(150.0));
}

#[test]
fn map_date_hides_track_on_both_engines() {
    let catalog = InMemoryLayerCatalog::from_json_str(CATALOG).expect("catalog");
    let (planar, _, late) = planar(&catalog);
    let mut engines = EngineRegistry::new();
    engines.register(Box::new(planar));
    engines.register(Box::new(globe(&catalog)));
    let state = MapState::new(engines, catalog, start_date());

    let state = set_map_date(state, Utc.with_ymd_and_hms(2017, 9, 10, 0, 0, 0).unwrap());
    let state = on_pointer_hover(state, late);
    assert!(state.view.pixel_hover.is_valid);
    assert!(state.view.pixel_hover.data.is_empty());

    let mut engines = state.engines;
    engines.set_active(Backend::Planar, false);
    let state = MapState::new(engines, state.catalog, state.view.date);
    let state = on_pointer_hover(state, Pixel::new(400.0, 300.0));
    assert!(state.view.pixel_hover.is_valid);
    assert!(state.view.pixel_hover.data.is_empty());
}

#[test]
fn zoom_frames_the_track_on_every_active_engine() {
    let catalog = InMemoryLayerCatalog::from_json_str(CATALOG).expect("catalog");
    let (planar, _, _) = planar(&catalog);
    let mut engines = EngineRegistry::new();
    engines.register(Box::new(planar));
    engines.register(Box::new(globe(&catalog)));
    let state = MapState::new(engines, catalog, start_date());

    let mut state = zoom_to_layer(state, "irma".into());
    assert!(state.alerts.is_empty());
    for _ in 0..12 {
        for engine in state.engines.iter_mut() {
            engine.tick(0.1);
        }
    }

    for backend in [Backend::Planar, Backend::Globe] {
        let visible = state
            .engines
            .get(backend)
            .expect("registered")
            .get_extent()
            .expect("extent");
        assert!(visible.contains(-64.5, 18.2), "{backend}: {visible:?}");
        assert!(visible.contains(-60.0, 17.0), "{backend}: {visible:?}");
    }
}

#[test]
fn zoom_to_unknown_layer_leaves_engines_alone() {
    let catalog = InMemoryLayerCatalog::from_json_str(CATALOG).expect("catalog");
    let (planar, _, _) = planar(&catalog);
    let before = *planar.view();
    let mut engines = EngineRegistry::new();
    engines.register(Box::new(planar));
    let state = MapState::new(engines, catalog, start_date());

    let state = zoom_to_layer(state, "harvey".into());
    assert_eq!(state.alerts.len(), 1);
    assert_eq!(state.alerts[0].body, "Unable to find layer harvey.");
    let after = state.engines.get(Backend::Planar).expect("registered").get_extent();
    assert_eq!(after.ok(), Some(before.extent()));
}
