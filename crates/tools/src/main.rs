use std::path::{Path, PathBuf};
use std::rc::Rc;

use catalog::{InMemoryLayerCatalog, LayerCatalog};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use engine::globe::GlobeEngine;
use engine::planar::PlanarEngine;
use engine::{ClickEvent, EngineRegistry, MapEngine, Pixel};
use foundation::time::parse_iso8601;
use layers::Backend;
use layers::symbology::classify;
use layers::vector::{FeatureLoader, GeoJsonFileLoader};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;
use viewer::{
    MapState, ViewerConfig, on_pointer_click, on_pointer_hover, set_map_date, zoom_to_layer,
};

const TICK_S: f64 = 0.05;

#[derive(Parser, Debug)]
#[command(author, version, about = "Storm map engine tools")]
struct Args {
    /// Deployment config (JSON); overrides ATLAS_CONFIG
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BackendArg {
    #[value(name = "2d")]
    Planar,
    #[value(name = "3d")]
    Globe,
}

impl From<BackendArg> for Backend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Planar => Backend::Planar,
            BackendArg::Globe => Backend::Globe,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the storm category for wind speeds in knots
    Classify {
        #[arg(required = true, allow_negative_numbers = true)]
        knots: Vec<f64>,
    },

    /// List catalog layers in display order
    Layers {
        /// Layer catalog (JSON)
        #[arg(long)]
        layers: Option<PathBuf>,
    },

    /// Hover or click a pixel and print the resulting pointer state
    Probe {
        /// Layer catalog (JSON)
        #[arg(long)]
        layers: Option<PathBuf>,

        /// Directory vector layer URLs resolve against
        #[arg(long)]
        data: Option<PathBuf>,

        /// Engine answering the probe; the other one is registered inactive
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,

        /// Map date (ISO 8601)
        #[arg(long)]
        date: Option<String>,

        /// Zoom to this layer before probing
        #[arg(long)]
        zoom: Option<String>,

        /// Click instead of hover
        #[arg(long)]
        click: bool,

        x: f64,
        y: f64,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = ViewerConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Classify { knots } => {
            for kt in knots {
                let category = classify(kt);
                println!("{kt}\t{}\t{}", category.label(), category.color());
            }
        }
        Command::Layers { layers } => {
            let catalog = load_catalog(layers.as_deref(), &config)?;
            for layer in catalog.layers() {
                println!(
                    "{}\t{}\t{:?}\t{}",
                    layer.id,
                    layer.title,
                    layer.handling,
                    if layer.is_active { "active" } else { "inactive" }
                );
            }
        }
        Command::Probe {
            layers,
            data,
            backend,
            date,
            zoom,
            click,
            x,
            y,
        } => {
            let layers_path = layers.or_else(|| config.layer_config.clone());
            let catalog = load_catalog(layers_path.as_deref(), &config)?;
            let data_root = data
                .or_else(|| config.data_root.clone())
                .or_else(|| layers_path.as_deref().and_then(Path::parent).map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."));
            let backend = backend.map(Backend::from).unwrap_or(config.initial_backend);
            let date = match date.or_else(|| config.start_date.map(|d| d.to_rfc3339())) {
                Some(raw) => parse_iso8601(&raw)?,
                None => Utc::now(),
            };

            let engines = build_engines(&config, &catalog, &data_root, backend)?;
            let mut state = set_map_date(MapState::new(engines, catalog, date), date);

            if let Some(id) = zoom {
                state = zoom_to_layer(state, id.into());
                settle(&mut state, config.transition_seconds);
            }

            state = if click {
                on_pointer_click(state, ClickEvent::new(x, y))
            } else {
                on_pointer_hover(state, Pixel::new(x, y))
            };

            let pointer = if click {
                &state.view.pixel_click
            } else {
                &state.view.pixel_hover
            };
            let readouts: Vec<_> = pointer
                .data
                .iter()
                .filter(|f| f.layer.is_storm())
                .map(|f| f.storm_readout())
                .collect();
            let extent = state
                .engines
                .get(backend)
                .and_then(|e| e.get_extent().ok())
                .map(|e| e.as_array());
            let out = json!({
                "backend": backend,
                "date": state.view.date,
                "extent": extent,
                "pointer": pointer,
                "storms": readouts,
                "alerts": state.alerts,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

fn load_catalog(
    path: Option<&Path>,
    config: &ViewerConfig,
) -> Result<InMemoryLayerCatalog, Box<dyn std::error::Error>> {
    let path = path
        .or(config.layer_config.as_deref())
        .ok_or("no layer catalog: pass --layers or set layerConfig")?;
    let catalog = InMemoryLayerCatalog::from_path(path)?;
    info!(path = %path.display(), layers = catalog.len(), "catalog loaded");
    Ok(catalog)
}

fn build_engines(
    config: &ViewerConfig,
    catalog: &InMemoryLayerCatalog,
    data_root: &Path,
    active: Backend,
) -> Result<EngineRegistry, Box<dyn std::error::Error>> {
    let loader: Rc<dyn FeatureLoader> = Rc::new(GeoJsonFileLoader::new(data_root));
    let defaults = config.engine_defaults();
    let viewport = config.viewport();

    let mut engines = EngineRegistry::new();
    engines.register(Box::new(PlanarEngine::new(
        config.default_projection,
        viewport,
        loader.clone(),
        defaults,
    )));
    engines.register(Box::new(GlobeEngine::new(viewport, loader, defaults)));

    for engine in engines.iter_mut() {
        let is_active = engine.backend() == active;
        engine.set_active(is_active);
        engine.set_extent(config.default_map_extent)?;
        for layer in catalog.layers().into_iter().filter(|l| l.is_active) {
            if let Err(e) = engine.add_layer(layer, true) {
                tracing::warn!(backend = %engine.backend(), layer = %layer.id, error = %e, "layer not added");
            }
        }
        let loaded = engine.resolve_pending_loads();
        info!(backend = %engine.backend(), loaded, "engine ready");
    }
    Ok(engines)
}

/// Run view transitions to completion.
fn settle(state: &mut MapState, transition_s: f64) {
    let steps = (transition_s.max(0.0) / TICK_S).ceil() as usize + 1;
    for _ in 0..steps {
        for engine in state.engines.iter_mut() {
            engine.tick(TICK_S);
        }
    }
}
