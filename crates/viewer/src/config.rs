//! Viewer configuration, resolved once at start-up.
//!
//! Layers, lowest precedence first: built-in defaults, the `ATLAS_CONFIG`
//! environment variable (a JSON object), then an optional deployment file.
//! Objects merge key by key; any other value replaces what was below it.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use engine::{EngineDefaults, Viewport};
use foundation::bounds::Extent;
use foundation::math::Projection;
use layers::Backend;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CONFIG_ENV: &str = "ATLAS_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerConfig {
    pub app_title: String,
    /// Native projection of the planar engine.
    pub default_projection: Projection,
    /// Lon/lat extent shown at start-up.
    pub default_map_extent: Extent,
    pub initial_backend: Backend,
    pub viewport_size: [f64; 2],
    pub transition_seconds: f64,
    /// Top, right, bottom, left.
    pub fit_padding: [f64; 4],
    pub pick_tolerance_px: f64,
    pub start_date: Option<DateTime<Utc>>,
    pub layer_config: Option<PathBuf>,
    pub data_root: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let engine = EngineDefaults::default();
        Self {
            app_title: "Atlas".to_string(),
            default_projection: Projection::Epsg4326,
            default_map_extent: Extent::WORLD,
            initial_backend: Backend::Planar,
            viewport_size: [1280.0, 720.0],
            transition_seconds: engine.transition_s,
            fit_padding: engine.fit_padding,
            pick_tolerance_px: engine.pick_tolerance_px,
            start_date: None,
            layer_config: None,
            data_root: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Env(String),
    Io { path: PathBuf, source: std::io::Error },
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Env(msg) => write!(f, "{CONFIG_ENV} is not a JSON object: {msg}"),
            ConfigError::Io { path, source } => write!(f, "read {}: {source}", path.display()),
            ConfigError::Parse(msg) => write!(f, "invalid viewer config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Deep-merge `overlay` into `base`.
pub fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn parse_object(text: &str) -> Result<Value, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err("expected a JSON object".to_string())
    }
}

impl ViewerConfig {
    /// Resolve from explicit layers; `env` is the raw `ATLAS_CONFIG` value.
    pub fn resolve(env: Option<&str>, deployment: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged =
            serde_json::to_value(Self::default()).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if let Some(raw) = env.filter(|s| !s.trim().is_empty()) {
            merge_json(&mut merged, parse_object(raw).map_err(ConfigError::Env)?);
        }

        if let Some(path) = deployment {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let overlay = parse_object(&text)
                .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
            merge_json(&mut merged, overlay);
        }

        let config: Self =
            serde_json::from_value(merged).map_err(|e| ConfigError::Parse(e.to_string()))?;
        tracing::debug!(?config, "viewer config resolved");
        Ok(config)
    }

    /// Resolve using the process environment.
    pub fn load(deployment: Option<&Path>) -> Result<Self, ConfigError> {
        let env = std::env::var(CONFIG_ENV).ok();
        Self::resolve(env.as_deref(), deployment)
    }

    pub fn engine_defaults(&self) -> EngineDefaults {
        EngineDefaults {
            transition_s: self.transition_seconds,
            fit_padding: self.fit_padding,
            pick_tolerance_px: self.pick_tolerance_px,
            ..EngineDefaults::default()
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.viewport_size[0], self.viewport_size[1])
    }
}
