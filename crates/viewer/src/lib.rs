//! Application map state and the reducers that drive the map engines from it.

pub mod alerts;
pub mod config;
pub mod date;
pub mod pointer;
mod state;
pub mod zoom;

pub use alerts::{Alert, Severity, add_alert, dismiss_alert, dismiss_all_alerts};
pub use config::{ConfigError, ViewerConfig};
pub use date::set_map_date;
pub use pointer::{JoinedFeature, PointerState, StormReadout, on_pointer_click, on_pointer_hover};
pub use state::*;
pub use zoom::{LayerRef, zoom_to_layer};
