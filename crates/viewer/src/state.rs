use catalog::InMemoryLayerCatalog;
use chrono::{DateTime, Utc};
use engine::EngineRegistry;
use serde::Serialize;

use crate::alerts::Alert;
use crate::pointer::PointerState;

/// View slice: pointer states and the global map date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub pixel_hover: PointerState,
    pub pixel_click: PointerState,
    pub date: DateTime<Utc>,
}

/// Everything the map reducers read and write.
#[derive(Debug)]
pub struct MapState {
    pub engines: EngineRegistry,
    pub catalog: InMemoryLayerCatalog,
    pub view: ViewState,
    pub alerts: Vec<Alert>,
}

impl MapState {
    pub fn new(engines: EngineRegistry, catalog: InMemoryLayerCatalog, date: DateTime<Utc>) -> Self {
        Self {
            engines,
            catalog,
            view: ViewState {
                pixel_hover: PointerState::default(),
                pixel_click: PointerState::default(),
                date,
            },
            alerts: Vec::new(),
        }
    }
}
