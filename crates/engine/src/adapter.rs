use foundation::bounds::Extent;
use layers::symbology::FeatureStyler;
use layers::vector::Properties;
use layers::{Backend, LayerDescriptor, LayerId};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Screen position in pixels, origin at the viewport's top-left corner.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

impl Pixel {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Pixel) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Result of converting a pixel to the reference projection.
///
/// `is_valid` is independent of conversion success: a pixel outside the
/// drawable world converts fine but is not a usable coordinate.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoCoordinate {
    pub lat: f64,
    pub lon: f64,
    pub is_valid: bool,
}

impl GeoCoordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            is_valid: lon.is_finite() && (-90.0..=90.0).contains(&lat),
        }
    }

    pub fn invalid() -> Self {
        Self::default()
    }
}

/// Raw pointer click in page (client) coordinates.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClickEvent {
    pub client_x: f64,
    pub client_y: f64,
}

impl ClickEvent {
    pub fn new(client_x: f64, client_y: f64) -> Self {
        Self { client_x, client_y }
    }
}

/// Where an engine's canvas sits on the page and how large it is.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub origin: Pixel,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            origin: Pixel::default(),
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    pub fn with_origin(mut self, origin: Pixel) -> Self {
        self.origin = origin;
        self
    }

    pub fn center(&self) -> Pixel {
        Pixel::new(self.width * 0.5, self.height * 0.5)
    }

    pub fn contains(&self, pixel: Pixel) -> bool {
        pixel.x >= 0.0 && pixel.y >= 0.0 && pixel.x < self.width && pixel.y < self.height
    }

    /// Viewport pixel for a click, `None` when it landed outside the canvas.
    pub fn pixel_from_client(&self, click: &ClickEvent) -> Option<Pixel> {
        let pixel = Pixel::new(click.client_x - self.origin.x, click.client_y - self.origin.y);
        self.contains(pixel).then_some(pixel)
    }

    /// Pixels spaced along the viewport border, corners included.
    pub fn border_samples(&self, per_edge: usize) -> Vec<Pixel> {
        let n = per_edge.max(2);
        let (w, h) = (self.width, self.height);
        let mut out = Vec::with_capacity(n * 4);
        for i in 0..n {
            let f = i as f64 / (n - 1) as f64;
            out.push(Pixel::new(f * w, 0.0));
            out.push(Pixel::new(f * w, h));
            out.push(Pixel::new(0.0, f * h));
            out.push(Pixel::new(w, f * h));
        }
        out
    }
}

/// A data feature found under the pointer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PickedFeature {
    pub layer_id: LayerId,
    pub properties: Properties,
    /// `[lon, lat]` in degrees.
    pub coords: [f64; 2],
}

/// Uniform capability set over one rendering backend.
///
/// Failures are logged by the adapter and returned as [`EngineError`](crate::EngineError);
/// no operation panics on bad input.
pub trait MapEngine {
    fn backend(&self) -> Backend;

    fn is_active(&self) -> bool;

    fn set_active(&mut self, active: bool);

    fn has_layer(&self, id: &LayerId) -> bool;

    /// Animate the view to frame the layer's extent, or its data extent when
    /// the descriptor carries none.
    fn zoom_to_layer(&mut self, layer: &LayerDescriptor) -> EngineResult<()>;

    /// Frame a lon/lat extent immediately.
    fn set_extent(&mut self, extent: Extent) -> EngineResult<()>;

    /// Visible area in lon/lat.
    fn get_extent(&self) -> EngineResult<Extent>;

    fn lat_lon_from_pixel(&self, pixel: Pixel) -> EngineResult<GeoCoordinate>;

    fn pixel_from_click(&self, click: &ClickEvent) -> Option<Pixel>;

    /// At most one feature; empty when nothing pickable is under `pixel`.
    fn data_at_point(&self, coord: &GeoCoordinate, pixel: Pixel) -> Vec<PickedFeature>;

    fn add_layer(&mut self, layer: &LayerDescriptor, from_cache: bool) -> EngineResult<()>;

    fn remove_layer(&mut self, id: &LayerId) -> EngineResult<()>;

    fn create_vector_layer_style(&self, layer: &LayerDescriptor) -> Option<FeatureStyler>;

    /// Apply opacity, active flag and time-windowed styling from `layer`.
    fn update_layer(&mut self, layer: &LayerDescriptor) -> EngineResult<()>;

    /// Complete queued feature loads. Returns how many layers were populated.
    fn resolve_pending_loads(&mut self) -> usize;

    /// Advance view transitions by `dt_s` seconds.
    fn tick(&mut self, dt_s: f64);
}
