//! Planar (2D) adapter: a projected view over an ordered stack of tile and vector layers.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use foundation::bounds::Extent;
use foundation::math::{Projection, transform, transform_extent, wrap_lon};
use layers::symbology::{FeatureStyler, default_point_marker};
use layers::vector::{Feature, FeatureLoader, Geometry, features_extent};
use layers::{Backend, LayerDescriptor, LayerId, LayerType};
use scene::components::PointMarker;

use crate::adapter::{ClickEvent, GeoCoordinate, MapEngine, PickedFeature, Pixel, Viewport};
use crate::defaults::EngineDefaults;
use crate::error::{EngineError, EngineResult};
use crate::transition::Transition;

/// Center and resolution are in the native projection's units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarView {
    pub center: [f64; 2],
    /// Native units per pixel.
    pub resolution: f64,
    pub projection: Projection,
    pub viewport: Viewport,
}

impl PlanarView {
    /// Whole world across the viewport width.
    pub fn new(projection: Projection, viewport: Viewport) -> Self {
        let world = projection.world_extent();
        Self {
            center: world.center(),
            resolution: world.width() / viewport.width,
            projection,
            viewport,
        }
    }

    pub fn pixel_to_native(&self, pixel: Pixel) -> [f64; 2] {
        let c = self.viewport.center();
        [
            self.center[0] + (pixel.x - c.x) * self.resolution,
            self.center[1] - (pixel.y - c.y) * self.resolution,
        ]
    }

    pub fn native_to_pixel(&self, coord: [f64; 2]) -> Pixel {
        let c = self.viewport.center();
        Pixel::new(
            c.x + (coord[0] - self.center[0]) / self.resolution,
            c.y - (coord[1] - self.center[1]) / self.resolution,
        )
    }

    /// Visible area in native units.
    pub fn extent(&self) -> Extent {
        let half_w = self.viewport.width * 0.5 * self.resolution;
        let half_h = self.viewport.height * 0.5 * self.resolution;
        Extent::new(
            self.center[0] - half_w,
            self.center[1] - half_h,
            self.center[0] + half_w,
            self.center[1] + half_h,
        )
    }

    /// Center and resolution that frame a native `extent` inside the padded
    /// viewport. Resolution is not snapped to zoom levels.
    pub fn fit(&self, extent: Extent, padding: [f64; 4]) -> Option<([f64; 2], f64)> {
        let [top, right, bottom, left] = padding;
        let (mut avail_w, mut avail_h) = (
            self.viewport.width - left - right,
            self.viewport.height - top - bottom,
        );
        let (mut off_x, mut off_y) = (left, top);
        if avail_w <= 0.0 || avail_h <= 0.0 {
            avail_w = self.viewport.width;
            avail_h = self.viewport.height;
            off_x = 0.0;
            off_y = 0.0;
        }

        let resolution = (extent.width() / avail_w)
            .max(extent.height() / avail_h)
            .max(min_resolution(self.projection));
        if !resolution.is_finite() {
            return None;
        }

        let target = extent.center();
        let vc = self.viewport.center();
        let padded_cx = off_x + avail_w * 0.5;
        let padded_cy = off_y + avail_h * 0.5;
        let center = [
            target[0] - (padded_cx - vc.x) * resolution,
            target[1] + (padded_cy - vc.y) * resolution,
        ];
        Some((center, resolution))
    }
}

fn min_resolution(projection: Projection) -> f64 {
    match projection {
        Projection::Epsg4326 => 1.0e-7,
        Projection::Epsg3857 => 0.01,
    }
}

/// One feature as drawn by the planar engine.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanarFeature {
    pub feature: Feature,
    /// Geometry positions in the native projection.
    pub native: Vec<[f64; 2]>,
    pub marker: Option<PointMarker>,
    pub visible: bool,
}

impl PlanarFeature {
    fn restyle(&mut self, styler: Option<&FeatureStyler>) {
        if !matches!(self.feature.geometry, Geometry::Point(_)) {
            self.marker = None;
            self.visible = true;
            return;
        }
        self.marker = match styler {
            Some(s) => s.style(&self.feature.properties),
            None => Some(default_point_marker()),
        };
        self.visible = self.marker.is_some();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSource {
    pub url: Option<String>,
    pub styler_active: bool,
    pub features: Vec<PlanarFeature>,
    /// False until the first load completes.
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanarSource {
    Tile { url: Option<String> },
    Vector(VectorSource),
}

/// Native planar layer.
#[derive(Debug, Clone)]
pub struct PlanarLayer {
    pub descriptor: LayerDescriptor,
    pub source: PlanarSource,
    pub visible: bool,
    pub opacity: f32,
    styler: Option<FeatureStyler>,
}

impl PlanarLayer {
    pub fn id(&self) -> &LayerId {
        &self.descriptor.id
    }

    /// Lon/lat extent of the loaded features.
    pub fn data_extent(&self) -> Option<Extent> {
        match &self.source {
            PlanarSource::Vector(v) => {
                let features: Vec<Feature> = v.features.iter().map(|f| f.feature.clone()).collect();
                features_extent(&features)
            }
            PlanarSource::Tile { .. } => None,
        }
    }

    pub fn feature_count(&self) -> usize {
        match &self.source {
            PlanarSource::Vector(v) => v.features.len(),
            PlanarSource::Tile { .. } => 0,
        }
    }

    fn restyle(&mut self) {
        if let PlanarSource::Vector(source) = &mut self.source {
            source.styler_active = self.styler.is_some();
            for f in &mut source.features {
                f.restyle(self.styler.as_ref());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingLoad {
    layer_id: LayerId,
    url: String,
}

pub struct PlanarEngine {
    view: PlanarView,
    layers: HashMap<LayerId, PlanarLayer>,
    /// Insertion order; draw order is display index, then this.
    order: Vec<LayerId>,
    pending: VecDeque<PendingLoad>,
    cache: HashMap<String, Vec<Feature>>,
    loader: Rc<dyn FeatureLoader>,
    defaults: EngineDefaults,
    transition: Option<Transition<3>>,
    active: bool,
}

impl PlanarEngine {
    pub fn new(
        projection: Projection,
        viewport: Viewport,
        loader: Rc<dyn FeatureLoader>,
        defaults: EngineDefaults,
    ) -> Self {
        Self {
            view: PlanarView::new(projection, viewport),
            layers: HashMap::new(),
            order: Vec::new(),
            pending: VecDeque::new(),
            cache: HashMap::new(),
            loader,
            defaults,
            transition: None,
            active: true,
        }
    }

    pub fn view(&self) -> &PlanarView {
        &self.view
    }

    pub fn set_view(&mut self, center: [f64; 2], resolution: f64) {
        self.transition = None;
        self.view.center = center;
        self.view.resolution = resolution;
    }

    pub fn layer(&self, id: &LayerId) -> Option<&PlanarLayer> {
        self.layers.get(id)
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    pub fn is_animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Pixel at which a lon/lat position is drawn.
    pub fn pixel_from_lon_lat(&self, lon: f64, lat: f64) -> EngineResult<Pixel> {
        let native = transform([lon, lat], Projection::Epsg4326, self.view.projection)?;
        Ok(self.view.native_to_pixel(native))
    }

    /// Native vector layer for `layer`. Never blocks on data: features come
    /// from the cache when allowed, otherwise a load is queued.
    pub fn create_vector_layer(
        &mut self,
        layer: &LayerDescriptor,
        from_cache: bool,
    ) -> EngineResult<PlanarLayer> {
        if !layer.handling.is_vector() {
            return Err(EngineError::Failed(format!(
                "layer {} is not a vector layer",
                layer.id
            )));
        }
        let styler = self.create_vector_layer_style(layer);
        let url = layer.resolve_url(Backend::Planar);
        let mut source = VectorSource {
            url: url.clone(),
            styler_active: styler.is_some(),
            features: Vec::new(),
            loaded: false,
        };

        match url {
            Some(url) => {
                if from_cache && let Some(cached) = self.cache.get(&url) {
                    source.features = project_features(cached, self.view.projection, styler.as_ref());
                    source.loaded = true;
                } else {
                    self.pending.push_back(PendingLoad {
                        layer_id: layer.id.clone(),
                        url,
                    });
                }
            }
            None => source.loaded = true,
        }

        Ok(PlanarLayer {
            descriptor: layer.clone(),
            source: PlanarSource::Vector(source),
            visible: true,
            opacity: layer.opacity,
            styler,
        })
    }

    fn stacked(&self) -> Vec<&PlanarLayer> {
        let mut out: Vec<&PlanarLayer> = self
            .order
            .iter()
            .filter_map(|id| self.layers.get(id))
            .collect();
        out.sort_by_key(|l| l.descriptor.display_index);
        out
    }

    /// Target view for a lon/lat extent.
    fn frame(&self, extent: Extent, padding: [f64; 4]) -> EngineResult<([f64; 2], f64)> {
        if !extent.is_valid() {
            return Err(EngineError::Failed(format!("invalid extent {:?}", extent.as_array())));
        }
        let native = transform_extent(extent, Projection::Epsg4326, self.view.projection)?;
        self.view
            .fit(native, padding)
            .ok_or_else(|| EngineError::Failed("extent cannot be framed".to_string()))
    }

    fn start_transition(&mut self, center: [f64; 2], resolution: f64) {
        let to = [center[0], center[1], resolution];
        if self.defaults.transition_s <= 0.0 {
            self.set_view(center, resolution);
            return;
        }
        let from = [self.view.center[0], self.view.center[1], self.view.resolution];
        self.transition = Some(Transition::new(from, to, self.defaults.transition_s));
    }
}

fn project_features(
    features: &[Feature],
    projection: Projection,
    styler: Option<&FeatureStyler>,
) -> Vec<PlanarFeature> {
    let mut out = Vec::with_capacity(features.len());
    for feature in features {
        let native: Result<Vec<[f64; 2]>, _> = feature
            .geometry
            .positions()
            .into_iter()
            .map(|p| transform(p, Projection::Epsg4326, projection))
            .collect();
        let native = match native {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(error = %e, id = ?feature.id, "feature outside projection skipped");
                continue;
            }
        };
        let mut drawn = PlanarFeature {
            feature: feature.clone(),
            native,
            marker: None,
            visible: true,
        };
        drawn.restyle(styler);
        out.push(drawn);
    }
    out
}

impl MapEngine for PlanarEngine {
    fn backend(&self) -> Backend {
        Backend::Planar
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn has_layer(&self, id: &LayerId) -> bool {
        self.layers.contains_key(id)
    }

    fn zoom_to_layer(&mut self, layer: &LayerDescriptor) -> EngineResult<()> {
        let Some(native) = self.layers.get(&layer.id) else {
            tracing::warn!(layer = %layer.id, "zoom: layer not in planar engine");
            return Err(EngineError::NotFound(layer.id.to_string()));
        };
        let Some(extent) = layer.extent.or_else(|| native.data_extent()) else {
            tracing::warn!(layer = %layer.id, "zoom: layer has no extent");
            return Err(EngineError::Failed(format!("no extent for layer {}", layer.id)));
        };
        let (center, resolution) = self.frame(extent, self.defaults.fit_padding).inspect_err(|e| {
            tracing::warn!(layer = %layer.id, error = %e, "zoom: cannot frame layer");
        })?;
        self.start_transition(center, resolution);
        Ok(())
    }

    fn set_extent(&mut self, extent: Extent) -> EngineResult<()> {
        let (center, resolution) = self.frame(extent, [0.0; 4]).inspect_err(|e| {
            tracing::warn!(error = %e, "set_extent failed");
        })?;
        self.set_view(center, resolution);
        Ok(())
    }

    fn get_extent(&self) -> EngineResult<Extent> {
        transform_extent(self.view.extent(), self.view.projection, Projection::Epsg4326).map_err(
            |e| {
                tracing::warn!(error = %e, "get_extent failed");
                EngineError::from(e)
            },
        )
    }

    fn lat_lon_from_pixel(&self, pixel: Pixel) -> EngineResult<GeoCoordinate> {
        let [x, y] = self.view.pixel_to_native(pixel);
        match self.view.projection.inverse(x, y) {
            // Panning past the antimeridian leaves native x unbounded.
            Ok([lon, lat]) => Ok(GeoCoordinate::new(lat, wrap_lon(lon))),
            Err(e) => {
                tracing::warn!(error = %e, x = pixel.x, y = pixel.y, "pixel conversion failed");
                Err(e.into())
            }
        }
    }

    fn pixel_from_click(&self, click: &ClickEvent) -> Option<Pixel> {
        self.view.viewport.pixel_from_client(click)
    }

    fn data_at_point(&self, _coord: &GeoCoordinate, pixel: Pixel) -> Vec<PickedFeature> {
        let tolerance = self.defaults.pick_tolerance_px;
        for layer in self.stacked().into_iter().rev() {
            if !layer.visible || layer.descriptor.layer_type != LayerType::Data {
                continue;
            }
            let PlanarSource::Vector(source) = &layer.source else {
                continue;
            };
            for drawn in source.features.iter().rev() {
                if !drawn.visible {
                    continue;
                }
                let (Geometry::Point(coords), Some(marker)) = (&drawn.feature.geometry, &drawn.marker)
                else {
                    continue;
                };
                let Some(native) = drawn.native.first() else {
                    continue;
                };
                if self.view.native_to_pixel(*native).distance(pixel) <= marker.radius_px() + tolerance {
                    return vec![PickedFeature {
                        layer_id: layer.descriptor.id.clone(),
                        properties: drawn.feature.properties.clone(),
                        coords: *coords,
                    }];
                }
            }
        }
        Vec::new()
    }

    fn add_layer(&mut self, layer: &LayerDescriptor, from_cache: bool) -> EngineResult<()> {
        if self.layers.contains_key(&layer.id) {
            tracing::debug!(layer = %layer.id, "layer already present, updating");
            return self.update_layer(layer);
        }
        let native = if layer.handling.is_vector() {
            self.create_vector_layer(layer, from_cache)?
        } else {
            PlanarLayer {
                descriptor: layer.clone(),
                source: PlanarSource::Tile {
                    url: layer.resolve_url(Backend::Planar),
                },
                visible: true,
                opacity: layer.opacity,
                styler: None,
            }
        };
        self.order.push(layer.id.clone());
        self.layers.insert(layer.id.clone(), native);
        tracing::debug!(layer = %layer.id, "planar layer added");
        Ok(())
    }

    fn remove_layer(&mut self, id: &LayerId) -> EngineResult<()> {
        if self.layers.remove(id).is_none() {
            tracing::warn!(layer = %id, "remove: layer not in planar engine");
            return Err(EngineError::NotFound(id.to_string()));
        }
        self.order.retain(|x| x != id);
        self.pending.retain(|p| &p.layer_id != id);
        Ok(())
    }

    fn create_vector_layer_style(&self, layer: &LayerDescriptor) -> Option<FeatureStyler> {
        self.defaults.vector_layer_style(layer)
    }

    fn update_layer(&mut self, layer: &LayerDescriptor) -> EngineResult<()> {
        let styler = self.create_vector_layer_style(layer);
        let Some(native) = self.layers.get_mut(&layer.id) else {
            tracing::warn!(layer = %layer.id, "update: layer not in planar engine");
            return Err(EngineError::NotFound(layer.id.to_string()));
        };
        native.opacity = layer.opacity;
        native.visible = layer.is_active;
        native.descriptor = layer.clone();
        native.styler = styler;
        native.restyle();
        Ok(())
    }

    fn resolve_pending_loads(&mut self) -> usize {
        let mut populated = 0;
        while let Some(load) = self.pending.pop_front() {
            let Some(descriptor) = self.layers.get(&load.layer_id).map(|l| l.descriptor.clone()) else {
                continue;
            };
            let features = match self.loader.load(&descriptor, &load.url) {
                Ok(features) => features,
                Err(e) => {
                    tracing::warn!(layer = %load.layer_id, url = %load.url, error = %e, "feature load failed");
                    if let Some(PlanarSource::Vector(source)) =
                        self.layers.get_mut(&load.layer_id).map(|l| &mut l.source)
                    {
                        source.loaded = true;
                    }
                    continue;
                }
            };
            let projection = self.view.projection;
            if let Some(native) = self.layers.get_mut(&load.layer_id)
                && let PlanarSource::Vector(source) = &mut native.source
            {
                source.features = project_features(&features, projection, native.styler.as_ref());
                source.loaded = true;
                populated += 1;
            }
            self.cache.insert(load.url, features);
        }
        populated
    }

    fn tick(&mut self, dt_s: f64) {
        let Some(transition) = self.transition.as_mut() else {
            return;
        };
        let [x, y, resolution] = transition.advance(dt_s);
        let done = transition.is_done();
        self.view.center = [x, y];
        self.view.resolution = resolution;
        if done {
            self.transition = None;
        }
    }
}
