//! Globe (3D) adapter: an entity world over the WGS84 ellipsoid seen by a nadir camera.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use foundation::bounds::Extent;
use foundation::math::{
    Geodetic, Vec3, WGS84_A, ecef_to_geodetic, enu_basis, geodetic_to_ecef, ray_ellipsoid_hit,
    wrap_lon,
};
use layers::symbology::{FeatureStyler, default_point_marker};
use layers::vector::{Feature, FeatureLoader, Geometry};
use layers::{Backend, LayerDescriptor, LayerId, LayerType};
use scene::World;
use scene::components::{
    ComponentBounds, ComponentProperties, LayerTag, Transform, VectorGeometry, Visibility,
};
use scene::entity::EntityId;
use scene::picking::{PickIndex, PickOptions, Ray};

use crate::adapter::{ClickEvent, GeoCoordinate, MapEngine, PickedFeature, Pixel, Viewport};
use crate::defaults::EngineDefaults;
use crate::error::{EngineError, EngineResult};
use crate::transition::Transition;

/// Closest the camera gets to the surface (meters).
const MIN_HEIGHT: f64 = 100.0;

/// Farthest camera height (meters).
const MAX_HEIGHT: f64 = WGS84_A * 20.0;

/// Smallest range used when flying to a single entity.
const MIN_ENTITY_RANGE: f64 = 50_000.0;

const BORDER_SAMPLES_PER_EDGE: usize = 9;

/// Camera looking straight down at `lon`/`lat` from `height` meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobeCamera {
    pub lon: f64,
    pub lat: f64,
    pub height: f64,
    pub fov_y_rad: f64,
    pub viewport: Viewport,
}

impl GlobeCamera {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            lon: 0.0,
            lat: 0.0,
            height: 3.0 * WGS84_A,
            fov_y_rad: 60f64.to_radians(),
            viewport,
        }
    }

    pub fn position(&self) -> Vec3 {
        geodetic_to_ecef(Geodetic::from_degrees(self.lon, self.lat, self.height)).into()
    }

    /// Unit-direction ray from the eye through `pixel`.
    pub fn ray_through(&self, pixel: Pixel) -> Ray {
        let (east, north, up) = enu_basis(Geodetic::from_degrees(self.lon, self.lat, 0.0));
        let half_h = (self.fov_y_rad * 0.5).tan();
        let half_w = half_h * self.viewport.width / self.viewport.height;
        let ndc_x = 2.0 * pixel.x / self.viewport.width - 1.0;
        let ndc_y = 1.0 - 2.0 * pixel.y / self.viewport.height;

        let dir = up.scale(-1.0) + east.scale(ndc_x * half_w) + north.scale(ndc_y * half_h);
        let dir = dir.normalize().unwrap_or(up.scale(-1.0));
        Ray::new(self.position(), dir)
    }

    /// Pixel where `target` appears, if it is in front of the eye, inside the
    /// viewport and not hidden behind the ellipsoid.
    pub fn pixel_of(&self, target: Vec3) -> Option<Pixel> {
        let (east, north, up) = enu_basis(Geodetic::from_degrees(self.lon, self.lat, 0.0));
        let eye = self.position();
        let rel = target - eye;
        let depth = rel.dot(up.scale(-1.0));
        if depth <= 0.0 {
            return None;
        }
        let half_h = (self.fov_y_rad * 0.5).tan();
        let half_w = half_h * self.viewport.width / self.viewport.height;
        let ndc_x = rel.dot(east) / depth / half_w;
        let ndc_y = rel.dot(north) / depth / half_h;
        if ndc_x.abs() > 1.0 || ndc_y.abs() > 1.0 {
            return None;
        }
        let range = rel.length();
        let surface = ray_ellipsoid_hit(eye, rel.normalize()?)?;
        if surface < range * (1.0 - 1e-9) - 1.0 {
            return None;
        }
        Some(Pixel::new(
            (ndc_x + 1.0) * 0.5 * self.viewport.width,
            (1.0 - ndc_y) * 0.5 * self.viewport.height,
        ))
    }

    /// Ground distance covered by one pixel at the nadir.
    pub fn meters_per_pixel(&self) -> f64 {
        2.0 * self.height * (self.fov_y_rad * 0.5).tan() / self.viewport.height
    }

    /// Camera `[lon, lat, height]` that shows a lon/lat rectangle.
    pub fn framing(&self, extent: Extent) -> [f64; 3] {
        let [lon, lat] = extent.center();
        let width_m = extent.width().to_radians() * WGS84_A * lat.to_radians().cos().max(0.01);
        let height_m = extent.height().to_radians() * WGS84_A;
        let aspect = self.viewport.width / self.viewport.height;
        let half = (width_m / aspect).max(height_m) * 0.5;
        let h = half / (self.fov_y_rad * 0.5).tan();
        [lon, lat, h.clamp(MIN_HEIGHT, MAX_HEIGHT)]
    }

    fn state(&self) -> [f64; 3] {
        [self.lon, self.lat, self.height]
    }

    fn apply(&mut self, [lon, lat, height]: [f64; 3]) {
        self.lon = wrap_lon(lon);
        self.lat = lat.clamp(-90.0, 90.0);
        self.height = height.clamp(MIN_HEIGHT, MAX_HEIGHT);
    }
}

/// Narrowest `[west, east]` arc covering every longitude. `east` exceeds 180
/// when the arc crosses the antimeridian.
fn lon_span(mut lons: Vec<f64>) -> Option<[f64; 2]> {
    lons.sort_by(f64::total_cmp);
    let (&first, &last) = (lons.first()?, lons.last()?);
    let mut span = [first, last];
    let mut widest_gap = first + 360.0 - last;
    for pair in lons.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > widest_gap {
            widest_gap = gap;
            span = [pair[1], pair[0] + 360.0];
        }
    }
    Some(span)
}

fn pole(lat: f64) -> Vec3 {
    geodetic_to_ecef(Geodetic::from_degrees(0.0, lat, 0.0)).into()
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub url: Option<String>,
    pub entities: Vec<EntityId>,
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobeSource {
    Imagery { url: Option<String> },
    Data(DataSource),
}

/// Native globe layer.
#[derive(Debug, Clone)]
pub struct GlobeLayer {
    pub descriptor: LayerDescriptor,
    pub source: GlobeSource,
    pub visible: bool,
    pub opacity: f32,
    styler: Option<FeatureStyler>,
}

impl GlobeLayer {
    pub fn id(&self) -> &LayerId {
        &self.descriptor.id
    }

    pub fn entities(&self) -> &[EntityId] {
        match &self.source {
            GlobeSource::Data(d) => &d.entities,
            GlobeSource::Imagery { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingLoad {
    layer_id: LayerId,
    url: String,
}

pub struct GlobeEngine {
    world: World,
    camera: GlobeCamera,
    layers: HashMap<LayerId, GlobeLayer>,
    /// Insertion order; ties on display index go to the later layer.
    order: Vec<LayerId>,
    pending: VecDeque<PendingLoad>,
    cache: HashMap<String, Vec<Feature>>,
    loader: Rc<dyn FeatureLoader>,
    defaults: EngineDefaults,
    flight: Option<Transition<3>>,
    pick_index: PickIndex,
    /// Largest pick radius currently assigned to an entity.
    pick_radius_m: f64,
    active: bool,
}

impl GlobeEngine {
    pub fn new(viewport: Viewport, loader: Rc<dyn FeatureLoader>, defaults: EngineDefaults) -> Self {
        Self {
            world: World::new(),
            camera: GlobeCamera::new(viewport),
            layers: HashMap::new(),
            order: Vec::new(),
            pending: VecDeque::new(),
            cache: HashMap::new(),
            loader,
            defaults,
            flight: None,
            pick_index: PickIndex::default(),
            pick_radius_m: 0.0,
            active: true,
        }
    }

    pub fn camera(&self) -> &GlobeCamera {
        &self.camera
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn layer(&self, id: &LayerId) -> Option<&GlobeLayer> {
        self.layers.get(id)
    }

    pub fn pending_loads(&self) -> usize {
        self.pending.len()
    }

    pub fn is_flying(&self) -> bool {
        self.flight.is_some()
    }

    pub fn set_camera(&mut self, lon: f64, lat: f64, height: f64) {
        self.flight = None;
        self.camera.apply([lon, lat, height]);
        self.sync_pick_bounds();
    }

    /// Native data source for `layer`; entities are spawned once features load.
    pub fn create_vector_layer(
        &mut self,
        layer: &LayerDescriptor,
        from_cache: bool,
    ) -> EngineResult<GlobeLayer> {
        if !layer.handling.is_vector() {
            return Err(EngineError::Failed(format!(
                "layer {} is not a vector layer",
                layer.id
            )));
        }
        let styler = self.create_vector_layer_style(layer);
        let url = layer.resolve_url(Backend::Globe);
        let mut source = DataSource {
            url: url.clone(),
            entities: Vec::new(),
            loaded: false,
        };
        match url {
            Some(url) => {
                if from_cache && let Some(cached) = self.cache.get(&url).cloned() {
                    source.entities = self.spawn_features(&layer.id, &cached);
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
        Ok(GlobeLayer {
            descriptor: layer.clone(),
            source: GlobeSource::Data(source),
            visible: true,
            opacity: layer.opacity,
            styler,
        })
    }

    fn spawn_features(&mut self, layer_id: &LayerId, features: &[Feature]) -> Vec<EntityId> {
        let mut out = Vec::with_capacity(features.len());
        for feature in features {
            let to_ecef = |[lon, lat]: [f64; 2]| -> Vec3 {
                geodetic_to_ecef(Geodetic::from_degrees(lon, lat, 0.0)).into()
            };
            let (anchor, geometry) = match &feature.geometry {
                Geometry::Point(p) => {
                    let position = to_ecef(*p);
                    (*p, VectorGeometry::Point { position })
                }
                Geometry::LineString(line) => {
                    let Some(first) = line.first() else { continue };
                    let vertices = line.iter().copied().map(to_ecef).collect();
                    (*first, VectorGeometry::Line { vertices })
                }
                Geometry::Polygon(rings) => {
                    let Some(first) = rings.first().and_then(|r| r.first()) else {
                        continue;
                    };
                    let rings = rings
                        .iter()
                        .map(|r| r.iter().copied().map(to_ecef).collect())
                        .collect();
                    (*first, VectorGeometry::Area { rings })
                }
            };
            let entity = self.world.spawn();
            self.world
                .set_transform(entity, Transform::from_lon_lat(anchor[0], anchor[1], 0.0));
            self.world.set_geometry(entity, geometry);
            self.world
                .set_properties(entity, ComponentProperties::new(feature.properties.clone()));
            self.world.set_layer_tag(entity, LayerTag::new(layer_id.as_str()));
            out.push(entity);
        }
        out
    }

    /// Re-derive markers and visibility of a layer's entities.
    fn restyle(&mut self, id: &LayerId) {
        let Some(layer) = self.layers.get(id) else {
            return;
        };
        let entities = layer.entities().to_vec();
        let styler = layer.styler.clone();
        let layer_visible = layer.visible;
        for entity in entities {
            let is_point = self.world.geometry(entity).is_some_and(VectorGeometry::is_point);
            if !is_point {
                self.world.set_marker(entity, None);
                self.world.set_visibility(entity, Visibility::resolve(layer_visible, true));
                continue;
            }
            let marker = match (&styler, self.world.properties(entity)) {
                (Some(s), Some(props)) => s.style(&props.values),
                (Some(_), None) => None,
                (None, _) => Some(default_point_marker()),
            };
            let visibility = Visibility::resolve(layer_visible, marker.is_some());
            self.world.set_marker(entity, marker);
            self.world.set_visibility(entity, visibility);
        }
    }

    /// Size point bounds to their on-screen marker at the current camera height
    /// and rebuild the pick index.
    fn sync_pick_bounds(&mut self) {
        let mpp = self.camera.meters_per_pixel();
        let tolerance = self.defaults.pick_tolerance_px;
        let mut largest: f64 = 0.0;
        let entities: Vec<EntityId> = self
            .layers
            .values()
            .flat_map(|l| l.entities().iter().copied())
            .collect();
        for entity in entities {
            let Some(Transform { position }) = self.world.transform(entity) else {
                continue;
            };
            if !self.world.geometry(entity).is_some_and(VectorGeometry::is_point) {
                continue;
            }
            let radius_px = self.world.marker(entity).map(|m| m.radius_px()).unwrap_or(0.0);
            let radius_m = (radius_px + tolerance) * mpp;
            largest = largest.max(radius_m);
            self.world
                .set_bounds(entity, ComponentBounds::around(position, radius_m));
        }
        self.pick_radius_m = largest;
        self.pick_index = PickIndex::build(&self.world);
    }

    /// Draw order of a pickable entity: display index, then layer insertion,
    /// then feature order. `None` for entities of hidden or non-data layers.
    fn draw_rank(&self, entity: EntityId) -> Option<(u32, usize, usize)> {
        let id = LayerId::new(self.world.layer_tag(entity)?.as_str());
        let layer = self
            .layers
            .get(&id)
            .filter(|l| l.visible && l.descriptor.layer_type == LayerType::Data)?;
        let added = self.order.iter().position(|x| *x == id)?;
        let feature = layer.entities().iter().position(|e| *e == entity)?;
        Some((layer.descriptor.display_index, added, feature))
    }

    /// Offset flight target framing the bounding sphere of a layer's entities.
    fn entity_flight_target(&self, layer: &GlobeLayer) -> Option<[f64; 3]> {
        let positions: Vec<Vec3> = layer
            .entities()
            .iter()
            .filter_map(|e| self.world.transform(*e))
            .map(|t| t.position)
            .collect();
        if positions.is_empty() {
            return None;
        }
        let n = positions.len() as f64;
        let sum = positions
            .iter()
            .fold(Vec3::new(0.0, 0.0, 0.0), |acc, p| acc + *p);
        let center = sum.scale(1.0 / n);
        let radius = positions
            .iter()
            .map(|p| (*p - center).length())
            .fold(0.0, f64::max);
        let geo = ecef_to_geodetic(center.into());
        let range = (radius / (self.camera.fov_y_rad * 0.5).sin()).max(MIN_ENTITY_RANGE);
        Some([geo.lon_deg(), geo.lat_deg(), range])
    }

    fn fly_to(&mut self, target: [f64; 3]) {
        if self.defaults.transition_s <= 0.0 {
            self.set_camera(target[0], target[1], target[2]);
            return;
        }
        let from = self.camera.state();
        // Shortest way around in longitude.
        let dlon = (target[0] - from[0] + 180.0).rem_euclid(360.0) - 180.0;
        let to = [from[0] + dlon, target[1], target[2]];
        self.flight = Some(Transition::new(from, to, self.defaults.transition_s));
    }
}

impl MapEngine for GlobeEngine {
    fn backend(&self) -> Backend {
        Backend::Globe
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
            tracing::warn!(layer = %layer.id, "zoom: layer not in globe engine");
            return Err(EngineError::NotFound(layer.id.to_string()));
        };
        let target = match layer.extent {
            Some(extent) if extent.is_valid() => self.camera.framing(extent),
            Some(extent) => {
                tracing::warn!(layer = %layer.id, extent = ?extent.as_array(), "zoom: invalid extent");
                return Err(EngineError::Failed(format!("invalid extent for layer {}", layer.id)));
            }
            None => match self.entity_flight_target(native) {
                Some(target) => target,
                None => {
                    tracing::warn!(layer = %layer.id, "zoom: layer has no entities to frame");
                    return Err(EngineError::Failed(format!("no extent for layer {}", layer.id)));
                }
            },
        };
        self.fly_to(target);
        Ok(())
    }

    fn set_extent(&mut self, extent: Extent) -> EngineResult<()> {
        if !extent.is_valid() {
            tracing::warn!(extent = ?extent.as_array(), "set_extent: invalid extent");
            return Err(EngineError::Failed(format!("invalid extent {:?}", extent.as_array())));
        }
        let [lon, lat, height] = self.camera.framing(extent);
        self.set_camera(lon, lat, height);
        Ok(())
    }

    fn get_extent(&self) -> EngineResult<Extent> {
        let samples: Vec<[f64; 2]> = self
            .camera
            .viewport
            .border_samples(BORDER_SAMPLES_PER_EDGE)
            .into_iter()
            .filter_map(|px| self.lat_lon_from_pixel(px).ok())
            .filter(|c| c.is_valid)
            .map(|c| [c.lon, c.lat])
            .collect();
        let Some(bbox) = Extent::from_points(samples.iter().copied()) else {
            tracing::warn!("get_extent: viewport border does not touch the globe");
            return Err(EngineError::Failed(
                "viewport border does not touch the globe".to_string(),
            ));
        };

        // A visible pole lies inside the border ring, so every longitude is on screen.
        let north_pole = self.camera.pixel_of(pole(90.0)).is_some();
        let south_pole = self.camera.pixel_of(pole(-90.0)).is_some();
        if north_pole || south_pole {
            return Ok(Extent::new(
                -180.0,
                if south_pole { -90.0 } else { bbox.south },
                180.0,
                if north_pole { 90.0 } else { bbox.north },
            ));
        }

        let [west, east] =
            lon_span(samples.iter().map(|p| p[0]).collect()).unwrap_or([bbox.west, bbox.east]);
        Ok(Extent::new(west, bbox.south, east, bbox.north))
    }

    fn lat_lon_from_pixel(&self, pixel: Pixel) -> EngineResult<GeoCoordinate> {
        let ray = self.camera.ray_through(pixel);
        match ray_ellipsoid_hit(ray.origin, ray.dir) {
            Some(t) => {
                let geo = ecef_to_geodetic(ray.at(t).into());
                Ok(GeoCoordinate::new(geo.lat_deg(), geo.lon_deg()))
            }
            None => Ok(GeoCoordinate::invalid()),
        }
    }

    fn pixel_from_click(&self, click: &ClickEvent) -> Option<Pixel> {
        self.camera.viewport.pixel_from_client(click)
    }

    fn data_at_point(&self, _coord: &GeoCoordinate, pixel: Pixel) -> Vec<PickedFeature> {
        let ray = self.camera.ray_through(pixel);
        // Entities behind the globe are occluded.
        let max_distance = ray_ellipsoid_hit(ray.origin, ray.dir)
            .map(|t| t + self.pick_radius_m)
            .unwrap_or(PickOptions::default().max_distance);
        let mut ranked = self
            .pick_index
            .pick_all(
                ray,
                PickOptions {
                    max_distance,
                    limit: 0,
                },
            )
            .into_iter()
            .filter_map(|hit| self.draw_rank(hit.entity).map(|rank| (hit, rank)));
        let Some(nearest) = ranked.next() else {
            return Vec::new();
        };

        // Markers within one marker diameter of the nearest hit overlap on
        // screen; among those the one drawn last is on top.
        let band = nearest.0.distance + 2.0 * self.pick_radius_m;
        let top = std::iter::once(nearest)
            .chain(ranked.take_while(|(hit, _)| hit.distance <= band))
            .max_by_key(|(_, rank)| *rank)
            .map(|(hit, _)| hit.entity);

        let Some(entity) = top else {
            return Vec::new();
        };
        let (Some(props), Some(tag), Some(transform)) = (
            self.world.properties(entity),
            self.world.layer_tag(entity),
            self.world.transform(entity),
        ) else {
            return Vec::new();
        };
        vec![PickedFeature {
            layer_id: LayerId::new(tag.as_str()),
            properties: props.values.clone(),
            coords: transform.lon_lat(),
        }]
    }

    fn add_layer(&mut self, layer: &LayerDescriptor, from_cache: bool) -> EngineResult<()> {
        if self.layers.contains_key(&layer.id) {
            tracing::debug!(layer = %layer.id, "layer already present, updating");
            return self.update_layer(layer);
        }
        let native = if layer.handling.is_vector() {
            self.create_vector_layer(layer, from_cache)?
        } else {
            GlobeLayer {
                descriptor: layer.clone(),
                source: GlobeSource::Imagery {
                    url: layer.resolve_url(Backend::Globe),
                },
                visible: true,
                opacity: layer.opacity,
                styler: None,
            }
        };
        self.layers.insert(layer.id.clone(), native);
        self.order.push(layer.id.clone());
        self.restyle(&layer.id);
        self.sync_pick_bounds();
        tracing::debug!(layer = %layer.id, "globe layer added");
        Ok(())
    }

    fn remove_layer(&mut self, id: &LayerId) -> EngineResult<()> {
        let Some(layer) = self.layers.remove(id) else {
            tracing::warn!(layer = %id, "remove: layer not in globe engine");
            return Err(EngineError::NotFound(id.to_string()));
        };
        for entity in layer.entities() {
            self.world.despawn(*entity);
        }
        self.order.retain(|x| x != id);
        self.pending.retain(|p| &p.layer_id != id);
        self.sync_pick_bounds();
        Ok(())
    }

    fn create_vector_layer_style(&self, layer: &LayerDescriptor) -> Option<FeatureStyler> {
        self.defaults.vector_layer_style(layer)
    }

    fn update_layer(&mut self, layer: &LayerDescriptor) -> EngineResult<()> {
        let styler = self.create_vector_layer_style(layer);
        let Some(native) = self.layers.get_mut(&layer.id) else {
            tracing::warn!(layer = %layer.id, "update: layer not in globe engine");
            return Err(EngineError::NotFound(layer.id.to_string()));
        };
        native.opacity = layer.opacity;
        native.visible = layer.is_active;
        native.descriptor = layer.clone();
        native.styler = styler;
        self.restyle(&layer.id);
        self.sync_pick_bounds();
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
                    if let Some(GlobeSource::Data(source)) =
                        self.layers.get_mut(&load.layer_id).map(|l| &mut l.source)
                    {
                        source.loaded = true;
                    }
                    continue;
                }
            };

            let stale: Vec<EntityId> = self
                .layers
                .get(&load.layer_id)
                .map(|l| l.entities().to_vec())
                .unwrap_or_default();
            for entity in stale {
                self.world.despawn(entity);
            }
            let entities = self.spawn_features(&load.layer_id, &features);
            if let Some(GlobeSource::Data(source)) =
                self.layers.get_mut(&load.layer_id).map(|l| &mut l.source)
            {
                source.entities = entities;
                source.loaded = true;
                populated += 1;
            }
            self.restyle(&load.layer_id);
            self.cache.insert(load.url, features);
        }
        if populated > 0 {
            self.sync_pick_bounds();
        }
        populated
    }

    fn tick(&mut self, dt_s: f64) {
        let Some(flight) = self.flight.as_mut() else {
            return;
        };
        let state = flight.advance(dt_s);
        let done = flight.is_done();
        self.camera.apply(state);
        if done {
            self.flight = None;
        }
        self.sync_pick_bounds();
    }
}

#[cfg(test)]
mod tests {
    use super::{GlobeEngine, lon_span};
    use crate::adapter::{GeoCoordinate, MapEngine, Pixel, Viewport};
    use crate::defaults::EngineDefaults;
    use crate::error::EngineError;
    use chrono::{TimeZone, Utc};
    use foundation::bounds::Extent;
    use layers::vector::{Feature, Properties, StaticFeatureLoader};
    use layers::{Handling, LayerDescriptor, VectorStyleMode};
    use serde_json::json;
    use std::rc::Rc;

    fn assert_close(a: f64, b: f64, eps: f64) {
        assert!((a - b).abs() <= eps, "{a} != {b} (eps {eps})");
    }

    fn storm_point(lon: f64, lat: f64, dtg: &str, intensity: f64) -> Feature {
        let mut props = Properties::new();
        props.insert("dtg".to_string(), json!(dtg));
        props.insert("intensity".to_string(), json!(intensity));
        Feature::point(lon, lat, props)
    }

    fn storm_layer(id: &str, url: &str) -> LayerDescriptor {
        let mut layer = LayerDescriptor::new(id, Handling::VectorGeojson);
        layer.urls = vec![url.to_string()];
        layer.vector_style = Some(VectorStyleMode::Storm);
        layer.time_format = Some("YYYY-MM-DD HHmm".to_string());
        layer.is_active = true;
        layer
    }

    fn engine(loader: StaticFeatureLoader) -> GlobeEngine {
        GlobeEngine::new(
            Viewport::new(800.0, 600.0),
            Rc::new(loader),
            EngineDefaults::default(),
        )
    }

    #[test]
    fn center_pixel_is_the_nadir() {
        let mut engine = engine(StaticFeatureLoader::new());
        engine.set_camera(-64.5, 18.2, 2_000_000.0);
        let c = engine
            .lat_lon_from_pixel(Pixel::new(400.0, 300.0))
            .expect("converts");
        assert!(c.is_valid);
        assert_close(c.lon, -64.5, 1e-6);
        assert_close(c.lat, 18.2, 1e-6);
    }

    #[test]
    fn pointer_beyond_the_limb_is_invalid_but_converts() {
        let engine = engine(StaticFeatureLoader::new());
        let corner = engine.lat_lon_from_pixel(Pixel::new(0.0, 0.0)).expect("converts");
        assert!(!corner.is_valid);
        assert!(engine.get_extent().is_err());
    }

    #[test]
    fn extent_round_trip_contains_the_request() {
        let mut engine = engine(StaticFeatureLoader::new());
        engine
            .set_extent(Extent::new(-80.0, 15.0, -60.0, 30.0))
            .expect("frame");
        let visible = engine.get_extent().expect("extent");
        assert!(visible.contains(-70.0, 22.5));
        assert!(visible.west <= -78.0 && visible.east >= -62.0);
        assert!(engine.set_extent(Extent::new(10.0, 0.0, -10.0, 5.0)).is_err());
    }

    #[test]
    fn extent_over_the_antimeridian_stays_narrow() {
        let mut engine = engine(StaticFeatureLoader::new());
        engine.set_camera(0.0, 0.0, 2_000_000.0);
        let prime = engine.get_extent().expect("extent");

        engine.set_camera(180.0, 0.0, 2_000_000.0);
        let dateline = engine.get_extent().expect("extent");
        assert!(dateline.west < 180.0 && dateline.east > 180.0, "{dateline:?}");
        assert_close(dateline.width(), prime.width(), 1e-6);
        assert_close(dateline.center()[0], 180.0, 1e-6);

        // Feeding the extent back keeps the camera over the dateline.
        engine.set_extent(dateline).expect("frame");
        assert_close(engine.camera().lon.abs(), 180.0, 1e-6);
        let again = engine.get_extent().expect("extent");
        assert!(again.west < 180.0 && again.east > 180.0, "{again:?}");
        assert!(again.width() < 2.0 * dateline.width(), "{again:?}");
    }

    #[test]
    fn visible_pole_spans_every_longitude() {
        let mut engine = engine(StaticFeatureLoader::new());
        engine.set_camera(0.0, 90.0, 3_000_000.0);
        let centre = engine
            .lat_lon_from_pixel(Pixel::new(400.0, 300.0))
            .expect("converts");
        assert_close(centre.lat, 90.0, 1e-6);

        let visible = engine.get_extent().expect("extent");
        assert_eq!((visible.west, visible.east, visible.north), (-180.0, 180.0, 90.0));
        assert!(visible.south > 0.0 && visible.south < 90.0, "{visible:?}");
        assert!(visible.contains(centre.lon, centre.lat));

        engine.set_camera(30.0, -89.0, 3_000_000.0);
        let visible = engine.get_extent().expect("extent");
        assert_eq!((visible.west, visible.south, visible.east), (-180.0, -90.0, 180.0));
        assert!(visible.north < 0.0, "{visible:?}");

        // Mid-latitude views keep both poles off screen.
        engine.set_camera(-64.5, 18.2, 2_000_000.0);
        let visible = engine.get_extent().expect("extent");
        assert!(visible.west > -180.0 && visible.north < 90.0, "{visible:?}");
    }

    #[test]
    fn picks_one_entity_out_of_a_stack() {
        let stack: Vec<Feature> = (0..10)
            .map(|i| storm_point(-64.5, 18.2, "2017-09-06 1200", 100.0 + i as f64))
            .collect();
        let mut engine = engine(StaticFeatureLoader::new().with("irma.json", stack));
        engine.set_camera(-64.5, 18.2, 2_000_000.0);
        engine.add_layer(&storm_layer("irma", "irma.json"), false).expect("add");
        assert_eq!(engine.resolve_pending_loads(), 1);

        let px = Pixel::new(400.0, 300.0);
        let coord = engine.lat_lon_from_pixel(px).expect("converts");
        let hits = engine.data_at_point(&coord, px);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].layer_id.as_str(), "irma");
        assert_close(hits[0].coords[0], -64.5, 1e-6);
        assert_close(hits[0].coords[1], 18.2, 1e-6);

        assert!(engine.data_at_point(&coord, Pixel::new(100.0, 100.0)).is_empty());
    }

    #[test]
    fn overlapping_layers_pick_the_top_drawn_feature() {
        let loader = StaticFeatureLoader::new()
            .with(
                "lower.json",
                vec![
                    storm_point(-64.5, 18.2, "2017-09-06 1200", 40.0),
                    storm_point(-64.5, 18.2, "2017-09-06 1200", 50.0),
                ],
            )
            .with(
                "upper.json",
                vec![
                    storm_point(-64.5, 18.2, "2017-09-06 1200", 140.0),
                    storm_point(-64.5, 18.2, "2017-09-06 1200", 150.0),
                ],
            );
        let mut engine = engine(loader);
        engine.set_camera(-64.5, 18.2, 2_000_000.0);
        let mut lower = storm_layer("lower", "lower.json");
        lower.display_index = 1;
        let mut upper = storm_layer("upper", "upper.json");
        upper.display_index = 2;
        engine.add_layer(&lower, false).expect("add");
        engine.add_layer(&upper, false).expect("add");
        assert_eq!(engine.resolve_pending_loads(), 2);

        let px = Pixel::new(400.0, 300.0);
        let hits = engine.data_at_point(&GeoCoordinate::invalid(), px);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].layer_id.as_str(), "upper");
        assert_eq!(hits[0].properties["intensity"], json!(150.0));

        // Equal display index: the layer added later is drawn on top.
        upper.display_index = 1;
        engine.update_layer(&upper).expect("update");
        assert_eq!(engine.data_at_point(&GeoCoordinate::invalid(), px)[0].layer_id.as_str(), "upper");

        upper.is_active = false;
        engine.update_layer(&upper).expect("update");
        let hits = engine.data_at_point(&GeoCoordinate::invalid(), px);
        assert_eq!(hits[0].layer_id.as_str(), "lower");
        assert_eq!(hits[0].properties["intensity"], json!(50.0));
    }

    #[test]
    fn removed_layer_leaves_the_pick_index() {
        let mut engine = engine(StaticFeatureLoader::new().with(
            "irma.json",
            vec![storm_point(-64.5, 18.2, "2017-09-06 1200", 155.0)],
        ));
        engine.set_camera(-64.5, 18.2, 2_000_000.0);
        let layer = storm_layer("irma", "irma.json");
        engine.add_layer(&layer, false).expect("add");
        engine.resolve_pending_loads();
        let px = Pixel::new(400.0, 300.0);
        assert_eq!(engine.data_at_point(&GeoCoordinate::invalid(), px).len(), 1);

        engine.remove_layer(&layer.id).expect("remove");
        assert!(engine.data_at_point(&GeoCoordinate::invalid(), px).is_empty());
        assert!(engine.world().pickable().is_empty());
        assert!(matches!(engine.remove_layer(&layer.id), Err(EngineError::NotFound(_))));
    }

    #[test]
    fn hidden_entities_are_not_pickable() {
        let mut engine = engine(StaticFeatureLoader::new().with(
            "irma.json",
            vec![storm_point(-64.5, 18.2, "2017-09-06 1200", 155.0)],
        ));
        engine.set_camera(-64.5, 18.2, 2_000_000.0);
        let mut layer = storm_layer("irma", "irma.json");
        engine.add_layer(&layer, false).expect("add");
        engine.resolve_pending_loads();

        layer.time = Some(Utc.with_ymd_and_hms(2017, 9, 7, 0, 0, 0).unwrap());
        engine.update_layer(&layer).expect("update");
        let px = Pixel::new(400.0, 300.0);
        assert!(engine.data_at_point(&GeoCoordinate::invalid(), px).is_empty());

        layer.time = Some(Utc.with_ymd_and_hms(2017, 9, 6, 0, 0, 0).unwrap());
        engine.update_layer(&layer).expect("update");
        assert_eq!(engine.data_at_point(&GeoCoordinate::invalid(), px).len(), 1);
    }

    #[test]
    fn zoom_flies_to_extent_or_entities() {
        let mut engine = engine(StaticFeatureLoader::new().with(
            "irma.json",
            vec![
                storm_point(-60.0, 16.0, "2017-09-06 0000", 150.0),
                storm_point(-70.0, 20.0, "2017-09-07 0000", 150.0),
            ],
        ));
        let layer = storm_layer("irma", "irma.json");
        assert!(matches!(engine.zoom_to_layer(&layer), Err(EngineError::NotFound(_))));
        engine.add_layer(&layer, false).expect("add");
        assert!(matches!(engine.zoom_to_layer(&layer), Err(EngineError::Failed(_))));

        engine.resolve_pending_loads();
        engine.zoom_to_layer(&layer).expect("entity flight");
        assert!(engine.is_flying());
        engine.tick(1.0);
        assert!(!engine.is_flying());
        assert_close(engine.camera().lon, -65.0, 0.5);
        assert_close(engine.camera().lat, 18.0, 0.5);

        let mut with_extent = layer.clone();
        with_extent.extent = Some(Extent::new(100.0, -10.0, 120.0, 10.0));
        engine.zoom_to_layer(&with_extent).expect("rectangle flight");
        engine.tick(0.5);
        engine.tick(0.5);
        assert_close(engine.camera().lon, 110.0, 1e-9);
        assert_close(engine.camera().lat, 0.0, 1e-9);
    }

    #[test]
    fn longitude_span_takes_the_short_way_round() {
        assert_eq!(lon_span(vec![-10.0, 5.0, 20.0]), Some([-10.0, 20.0]));
        assert_eq!(lon_span(vec![178.0, -179.0, 176.0, -175.0]), Some([176.0, 185.0]));
        assert_eq!(lon_span(Vec::new()), None);
    }
}
