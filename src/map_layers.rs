// map_layers.rs

use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::colorscale::ColorScale;
use crate::error::DashError;
use crate::filter::FilterStore;
use crate::stations::StationLookup;
use crate::tabular::{Table, field};

/// How many stations the popularity chart ranks.
pub const POPULAR_STATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LayerKind {
    BaseMarkers,
    DensityOverlay,
    HighlightMarker,
    UploadedOverlay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HoverInfo {
    ColorAndText,
    Text,
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerStyle {
    pub marker_size: f64,
    pub color_scale: Option<ColorScale>,
    pub reverse_scale: bool,
    pub hover: HoverInfo,
    pub show_scale: bool,
    /// Kernel radius, density layers only.
    pub radius: Option<f64>,
}

impl LayerStyle {
    pub fn base_markers() -> Self {
        Self {
            marker_size: 8.0,
            color_scale: Some(ColorScale::YlOrRd),
            reverse_scale: true,
            hover: HoverInfo::ColorAndText,
            show_scale: true,
            radius: None,
        }
    }

    pub fn density() -> Self {
        Self {
            marker_size: 0.0,
            color_scale: None,
            reverse_scale: false,
            hover: HoverInfo::Skip,
            show_scale: false,
            radius: Some(1.0),
        }
    }

    pub fn highlight() -> Self {
        Self {
            marker_size: 25.0,
            color_scale: Some(ColorScale::Jet),
            reverse_scale: false,
            hover: HoverInfo::Text,
            show_scale: false,
            radius: None,
        }
    }

    pub fn uploaded(color_scale: ColorScale) -> Self {
        Self {
            marker_size: 16.0,
            color_scale: Some(color_scale),
            reverse_scale: false,
            hover: HoverInfo::Text,
            show_scale: false,
            radius: None,
        }
    }
}

/// One drawable point. Every point of a layer contributes exactly one entry
/// to each of the layer's parallel arrays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub lat: f64,
    pub lon: f64,
    pub text: Option<String>,
    pub value: Option<f64>,
}

impl MapPoint {
    pub fn at(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            text: None,
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapLayer {
    pub kind: LayerKind,
    pub name: String,
    pub style: LayerStyle,
    points: Vec<MapPoint>,
    /// Color domain used for `value`, recomputed with the points.
    color_domain: Option<(f64, f64)>,
}

impl MapLayer {
    pub fn new(kind: LayerKind, name: impl Into<String>, style: LayerStyle) -> Self {
        Self {
            kind,
            name: name.into(),
            style,
            points: Vec::new(),
            color_domain: None,
        }
    }

    pub fn with_points(mut self, points: Vec<MapPoint>) -> Self {
        self.set_points(points);
        self
    }

    /// Replaces the layer's contents and rescales its color domain from the
    /// new values alone.
    pub fn set_points(&mut self, points: Vec<MapPoint>) {
        self.color_domain = value_domain(points.iter().filter_map(|p| p.value));
        self.points = points;
    }

    pub fn clear(&mut self) {
        self.set_points(Vec::new());
    }

    pub fn points(&self) -> &[MapPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn color_domain(&self) -> Option<(f64, f64)> {
        self.color_domain
    }

    pub fn lats(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.lat).collect()
    }

    pub fn lons(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.lon).collect()
    }

    /// RGB color of a point, from its value and the layer's scale.
    pub fn point_color(&self, point: &MapPoint) -> Option<(u8, u8, u8)> {
        let scale = self.style.color_scale?;
        let value = point.value?;
        let (min, max) = self.color_domain?;
        Some(scale.color_for(value, min, max, self.style.reverse_scale))
    }

    /// Declarative trace object for the chart library.
    pub fn to_trace(&self) -> Value {
        let lat = self.lats();
        let lon = self.lons();
        let text: Vec<&str> = self
            .points
            .iter()
            .map(|p| p.text.as_deref().unwrap_or(""))
            .collect();
        let color: Vec<Option<f64>> = self.points.iter().map(|p| p.value).collect();
        let hoverinfo = match self.style.hover {
            HoverInfo::ColorAndText => "color+text",
            HoverInfo::Text => "text",
            HoverInfo::Skip => "skip",
        };

        if self.kind == LayerKind::DensityOverlay {
            return json!({
                "type": "densitymapbox",
                "name": self.name,
                "lat": lat,
                "lon": lon,
                "radius": self.style.radius,
                "hoverinfo": hoverinfo,
                "showscale": self.style.show_scale,
            });
        }

        let mut marker = json!({ "size": self.style.marker_size, "color": color });
        if let Some(scale) = self.style.color_scale {
            marker["colorscale"] = json!(scale.to_string());
            marker["reversescale"] = json!(self.style.reverse_scale);
        }
        if let Some((min, max)) = self.color_domain {
            marker["cmin"] = json!(min);
            marker["cmax"] = json!(max);
        }
        json!({
            "type": "scattermapbox",
            "name": self.name,
            "mode": "markers",
            "lat": lat,
            "lon": lon,
            "text": text,
            "marker": marker,
            "hoverinfo": hoverinfo,
            "showscale": self.style.show_scale,
        })
    }
}

fn value_domain(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |domain, v| match domain {
        None => Some((v, v)),
        Some((min, max)) => Some((f64::min(min, v), f64::max(max, v))),
    })
}

/// Map viewport: where the camera looks and how far in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
}

impl MapView {
    /// Mean position of `points`, zoomed so their bounding box fits.
    pub fn fit(points: &[MapPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let center_lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
        let center_lon = points.iter().map(|p| p.lon).sum::<f64>() / n;

        let lat_span = span(points.iter().map(|p| p.lat));
        let lon_span = span(points.iter().map(|p| p.lon));
        let widest = lat_span.max(lon_span);
        let zoom = if widest > 0.0 {
            (360.0 / widest).log2().clamp(1.0, 16.0)
        } else {
            12.0
        };
        Some(Self {
            center_lat,
            center_lon,
            zoom,
        })
    }
}

fn span(values: impl Iterator<Item = f64>) -> f64 {
    value_domain(values).map_or(0.0, |(min, max)| max - min)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStation {
    pub station: String,
    pub traffic: f64,
}

/// Result of one [`MapLayerModel::update`].
#[derive(Debug)]
pub struct MapUpdate {
    /// BaseMarkers, DensityOverlay, HighlightMarker, then uploaded overlays.
    pub layers: Vec<MapLayer>,
    pub popularity: Vec<RankedStation>,
    /// Set on the single update that first centred the map.
    pub center_hint: Option<MapView>,
    pub skipped: Vec<DashError>,
}

/// Owns the map's layers and the one-time viewport.
#[derive(Debug, Clone)]
pub struct MapLayerModel {
    origin_column: String,
    base: MapLayer,
    density: MapLayer,
    highlight: MapLayer,
    overlays: Vec<MapLayer>,
    view: Option<MapView>,
}

impl MapLayerModel {
    /// `origin_column` is the filter column that pins the trip-origin station.
    pub fn new(origin_column: impl Into<String>) -> Self {
        Self {
            origin_column: origin_column.into(),
            base: MapLayer::new(LayerKind::BaseMarkers, "stations", LayerStyle::base_markers()),
            density: MapLayer::new(LayerKind::DensityOverlay, "density", LayerStyle::density()),
            highlight: MapLayer::new(LayerKind::HighlightMarker, "origin", LayerStyle::highlight()),
            overlays: Vec::new(),
            view: None,
        }
    }

    pub fn set_density(&mut self, points: Vec<MapPoint>) {
        debug!(points = points.len(), "density overlay loaded");
        self.density.set_points(points);
    }

    pub fn add_overlay(&mut self, layer: MapLayer) {
        debug!(name = %layer.name, points = layer.len(), "overlay added");
        self.overlays.push(layer);
    }

    /// The viewport, once some update has produced one.
    pub fn view(&self) -> Option<MapView> {
        self.view
    }

    /// Current layers in draw order.
    pub fn layers(&self) -> Vec<MapLayer> {
        let mut layers = vec![self.base.clone(), self.density.clone(), self.highlight.clone()];
        layers.extend(self.overlays.iter().cloned());
        layers
    }

    /// Rebuilds the traffic-derived layers from `traffic` data rows
    /// (`station id, count`; header rows already removed).
    ///
    /// Rows naming unknown stations, or carrying a non-numeric count, are
    /// skipped and reported in [`MapUpdate::skipped`]. The viewport is
    /// computed on the first update that has any markers and never again.
    pub fn update(
        &mut self,
        traffic: &Table,
        filter: &FilterStore,
        stations: &StationLookup,
    ) -> MapUpdate {
        let mut skipped = Vec::new();
        let mut markers = Vec::with_capacity(traffic.len());
        for row in traffic {
            let id = field(row, 0);
            let count = match field(row, 1).trim().parse::<f64>() {
                Ok(count) => count,
                Err(_) => {
                    warn!(station = id, count = field(row, 1), "skipping traffic row with bad count");
                    skipped.push(DashError::Decode(format!("bad traffic count in row {row:?}")));
                    continue;
                }
            };
            match stations.resolve(id) {
                Ok(station) => markers.push(MapPoint {
                    lat: station.latitude,
                    lon: station.longitude,
                    text: Some(id.to_string()),
                    value: Some(count),
                }),
                Err(e) => {
                    warn!(error = %e, "skipping traffic row");
                    skipped.push(e);
                }
            }
        }

        let popularity = rank_by_traffic(&markers);
        self.base.set_points(markers);

        match filter.get(&self.origin_column) {
            Some(origin) => match stations.get(origin) {
                Some(station) => self.highlight.set_points(vec![MapPoint {
                    lat: station.latitude,
                    lon: station.longitude,
                    text: Some(origin.to_string()),
                    value: Some(50.0),
                }]),
                None => {
                    warn!(station = origin, "origin station not in lookup, nothing to highlight");
                    self.highlight.clear();
                }
            },
            None => self.highlight.clear(),
        }

        let mut center_hint = None;
        if self.view.is_none() {
            if let Some(view) = MapView::fit(self.base.points()) {
                debug!(?view, "map centred");
                self.view = Some(view);
                center_hint = Some(view);
            }
        }

        MapUpdate {
            layers: self.layers(),
            popularity,
            center_hint,
            skipped,
        }
    }
}

/// Top stations by traffic, descending; equal counts keep row order.
fn rank_by_traffic(markers: &[MapPoint]) -> Vec<RankedStation> {
    let mut ranked: Vec<RankedStation> = markers
        .iter()
        .map(|p| RankedStation {
            station: p.text.clone().unwrap_or_default(),
            traffic: p.value.unwrap_or(0.0),
        })
        .collect();
    ranked.sort_by(|a, b| b.traffic.total_cmp(&a.traffic));
    ranked.truncate(POPULAR_STATIONS);
    ranked
}

/// Density points from `/data/crime.csv`: two leading rows are discarded,
/// then latitude is field 1 and longitude field 2.
pub fn density_points(table: Table) -> Vec<MapPoint> {
    crate::tabular::skip_rows(table, 2)
        .iter()
        .filter_map(|row| {
            let lat = field(row, 1).trim().parse().ok()?;
            let lon = field(row, 2).trim().parse().ok()?;
            Some(MapPoint::at(lat, lon))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stations::Station;
    use crate::tabular::decode;
    use approx::assert_relative_eq;

    fn lookup() -> StationLookup {
        [
            ("72.0", 40.0, -74.0),
            ("74.0", 41.0, -73.0),
            ("78.0", 42.0, -72.0),
        ]
        .into_iter()
        .map(|(id, latitude, longitude)| (id.to_string(), Station { latitude, longitude }))
        .collect()
    }

    fn traffic(text: &str) -> Table {
        decode(text)
    }

    #[test]
    fn base_markers_follow_traffic() {
        let mut model = MapLayerModel::new("from");
        let update = model.update(&traffic("72.0,1000\n74.0,262\n"), &FilterStore::new(), &lookup());
        let base = &update.layers[0];
        assert_eq!(base.kind, LayerKind::BaseMarkers);
        assert_eq!(base.lats(), vec![40.0, 41.0]);
        assert_eq!(base.lons(), vec![-74.0, -73.0]);
        assert_eq!(base.color_domain(), Some((262.0, 1000.0)));
        assert_eq!(base.points()[0].text.as_deref(), Some("72.0"));
    }

    #[test]
    fn color_domain_is_a_full_rescale() {
        let mut model = MapLayerModel::new("from");
        let stations = lookup();
        model.update(&traffic("72.0,1000\n74.0,5\n"), &FilterStore::new(), &stations);
        let update = model.update(&traffic("74.0,40\n78.0,60\n"), &FilterStore::new(), &stations);
        assert_eq!(update.layers[0].color_domain(), Some((40.0, 60.0)));
    }

    #[test]
    fn unknown_station_is_skipped_not_fatal() {
        let mut model = MapLayerModel::new("from");
        let update = model.update(
            &traffic("72.0,10\n999.0,50\n78.0,30\n"),
            &FilterStore::new(),
            &lookup(),
        );
        assert_eq!(update.layers[0].len(), 2);
        assert_eq!(update.skipped.len(), 1);
        assert!(matches!(&update.skipped[0], DashError::UnknownStation(id) if id == "999.0"));
    }

    #[test]
    fn highlight_tracks_origin_filter() {
        let mut model = MapLayerModel::new("from");
        let stations = lookup();
        let mut filter = FilterStore::new();
        filter.set("from", "74.0");
        let update = model.update(&traffic("72.0,1\n"), &filter, &stations);
        let highlight = &update.layers[2];
        assert_eq!(highlight.kind, LayerKind::HighlightMarker);
        assert_eq!(highlight.lats(), vec![41.0]);
        assert_eq!(highlight.points()[0].value, Some(50.0));

        filter.unset("from");
        let update = model.update(&traffic("72.0,1\n"), &filter, &stations);
        assert_eq!(update.layers.len(), 3);
        assert!(update.layers[2].is_empty());
    }

    #[test]
    fn popularity_is_stable_descending_top_twenty() {
        let stations: StationLookup = (0..30)
            .map(|i| (i.to_string(), Station { latitude: 40.0, longitude: -73.0 }))
            .collect();
        let rows: String = (0..30).map(|i| format!("{i},{}\n", if i % 2 == 0 { 5 } else { i })).collect();
        let mut model = MapLayerModel::new("from");
        let update = model.update(&traffic(&rows), &FilterStore::new(), &stations);
        assert_eq!(update.popularity.len(), POPULAR_STATIONS);
        assert_eq!(update.popularity[0].station, "29");
        assert!(update.popularity.windows(2).all(|w| w[0].traffic >= w[1].traffic));

        let ties: Vec<&str> = update
            .popularity
            .iter()
            .filter(|r| r.traffic == 5.0)
            .map(|r| r.station.as_str())
            .collect();
        assert_eq!(ties.first(), Some(&"0"));
        assert!(ties.windows(2).all(|w| w[0].parse::<u32>().unwrap() < w[1].parse::<u32>().unwrap()));
    }

    #[test]
    fn center_is_computed_once() {
        let mut model = MapLayerModel::new("from");
        let stations = lookup();
        let first = model.update(&traffic("72.0,1\n74.0,1\n"), &FilterStore::new(), &stations);
        let view = first.center_hint.expect("first update centres the map");
        assert_relative_eq!(view.center_lat, 40.5);
        assert_relative_eq!(view.center_lon, -73.5);

        let second = model.update(&traffic("78.0,1\n"), &FilterStore::new(), &stations);
        assert_eq!(second.center_hint, None);
        assert_eq!(model.view(), Some(view));
    }

    #[test]
    fn repeated_update_is_identical_apart_from_center_hint() {
        let mut model = MapLayerModel::new("from");
        let stations = lookup();
        let mut filter = FilterStore::new();
        filter.set("from", "72.0");
        let rows = traffic("72.0,3\n74.0,9\n");
        let a = model.update(&rows, &filter, &stations);
        let b = model.update(&rows, &filter, &stations);
        assert_eq!(a.layers, b.layers);
        assert_eq!(a.popularity, b.popularity);
        assert!(a.center_hint.is_some());
        assert!(b.center_hint.is_none());
    }

    #[test]
    fn empty_traffic_leaves_map_uncentred() {
        let mut model = MapLayerModel::new("from");
        let update = model.update(&Table::new(), &FilterStore::new(), &lookup());
        assert!(update.layers.iter().all(MapLayer::is_empty));
        assert!(update.center_hint.is_none());
        assert!(update.popularity.is_empty());
        assert!(model.view().is_none());
    }

    #[test]
    fn single_point_zoom_falls_back() {
        let view = MapView::fit(&[MapPoint::at(40.0, -73.0)]).unwrap();
        assert_relative_eq!(view.zoom, 12.0);
        let wide = MapView::fit(&[MapPoint::at(0.0, -180.0), MapPoint::at(0.0, 180.0)]).unwrap();
        assert_relative_eq!(wide.zoom, 1.0);
    }

    #[test]
    fn density_points_skip_two_rows() {
        let table = decode("header\njunk\n0,40.7,-73.9\n1,bad,-73.0\n2,40.8,-73.8\n");
        let points = density_points(table);
        assert_eq!(points, vec![MapPoint::at(40.7, -73.9), MapPoint::at(40.8, -73.8)]);
    }

    #[test]
    fn trace_arrays_stay_parallel() {
        let layer = MapLayer::new(LayerKind::BaseMarkers, "stations", LayerStyle::base_markers())
            .with_points(vec![
                MapPoint { lat: 1.0, lon: 2.0, text: Some("a".into()), value: Some(3.0) },
                MapPoint::at(4.0, 5.0),
            ]);
        let trace = layer.to_trace();
        assert_eq!(trace["type"], "scattermapbox");
        assert_eq!(trace["lat"].as_array().unwrap().len(), 2);
        assert_eq!(trace["text"].as_array().unwrap().len(), 2);
        assert_eq!(trace["marker"]["color"].as_array().unwrap().len(), 2);
        assert_eq!(trace["marker"]["cmin"], 3.0);
        assert_eq!(trace["hoverinfo"], "color+text");
    }
}
