// overlay.rs
//
// User-supplied event files drawn as extra map layers.

use std::fs;
use std::path::Path;

use geojson::{GeoJson, Value};
use tracing::{info, warn};

use crate::colorscale::ColorScale;
use crate::error::{DashError, Result};
use crate::map_layers::{LayerKind, LayerStyle, MapLayer, MapPoint};
use crate::tabular::{decode, field, header_index};

/// Builds an overlay from CSV text whose header names `latitude`,
/// `longitude`, `value` and `text` columns, in any order.
pub fn from_csv(name: &str, text: &str, color_scale: ColorScale) -> Result<MapLayer> {
    let table = decode(text);
    let Some((header, rows)) = table.split_first() else {
        return Err(DashError::Overlay(format!("{name} is empty")));
    };
    let locate = |column: &str| {
        header_index(header, column).ok_or_else(|| DashError::MissingColumn(column.to_string()))
    };
    let lat_idx = locate("latitude")?;
    let lon_idx = locate("longitude")?;
    let value_idx = header_index(header, "value");
    let text_idx = header_index(header, "text");

    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let (Ok(lat), Ok(lon)) = (
            field(row, lat_idx).trim().parse::<f64>(),
            field(row, lon_idx).trim().parse::<f64>(),
        ) else {
            warn!(overlay = name, ?row, "skipping event without coordinates");
            continue;
        };
        points.push(MapPoint {
            lat,
            lon,
            text: text_idx.map(|i| field(row, i).to_string()),
            value: value_idx.and_then(|i| field(row, i).trim().parse().ok()),
        });
    }
    Ok(uploaded_layer(name, color_scale, points))
}

/// Builds an overlay from a GeoJSON document. Point and MultiPoint
/// geometries are drawn; `text` and `value` properties label and color them.
pub fn from_geojson(name: &str, text: &str, color_scale: ColorScale) -> Result<MapLayer> {
    let geojson: GeoJson = text
        .parse()
        .map_err(|e| DashError::Overlay(format!("{name}: {e}")))?;

    let mut points = Vec::new();
    let mut push_geometry = |geometry: &geojson::Geometry, label: Option<String>, value: Option<f64>| {
        let positions: Vec<&Vec<f64>> = match &geometry.value {
            Value::Point(c) => vec![c],
            Value::MultiPoint(coords) => coords.iter().collect(),
            _ => Vec::new(),
        };
        for c in positions {
            // GeoJSON positions are [lon, lat, ...].
            if let [lon, lat, ..] = c.as_slice() {
                points.push(MapPoint {
                    lat: *lat,
                    lon: *lon,
                    text: label.clone(),
                    value,
                });
            }
        }
    };

    match geojson {
        GeoJson::FeatureCollection(collection) => {
            for feature in &collection.features {
                if let Some(geometry) = &feature.geometry {
                    let (label, value) = feature_properties(feature);
                    push_geometry(geometry, label, value);
                }
            }
        }
        GeoJson::Feature(feature) => {
            if let Some(geometry) = &feature.geometry {
                let (label, value) = feature_properties(&feature);
                push_geometry(geometry, label, value);
            }
        }
        GeoJson::Geometry(geometry) => push_geometry(&geometry, None, None),
    }
    Ok(uploaded_layer(name, color_scale, points))
}

fn feature_properties(feature: &geojson::Feature) -> (Option<String>, Option<f64>) {
    let label = feature.property("text").map(|v| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    let value = feature.property("value").and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });
    (label, value)
}

fn uploaded_layer(name: &str, color_scale: ColorScale, points: Vec<MapPoint>) -> MapLayer {
    info!(overlay = name, points = points.len(), %color_scale, "overlay loaded");
    MapLayer::new(LayerKind::UploadedOverlay, name, LayerStyle::uploaded(color_scale)).with_points(points)
}

/// Reads an overlay file, choosing the parser by extension.
pub fn load(path: &Path, color_scale: ColorScale) -> Result<MapLayer> {
    let text = fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("overlay")
        .to_string();
    match path.extension().and_then(|e| e.to_str()) {
        Some("geojson") | Some("json") => from_geojson(&name, &text, color_scale),
        _ => from_csv(&name, &text, color_scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_columns_in_any_order() {
        let text = "text,value,longitude,latitude\nfire,3,-73.9,40.7\nflood,9,-74.0,40.8\n";
        let layer = from_csv("events", text, ColorScale::Hot).unwrap();
        assert_eq!(layer.kind, LayerKind::UploadedOverlay);
        assert_eq!(layer.lats(), vec![40.7, 40.8]);
        assert_eq!(layer.lons(), vec![-73.9, -74.0]);
        assert_eq!(layer.points()[1].text.as_deref(), Some("flood"));
        assert_eq!(layer.color_domain(), Some((3.0, 9.0)));
        assert_eq!(layer.style.marker_size, 16.0);
    }

    #[test]
    fn csv_without_coordinates_is_rejected() {
        let err = from_csv("events", "text,value\na,1\n", ColorScale::Jet).unwrap_err();
        assert!(matches!(err, DashError::MissingColumn(c) if c == "latitude"));
        assert!(from_csv("events", "", ColorScale::Jet).is_err());
    }

    #[test]
    fn geojson_points_with_properties() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {"text": "a", "value": 2},
                 "geometry": {"type": "Point", "coordinates": [-73.9, 40.7]}},
                {"type": "Feature", "properties": {"value": "4"},
                 "geometry": {"type": "MultiPoint", "coordinates": [[-74.0, 40.8], [-74.1, 40.9]]}},
                {"type": "Feature", "properties": null,
                 "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
            ]
        }"#;
        let layer = from_geojson("events", text, ColorScale::Viridis).unwrap();
        assert_eq!(layer.len(), 3);
        assert_eq!(layer.points()[0].text.as_deref(), Some("a"));
        assert_eq!(layer.points()[2].value, Some(4.0));
        assert_eq!(layer.lats(), vec![40.7, 40.8, 40.9]);
    }

    #[test]
    fn load_picks_parser_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crashes.csv");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "latitude,longitude,text,value").unwrap();
        writeln!(file, "40.7,-73.9,x,1").unwrap();
        let layer = load(&path, ColorScale::Reds).unwrap();
        assert_eq!(layer.name, "crashes");
        assert_eq!(layer.len(), 1);

        let bad = dir.path().join("broken.geojson");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(load(&bad, ColorScale::Reds), Err(DashError::Overlay(_))));
    }
}
