// export.rs

use std::error::Error;
use std::fs;
use std::path::Path;

use plotters::prelude::*;
use serde_json::{Value, json};
use tracing::info;

use crate::error::{DashError, Result};
use crate::map_layers::LayerKind;
use crate::plotter::{PlotKind, PlotSpec, Trace};
use crate::render::MapFrame;

const WIDTH: u32 = 1024;
const HEIGHT: u32 = 768;

// Series colors, cycled.
const SERIES_COLORS: [RGBColor; 6] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
];

/// Draws a plot to a PNG file.
pub fn export_plot(spec: &PlotSpec, path: &Path) -> Result<()> {
    let drawn = match spec.kind {
        PlotKind::Bar | PlotKind::Histogram => draw_bars(spec, path),
        PlotKind::Line => draw_lines(spec, path),
        PlotKind::GeoScatter => draw_geo(spec, path),
    };
    drawn.map_err(|e| DashError::Export(e.to_string()))?;
    write_sidecar(&spec.to_json(), path)?;
    info!(path = %path.display(), title = %spec.title, "plot exported");
    Ok(())
}

/// Draws the current map frame, every layer in order, to a PNG file.
pub fn export_map(frame: &MapFrame, path: &Path) -> Result<()> {
    draw_map(frame, path).map_err(|e| DashError::Export(e.to_string()))?;
    write_sidecar(&map_json(frame), path)?;
    info!(path = %path.display(), layers = frame.layers.len(), "map exported");
    Ok(())
}

/// Trace objects of every map layer plus the viewport.
fn map_json(frame: &MapFrame) -> Value {
    let layers: Vec<Value> = frame.layers.iter().map(|layer| layer.to_trace()).collect();
    json!({
        "layers": layers,
        "view": frame.view,
        "popularity": frame.popularity,
    })
}

/// Writes `value` beside the PNG at `path`, same stem, `.json` extension.
fn write_sidecar(value: &Value, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(|e| DashError::Export(e.to_string()))?;
    fs::write(path.with_extension("json"), text)?;
    Ok(())
}

/// Category labels and one `(name, values)` pair per series.
fn bar_series(spec: &PlotSpec) -> (Vec<String>, Vec<(String, Vec<f64>)>) {
    let mut categories: Vec<String> = Vec::new();
    let mut series = Vec::new();
    for trace in &spec.traces {
        match trace {
            Trace::Bar { name, x, y } | Trace::Scatter { name, x, y } => {
                if categories.is_empty() {
                    categories = x.clone();
                }
                series.push((name.clone(), y.iter().map(|v| v.unwrap_or(0.0)).collect()));
            }
            Trace::Histogram { x } => {
                // Count each distinct value, first-seen order.
                let mut counts: Vec<(String, f64)> = Vec::new();
                for value in x {
                    match counts.iter_mut().find(|(v, _)| v == value) {
                        Some((_, n)) => *n += 1.0,
                        None => counts.push((value.clone(), 1.0)),
                    }
                }
                categories = counts.iter().map(|(v, _)| v.clone()).collect();
                series.push(("count".to_string(), counts.into_iter().map(|(_, n)| n).collect()));
            }
            Trace::ScatterMapbox { .. } => {}
        }
    }
    (categories, series)
}

fn y_range(series: &[(String, Vec<f64>)]) -> (f64, f64) {
    let values = series.iter().flat_map(|(_, ys)| ys.iter().copied());
    let (min, max) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max > min { (min, max * 1.05) } else { (min, min + 1.0) }
}

fn draw_bars(spec: &PlotSpec, path: &Path) -> std::result::Result<(), Box<dyn Error>> {
    let (categories, series) = bar_series(spec);
    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let n = categories.len().max(1);
    let (y_min, y_max) = y_range(&series);
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(&spec.title, ("sans-serif", 30).into_font())
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5..(n as f64 - 0.5), y_min..y_max)?;

    let label_for = |x: &f64| {
        let i = x.round();
        if (x - i).abs() < 1e-6 && i >= 0.0 {
            categories.get(i as usize).cloned().unwrap_or_default()
        } else {
            String::new()
        }
    };
    let mut mesh = chart.configure_mesh();
    mesh.x_labels(n.min(20)).x_label_formatter(&label_for);
    if let Some(axis) = &spec.layout.xaxis {
        mesh.x_desc(axis.title.as_str());
    }
    if let Some(axis) = &spec.layout.yaxis {
        mesh.y_desc(axis.title.as_str());
    }
    mesh.draw()?;

    let width = 0.8 / series.len().max(1) as f64;
    for (s, (name, values)) in series.iter().enumerate() {
        let color = SERIES_COLORS[s % SERIES_COLORS.len()];
        chart
            .draw_series(values.iter().enumerate().map(|(i, v)| {
                let left = i as f64 - 0.4 + s as f64 * width;
                Rectangle::new([(left, 0.0), (left + width, *v)], color.filled())
            }))?
            .label(name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }
    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

fn draw_lines(spec: &PlotSpec, path: &Path) -> std::result::Result<(), Box<dyn Error>> {
    let (categories, series) = bar_series(spec);
    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let n = categories.len().max(2);
    let (y_min, y_max) = y_range(&series);
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(&spec.title, ("sans-serif", 30).into_font())
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0.0..(n as f64 - 1.0), y_min..y_max)?;

    let label_for = |x: &f64| {
        categories
            .get(x.round().max(0.0) as usize)
            .cloned()
            .unwrap_or_default()
    };
    chart
        .configure_mesh()
        .x_labels(n.min(20))
        .x_label_formatter(&label_for)
        .draw()?;

    for (s, (name, values)) in series.iter().enumerate() {
        let color = SERIES_COLORS[s % SERIES_COLORS.len()];
        chart
            .draw_series(LineSeries::new(
                values.iter().enumerate().map(|(i, v)| (i as f64, *v)),
                &color,
            ))?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Padded lon/lat window around `points`, clamped to the globe.
fn geo_window(points: &[(f64, f64)]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    if points.is_empty() {
        return (-180.0..180.0, -90.0..90.0);
    }
    let (mut min_lon, mut min_lat) = (f64::MAX, f64::MAX);
    let (mut max_lon, mut max_lat) = (f64::MIN, f64::MIN);
    for &(lon, lat) in points {
        min_lon = min_lon.min(lon);
        max_lon = max_lon.max(lon);
        min_lat = min_lat.min(lat);
        max_lat = max_lat.max(lat);
    }
    let pad_lon = ((max_lon - min_lon) * 0.05).max(0.01);
    let pad_lat = ((max_lat - min_lat) * 0.05).max(0.01);
    (
        (min_lon - pad_lon).max(-180.0)..(max_lon + pad_lon).min(180.0),
        (min_lat - pad_lat).max(-90.0)..(max_lat + pad_lat).min(90.0),
    )
}

fn draw_geo(spec: &PlotSpec, path: &Path) -> std::result::Result<(), Box<dyn Error>> {
    let points: Vec<(f64, f64)> = spec
        .traces
        .iter()
        .flat_map(|trace| match trace {
            Trace::ScatterMapbox { lat, lon } => lat
                .iter()
                .zip(lon)
                .filter_map(|(lat, lon)| Some(((*lon)?, (*lat)?)))
                .collect::<Vec<_>>(),
            _ => Vec::new(),
        })
        .collect();

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&RGBColor(173, 216, 230))?;
    let (x_range, y_range) = geo_window(&points);
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption(&spec.title, ("sans-serif", 30).into_font())
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)?;
    chart.configure_mesh().draw()?;
    chart.draw_series(
        points
            .iter()
            .map(|&(lon, lat)| Circle::new((lon, lat), 4, SERIES_COLORS[0].filled())),
    )?;

    root.present()?;
    Ok(())
}

fn draw_map(frame: &MapFrame, path: &Path) -> std::result::Result<(), Box<dyn Error>> {
    let all: Vec<(f64, f64)> = frame
        .layers
        .iter()
        .flat_map(|layer| layer.points().iter().map(|p| (p.lon, p.lat)))
        .collect();

    let root = BitMapBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&RGBColor(173, 216, 230))?;
    let (x_range, y_range) = geo_window(&all);
    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .caption("Traffic by station", ("sans-serif", 30).into_font())
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(x_range, y_range)?;
    chart.configure_mesh().draw()?;

    // Highlight goes underneath the markers so it reads as an outline.
    let order = [
        LayerKind::DensityOverlay,
        LayerKind::HighlightMarker,
        LayerKind::BaseMarkers,
        LayerKind::UploadedOverlay,
    ];
    for kind in order {
        for layer in frame.layers.iter().filter(|layer| layer.kind == kind) {
            let radius = match kind {
                LayerKind::DensityOverlay => 2,
                _ => (layer.style.marker_size / 2.0).round().max(1.0) as i32,
            };
            chart.draw_series(layer.points().iter().map(|point| {
                let color = match layer.point_color(point) {
                    Some((r, g, b)) => RGBColor(r, g, b).filled(),
                    None => RGBColor(80, 80, 80).mix(0.4).filled(),
                };
                Circle::new((point.lon, point.lat), radius, color)
            }))?;
        }
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plotter::plot;
    use crate::tabular::decode;

    #[test]
    fn histogram_counts_distinct_values() {
        let spec = plot(PlotKind::Histogram, &decode("hour\n8\n9\n8\n"), "h");
        let (categories, series) = bar_series(&spec);
        assert_eq!(categories, vec!["8", "9"]);
        assert_eq!(series, vec![("count".to_string(), vec![2.0, 1.0])]);
    }

    #[test]
    fn bar_series_fill_gaps_with_zero() {
        let spec = plot(PlotKind::Bar, &decode("x,A\na,1\nb,n/a\n"), "t");
        let (_, series) = bar_series(&spec);
        assert_eq!(series[0].1, vec![1.0, 0.0]);
    }

    #[test]
    fn geo_window_pads_and_clamps() {
        let (x, y) = geo_window(&[(-73.9, 40.7), (-74.1, 40.9)]);
        assert!(x.start < -74.1 && x.end > -73.9);
        assert!(y.start < 40.7 && y.end > 40.9);
        let (x, y) = geo_window(&[]);
        assert_eq!((x.start, x.end, y.start, y.end), (-180.0, 180.0, -90.0, 90.0));
    }

    #[test]
    fn sidecar_sits_next_to_png() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("plot-1.png");
        let spec = plot(PlotKind::Bar, &decode("x,A\na,1\n"), "t");
        write_sidecar(&spec.to_json(), &png).unwrap();

        let text = fs::read_to_string(dir.path().join("plot-1.json")).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, spec.to_json());
    }

    #[test]
    fn map_json_lists_layers_in_order() {
        use crate::map_layers::{LayerStyle, MapLayer, MapPoint};
        let frame = MapFrame {
            layers: vec![
                MapLayer::new(LayerKind::BaseMarkers, "stations", LayerStyle::base_markers())
                    .with_points(vec![MapPoint::at(40.0, -74.0)]),
                MapLayer::new(LayerKind::DensityOverlay, "density", LayerStyle::density()),
            ],
            view: None,
            popularity: Vec::new(),
        };
        let value = map_json(&frame);
        let layers = value["layers"].as_array().unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0]["type"], "scattermapbox");
        assert_eq!(layers[1]["type"], "densitymapbox");
        assert!(value["view"].is_null());
    }

    #[test]
    fn every_plot_kind_exports_png_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let tables = [
            ("full", "name,latitude,longitude\na,40.7,-74.0\nb,40.8,-73.9\n"),
            ("single", "name,latitude,longitude\na,40.7,-74.0\n"),
            ("empty", ""),
        ];
        for (label, text) in tables {
            for kind in PlotKind::ALL {
                let spec = plot(kind, &decode(text), label);
                let png = dir.path().join(format!("{kind:?}-{label}.png"));
                export_plot(&spec, &png).unwrap();
                assert!(png.exists(), "{} missing", png.display());
                assert!(png.with_extension("json").exists());
            }
        }
    }

    #[test]
    fn map_frame_exports_png_and_json() {
        use crate::map_layers::{LayerStyle, MapLayer, MapPoint};
        let dir = tempfile::tempdir().unwrap();
        let frame = MapFrame {
            layers: vec![
                MapLayer::new(LayerKind::BaseMarkers, "stations", LayerStyle::base_markers())
                    .with_points(vec![
                        MapPoint {
                            value: Some(5.0),
                            ..MapPoint::at(40.7, -74.0)
                        },
                        MapPoint {
                            value: Some(9.0),
                            ..MapPoint::at(40.8, -73.9)
                        },
                    ]),
                MapLayer::new(LayerKind::DensityOverlay, "density", LayerStyle::density())
                    .with_points(vec![MapPoint::at(40.75, -73.95)]),
                MapLayer::new(LayerKind::HighlightMarker, "origin", LayerStyle::highlight()),
            ],
            view: None,
            popularity: Vec::new(),
        };
        for (name, frame) in [("map", frame), ("blank", MapFrame::default())] {
            let png = dir.path().join(format!("{name}.png"));
            export_map(&frame, &png).unwrap();
            assert!(png.exists());
            assert!(dir.path().join(format!("{name}.json")).exists());
        }
    }

    #[test]
    fn y_range_includes_zero() {
        let (lo, hi) = y_range(&[("a".into(), vec![5.0, 10.0])]);
        assert_eq!(lo, 0.0);
        assert!(hi > 10.0);
        assert_eq!(y_range(&[]), (0.0, 1.0));
    }
}
