// plotter.rs

use serde::Serialize;
use tracing::warn;

use crate::tabular::{Table, field, header_index};

/// Default viewport of a geo scatter plot (lower Manhattan).
pub const GEO_CENTER: (f64, f64) = (40.73, -73.99);
pub const GEO_ZOOM: f64 = 11.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlotKind {
    Bar,
    Line,
    Histogram,
    GeoScatter,
}

impl PlotKind {
    pub const ALL: [PlotKind; 4] = [
        PlotKind::Bar,
        PlotKind::Line,
        PlotKind::Histogram,
        PlotKind::GeoScatter,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PlotKind::Bar => "bar chart",
            PlotKind::Line => "line chart",
            PlotKind::Histogram => "histogram",
            PlotKind::GeoScatter => "map",
        }
    }
}

/// One series, in the chart library's trace vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trace {
    Bar {
        name: String,
        x: Vec<String>,
        y: Vec<Option<f64>>,
    },
    Scatter {
        name: String,
        x: Vec<String>,
        y: Vec<Option<f64>>,
    },
    Histogram {
        x: Vec<String>,
    },
    #[serde(rename = "scattermapbox")]
    ScatterMapbox {
        lat: Vec<Option<f64>>,
        lon: Vec<Option<f64>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mapbox {
    pub bearing: f64,
    pub center: LatLon,
    pub pitch: f64,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct PlotLayout {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaxis: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapbox: Option<Mapbox>,
}

/// A self-contained chart: traces plus layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSpec {
    pub kind: PlotKind,
    pub title: String,
    pub traces: Vec<Trace>,
    pub layout: PlotLayout,
}

impl PlotSpec {
    pub fn empty(kind: PlotKind, title: &str) -> Self {
        Self {
            kind,
            title: title.to_string(),
            traces: Vec::new(),
            layout: PlotLayout {
                title: title.to_string(),
                ..PlotLayout::default()
            },
        }
    }

    pub fn with_axes(mut self, x: &str, y: &str) -> Self {
        self.layout.xaxis = Some(Axis { title: x.to_string() });
        self.layout.yaxis = Some(Axis { title: y.to_string() });
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "data": self.traces, "layout": self.layout })
    }
}

/// Turns a query result into a chart.
///
/// `table[0]` is the header. Bar, Line and Histogram read by position: the
/// first column is the x axis and every later column is one series named by
/// its header cell (Histogram uses the first column only). GeoScatter finds
/// its columns by name instead, `latitude` and `longitude`, wherever they sit.
pub fn plot(kind: PlotKind, table: &Table, title: &str) -> PlotSpec {
    let mut spec = PlotSpec::empty(kind, title);
    let Some((header, rows)) = table.split_first() else {
        return spec;
    };

    spec.traces = match kind {
        PlotKind::Bar | PlotKind::Line => {
            let x = column_text(rows, 0);
            (1..header.len())
                .map(|i| {
                    let name = header[i].clone();
                    let y = column_numbers(rows, i);
                    match kind {
                        PlotKind::Bar => Trace::Bar { name, x: x.clone(), y },
                        _ => Trace::Scatter { name, x: x.clone(), y },
                    }
                })
                .collect()
        }
        PlotKind::Histogram => vec![Trace::Histogram {
            x: column_text(rows, 0),
        }],
        PlotKind::GeoScatter => {
            spec.layout.mapbox = Some(Mapbox {
                bearing: 0.0,
                center: LatLon {
                    lat: GEO_CENTER.0,
                    lon: GEO_CENTER.1,
                },
                pitch: 0.0,
                zoom: GEO_ZOOM,
            });
            match (header_index(header, "latitude"), header_index(header, "longitude")) {
                (Some(lat), Some(lon)) => vec![Trace::ScatterMapbox {
                    lat: column_numbers(rows, lat),
                    lon: column_numbers(rows, lon),
                }],
                _ => {
                    warn!(title, ?header, "no latitude/longitude columns to map");
                    vec![Trace::ScatterMapbox {
                        lat: Vec::new(),
                        lon: Vec::new(),
                    }]
                }
            }
        }
    };
    spec
}

fn column_text(rows: &[Vec<String>], index: usize) -> Vec<String> {
    rows.iter().map(|row| field(row, index).to_string()).collect()
}

fn column_numbers(rows: &[Vec<String>], index: usize) -> Vec<Option<f64>> {
    rows.iter()
        .map(|row| field(row, index).trim().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::decode;

    #[test]
    fn bar_plots_one_series_per_column() {
        let table = decode("x,A,B\n1,10,20\n2,15,25\n");
        let spec = plot(PlotKind::Bar, &table, "sales");
        assert_eq!(spec.title, "sales");
        assert_eq!(
            spec.traces,
            vec![
                Trace::Bar {
                    name: "A".into(),
                    x: vec!["1".into(), "2".into()],
                    y: vec![Some(10.0), Some(15.0)],
                },
                Trace::Bar {
                    name: "B".into(),
                    x: vec!["1".into(), "2".into()],
                    y: vec![Some(20.0), Some(25.0)],
                },
            ]
        );
    }

    #[test]
    fn line_uses_scatter_traces() {
        let table = decode("x,A,B\n1,10,20\n2,15,25\n");
        let spec = plot(PlotKind::Line, &table, "t");
        assert_eq!(spec.traces.len(), 2);
        match &spec.traces[1] {
            Trace::Scatter { name, x, y } => {
                assert_eq!(name, "B");
                assert_eq!(x, &vec!["1".to_string(), "2".to_string()]);
                assert_eq!(y, &vec![Some(20.0), Some(25.0)]);
            }
            other => panic!("expected scatter, got {other:?}"),
        }
    }

    #[test]
    fn histogram_uses_first_column_only() {
        let table = decode("hour,count\n8,3\n9,4\n8,1\n");
        let spec = plot(PlotKind::Histogram, &table, "hours");
        assert_eq!(
            spec.traces,
            vec![Trace::Histogram {
                x: vec!["8".into(), "9".into(), "8".into()]
            }]
        );
    }

    #[test]
    fn geo_scatter_finds_columns_by_name() {
        let table = decode("name,longitude,id,latitude\na,-73.9,1,40.7\nb,-74.0,2,40.8\n");
        let spec = plot(PlotKind::GeoScatter, &table, "where");
        assert_eq!(
            spec.traces,
            vec![Trace::ScatterMapbox {
                lat: vec![Some(40.7), Some(40.8)],
                lon: vec![Some(-73.9), Some(-74.0)],
            }]
        );
        let mapbox = spec.layout.mapbox.as_ref().unwrap();
        assert_eq!(mapbox.zoom, GEO_ZOOM);
    }

    #[test]
    fn geo_scatter_lookup_is_case_sensitive() {
        let table = decode("Latitude,Longitude\n40.7,-73.9\n");
        let spec = plot(PlotKind::GeoScatter, &table, "where");
        assert_eq!(
            spec.traces,
            vec![Trace::ScatterMapbox {
                lat: vec![],
                lon: vec![],
            }]
        );
    }

    #[test]
    fn non_numeric_values_become_gaps() {
        let table = decode("x,A\n1,n/a\n");
        match &plot(PlotKind::Bar, &table, "t").traces[0] {
            Trace::Bar { y, .. } => assert_eq!(y, &vec![None]),
            other => panic!("expected bar, got {other:?}"),
        }
    }

    #[test]
    fn empty_table_gives_empty_plot() {
        let spec = plot(PlotKind::Line, &Table::new(), "nothing");
        assert!(spec.traces.is_empty());
    }

    #[test]
    fn json_uses_trace_type_tags() {
        let table = decode("x,A\n1,2\n");
        let json = plot(PlotKind::Bar, &table, "t").with_axes("x", "Count").to_json();
        assert_eq!(json["data"][0]["type"], "bar");
        assert_eq!(json["layout"]["yaxis"]["title"], "Count");
        assert!(json["layout"].get("mapbox").is_none());
    }
}
