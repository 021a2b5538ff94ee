// render.rs

use tracing::{debug, info, warn};

use crate::backend::{Backend, parse_columns};
use crate::error::Result;
use crate::filter::FilterStore;
use crate::grid::{PlotBoard, PlotId};
use crate::map_layers::{LayerKind, MapLayer, MapLayerModel, MapView, RankedStation, density_points};
use crate::plotter::{self, PlotKind};
use crate::queries::{self, QueryId, QueryResults};
use crate::stations::StationLookup;
use crate::tabular::{Table, decode, skip_rows};

/// Leading rows of a traffic response that never carry data.
pub const TRAFFIC_SKIP_ROWS: usize = 2;

/// Per-session knobs of the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub project: String,
    /// Filter column holding the trip-origin station.
    pub origin_column: String,
    pub hover_select: bool,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            project: "citibike".to_string(),
            origin_column: "from".to_string(),
            hover_select: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterListEntry {
    pub column: String,
    pub value: Option<String>,
}

/// Every known column with its current constraint, dealt alternately into
/// a left and a right column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterListView {
    pub left: Vec<FilterListEntry>,
    pub right: Vec<FilterListEntry>,
}

impl FilterListView {
    pub fn build(columns: &[String], filters: &FilterStore) -> Self {
        let mut view = Self::default();
        let mut on_left = true;
        for column in columns {
            let entry = FilterListEntry {
                column: column.clone(),
                value: filters.get(column).map(String::from),
            };
            if on_left {
                view.left.push(entry);
            } else {
                view.right.push(entry);
            }
            on_left = !on_left;
        }
        view
    }

    /// Entries in column order (left, right, left, ...).
    pub fn entries(&self) -> Vec<&FilterListEntry> {
        let mut entries = Vec::with_capacity(self.left.len() + self.right.len());
        for i in 0..self.left.len().max(self.right.len()) {
            entries.extend(self.left.get(i));
            entries.extend(self.right.get(i));
        }
        entries
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    Hover,
    Click,
}

/// A pointer event on a map point or popularity bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionEvent {
    pub kind: SelectionKind,
    pub layer: LayerKind,
    pub station: String,
}

impl SelectionEvent {
    pub fn hover(station: impl Into<String>) -> Self {
        Self {
            kind: SelectionKind::Hover,
            layer: LayerKind::BaseMarkers,
            station: station.into(),
        }
    }

    pub fn click(station: impl Into<String>) -> Self {
        Self {
            kind: SelectionKind::Click,
            layer: LayerKind::BaseMarkers,
            station: station.into(),
        }
    }
}

/// What the map panel shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapFrame {
    pub layers: Vec<MapLayer>,
    pub view: Option<MapView>,
    pub popularity: Vec<RankedStation>,
}

impl MapFrame {
    pub fn layer(&self, kind: LayerKind) -> Option<&MapLayer> {
        self.layers.iter().find(|layer| layer.kind == kind)
    }
}

/// Output of the latest render pass. Each pass replaces it wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderFrame {
    pub filter_list: FilterListView,
    pub map: MapFrame,
    pub skipped_rows: usize,
}

/// Owns the dashboard's state and re-renders it after every filter change.
pub struct RenderCoordinator<B> {
    backend: B,
    settings: DashboardSettings,
    columns: Vec<String>,
    stations: StationLookup,
    filters: FilterStore,
    map: MapLayerModel,
    board: PlotBoard,
    queries: QueryResults,
    frame: RenderFrame,
    renders: u64,
}

impl<B: Backend> RenderCoordinator<B> {
    /// Loads the column list, station table and density overlay, then runs
    /// the first render. Any of the three may fail; the dashboard starts
    /// with that part empty.
    pub fn start(backend: B, settings: DashboardSettings) -> Self {
        let columns = match backend.columns() {
            Ok(text) => parse_columns(&text),
            Err(e) => {
                warn!(error = %e, "could not list columns");
                Vec::new()
            }
        };
        let stations = backend
            .vertices()
            .and_then(|text| StationLookup::from_table(&decode(&text)))
            .unwrap_or_else(|e| {
                warn!(error = %e, "could not load stations");
                StationLookup::default()
            });

        let mut map = MapLayerModel::new(settings.origin_column.clone());
        match backend.density() {
            Ok(text) => map.set_density(density_points(decode(&text))),
            Err(e) => warn!(error = %e, "could not load density overlay"),
        }

        info!(
            project = %settings.project,
            columns = columns.len(),
            stations = stations.len(),
            "dashboard starting"
        );
        let mut coordinator = Self {
            backend,
            settings,
            columns,
            stations,
            filters: FilterStore::new(),
            map,
            board: PlotBoard::new(),
            queries: QueryResults::new(),
            frame: RenderFrame::default(),
            renders: 0,
        };
        coordinator.render();
        coordinator
    }

    /// Rebuilds the filter list, fetches traffic under the current filters
    /// and recomputes the map. A failed fetch keeps the previous map.
    pub fn render(&mut self) -> &RenderFrame {
        self.renders += 1;
        let filter_list = FilterListView::build(&self.columns, &self.filters);

        let (map, skipped_rows) = match self.backend.traffic(&self.filters) {
            Ok(text) => {
                let rows = skip_rows(decode(&text), TRAFFIC_SKIP_ROWS);
                let update = self.map.update(&rows, &self.filters, &self.stations);
                let frame = MapFrame {
                    layers: update.layers,
                    view: self.map.view(),
                    popularity: update.popularity,
                };
                (frame, update.skipped.len())
            }
            Err(e) => {
                warn!(error = %e, "traffic fetch failed, keeping previous map");
                (self.frame.map.clone(), 0)
            }
        };

        debug!(pass = self.renders, filters = self.filters.len(), skipped_rows, "rendered");
        self.frame = RenderFrame {
            filter_list,
            map,
            skipped_rows,
        };
        &self.frame
    }

    pub fn set_filter(&mut self, column: &str, value: &str) {
        self.filters.set(column, value);
        self.render();
    }

    pub fn remove_filter(&mut self, column: &str) {
        self.filters.unset(column);
        self.render();
    }

    /// Applies a pointer event. Returns whether it changed the origin (and
    /// so re-rendered).
    pub fn on_selection(&mut self, event: &SelectionEvent) -> bool {
        if event.layer != LayerKind::BaseMarkers {
            return false;
        }
        let origin_column = self.settings.origin_column.clone();
        match event.kind {
            SelectionKind::Hover => {
                if !self.settings.hover_select
                    || self.filters.get(&origin_column) == Some(event.station.as_str())
                {
                    return false;
                }
            }
            SelectionKind::Click => self.settings.hover_select = false,
        }
        self.set_filter(&origin_column, &event.station);
        true
    }

    /// Bar chart of how many movements each value of `column` has.
    pub fn plot_column(&mut self, column: &str) -> Result<PlotId> {
        let index_name: String = column
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let create = format!("create index if not exists {index_name}_index on movements(`{column}`)");
        if let Err(e) = self.backend.sql(&create) {
            debug!(error = %e, column, "index creation failed");
        }

        let body = self
            .backend
            .sql(&format!("select `{column}`, count(*) from movements group by `{column}`"))?;
        let (table, has_index) = queries::decode_result(&body);
        let table = if has_index { queries::without_index(&table) } else { table };
        let spec = plotter::plot(
            PlotKind::Bar,
            &table,
            &format!("How many movements for each type of {column}"),
        )
        .with_axes(column, "Count");
        Ok(self.board.place_plot(spec).id)
    }

    /// Appends an overlay layer and redraws.
    pub fn add_overlay(&mut self, layer: MapLayer) {
        self.map.add_overlay(layer);
        self.render();
    }

    pub fn submit_query(&mut self, label: &str, query: &str) -> Result<QueryId> {
        self.queries.submit(&self.backend, label, query)
    }

    pub fn preview_query(&self, query: &str) -> Option<Table> {
        queries::preview(&self.backend, query)
    }

    pub fn remove_query(&mut self, id: QueryId) -> bool {
        self.queries.remove(id).is_some()
    }

    pub fn plot_query(&mut self, id: QueryId, kind: PlotKind) -> Option<PlotId> {
        let spec = self.queries.get(id)?.plot(kind);
        Some(self.board.place_plot(spec).id)
    }

    pub fn remove_plot(&mut self, id: PlotId) -> bool {
        self.board.remove(id).is_some()
    }

    pub fn frame(&self) -> &RenderFrame {
        &self.frame
    }

    pub fn filters(&self) -> &FilterStore {
        &self.filters
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn stations(&self) -> &StationLookup {
        &self.stations
    }

    pub fn board(&self) -> &PlotBoard {
        &self.board
    }

    pub fn queries(&self) -> &QueryResults {
        &self.queries
    }

    pub fn settings(&self) -> &DashboardSettings {
        &self.settings
    }

    pub fn hover_select(&self) -> bool {
        self.settings.hover_select
    }

    pub fn set_hover_select(&mut self, enabled: bool) {
        self.settings.hover_select = enabled;
    }

    /// Render passes run so far, the first one included.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
