// app.rs

use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{info, warn};

use tripviz::backend::Backend;
use tripviz::colorscale::ColorScale;
use tripviz::export;
use tripviz::overlay;
use tripviz::plotter::PlotKind;
use tripviz::render::{RenderCoordinator, SelectionEvent};
use tripviz::tabular::Table;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentScreen {
    Dashboard,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Navigation,
    EditingFilterValue,
    EditingQueryName,
    EditingQuery,
    EditingOverlayPath,
    EditingOverlayScale,
}

/// Panel that navigation keys act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Filters,
    Stations,
    Queries,
    Plots,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Filters => Focus::Stations,
            Focus::Stations => Focus::Queries,
            Focus::Queries => Focus::Plots,
            Focus::Plots => Focus::Filters,
        }
    }
}

/// Single-line text field with a char-based cursor.
#[derive(Debug, Clone, Default)]
pub struct InputBuffer {
    pub text: String,
    pub cursor: usize,
}

impl InputBuffer {
    pub fn set(&mut self, text: &str) {
        self.text = text.to_string();
        self.cursor = self.text.chars().count();
    }

    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.text
            .char_indices()
            .nth(cursor)
            .map_or(self.text.len(), |(i, _)| i)
    }

    /// Applies an editing key. Returns whether the text changed.
    pub fn edit(&mut self, code: KeyCode) -> bool {
        let len = self.text.chars().count();
        match code {
            KeyCode::Char(c) => {
                let at = self.byte_index(self.cursor);
                self.text.insert(at, c);
                self.cursor += 1;
                true
            }
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                let at = self.byte_index(self.cursor);
                self.text.remove(at);
                true
            }
            KeyCode::Delete if self.cursor < len => {
                let at = self.byte_index(self.cursor);
                self.text.remove(at);
                true
            }
            KeyCode::Left => {
                self.cursor = self.cursor.saturating_sub(1);
                false
            }
            KeyCode::Right => {
                self.cursor = (self.cursor + 1).min(len);
                false
            }
            KeyCode::Home => {
                self.cursor = 0;
                false
            }
            KeyCode::End => {
                self.cursor = len;
                false
            }
            _ => false,
        }
    }
}

pub struct App<B> {
    pub current_screen: CurrentScreen,
    pub current_mode: AppMode,
    pub focus: Focus,
    pub dashboard: RenderCoordinator<B>,

    // Selection within each panel
    pub selected_filter: usize,
    pub selected_station: usize,
    pub selected_query: usize,
    pub selected_plot: usize,

    pub input: InputBuffer,
    pending_query_name: String,
    pending_overlay_path: String,
    pub preview: Option<Table>,

    pub notification: String,
    pub help_keybinds: Vec<String>,
    pub output_dir: PathBuf,

    pub left_pane_width_percentage: u16,
    pub quit: bool,
}

impl<B: Backend> App<B> {
    pub fn new(dashboard: RenderCoordinator<B>, output_dir: PathBuf) -> Self {
        let notification = format!(
            "Project '{}': {} columns, {} stations",
            dashboard.settings().project,
            dashboard.columns().len(),
            dashboard.stations().len()
        );
        App {
            current_screen: CurrentScreen::Dashboard,
            current_mode: AppMode::Navigation,
            focus: Focus::Filters,
            dashboard,

            selected_filter: 0,
            selected_station: 0,
            selected_query: 0,
            selected_plot: 0,

            input: InputBuffer::default(),
            pending_query_name: String::new(),
            pending_overlay_path: String::new(),
            preview: None,

            notification,
            help_keybinds: vec![
                "Tab: Cycle panel (filters, stations, queries, plots)".to_string(),
                "J/K or Arrow Keys: Move selection".to_string(),
                "Enter (filters): Set value of selected column".to_string(),
                "X (filters): Remove filter".to_string(),
                "P (filters): Plot movements per value of column".to_string(),
                "Moving over a station: Select it as origin (hover mode)".to_string(),
                "Enter (stations): Pin station as origin".to_string(),
                "V: Toggle hover-select".to_string(),
                "N: New query (name, then query text)".to_string(),
                "1/2/3/4 (queries): Plot as bar, line, histogram, map".to_string(),
                "D: Remove selected query or plot".to_string(),
                "E (plots): Export plot to PNG".to_string(),
                "M: Export map to PNG".to_string(),
                "U: Load events overlay (CSV or GeoJSON)".to_string(),
                "[ / ]: Resize panels".to_string(),
                "H: Show Help screen".to_string(),
                "Q: Quit the application".to_string(),
            ],
            output_dir,

            left_pane_width_percentage: 50,
            quit: false,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit = true;
            return;
        }
        match self.current_mode {
            AppMode::Navigation => self.handle_navigation(key.code),
            _ => self.handle_editing(key.code),
        }
    }

    fn handle_navigation(&mut self, code: KeyCode) {
        if self.current_screen == CurrentScreen::Help {
            if matches!(code, KeyCode::Char('q') | KeyCode::Char('h') | KeyCode::Esc) {
                self.current_screen = CurrentScreen::Dashboard;
            }
            return;
        }
        match code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Char('h') | KeyCode::Char('?') => self.current_screen = CurrentScreen::Help,
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('[') => {
                self.left_pane_width_percentage = self.left_pane_width_percentage.saturating_sub(5).max(20)
            }
            KeyCode::Char(']') => {
                self.left_pane_width_percentage = (self.left_pane_width_percentage + 5).min(80)
            }
            KeyCode::Char('v') => {
                let enabled = !self.dashboard.hover_select();
                self.dashboard.set_hover_select(enabled);
                self.notification = format!("Hover-select {}", if enabled { "on" } else { "off" });
            }
            KeyCode::Char('n') => {
                self.input.take();
                self.preview = None;
                self.current_mode = AppMode::EditingQueryName;
                self.notification = "Name for the new query:".to_string();
            }
            KeyCode::Char('u') => {
                self.input.take();
                self.current_mode = AppMode::EditingOverlayPath;
                self.notification = "Path of the events file (.csv or .geojson):".to_string();
            }
            KeyCode::Char('m') => self.export_map(),
            _ => match self.focus {
                Focus::Filters => self.handle_filters_key(code),
                Focus::Stations => self.handle_stations_key(code),
                Focus::Queries => self.handle_queries_key(code),
                Focus::Plots => self.handle_plots_key(code),
            },
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let step = |index: usize, len: usize| -> usize {
            if len == 0 {
                0
            } else {
                (index as isize + delta).clamp(0, len as isize - 1) as usize
            }
        };
        match self.focus {
            Focus::Filters => {
                self.selected_filter = step(self.selected_filter, self.dashboard.columns().len())
            }
            Focus::Stations => {
                let len = self.dashboard.frame().map.popularity.len();
                let before = self.selected_station;
                self.selected_station = step(before, len);
                if self.selected_station != before {
                    if let Some(station) = self.selected_station_id() {
                        if self.dashboard.on_selection(&SelectionEvent::hover(station.clone())) {
                            self.notification = format!("Origin set to station {station}");
                        }
                    }
                }
            }
            Focus::Queries => self.selected_query = step(self.selected_query, self.dashboard.queries().len()),
            Focus::Plots => self.selected_plot = step(self.selected_plot, self.dashboard.board().plots().len()),
        }
    }

    /// Column under the cursor, in the filter list's display order.
    pub fn selected_column(&self) -> Option<String> {
        self.dashboard
            .frame()
            .filter_list
            .entries()
            .get(self.selected_filter)
            .map(|entry| entry.column.clone())
    }

    fn selected_station_id(&self) -> Option<String> {
        self.dashboard
            .frame()
            .map
            .popularity
            .get(self.selected_station)
            .map(|ranked| ranked.station.clone())
    }

    fn handle_filters_key(&mut self, code: KeyCode) {
        let Some(column) = self.selected_column() else {
            return;
        };
        match code {
            KeyCode::Enter => {
                let current = self.dashboard.filters().get(&column).unwrap_or("").to_string();
                self.input.set(&current);
                self.current_mode = AppMode::EditingFilterValue;
                self.notification = format!("Value for '{column}' (empty clears):");
            }
            KeyCode::Char('x') | KeyCode::Delete => {
                self.dashboard.remove_filter(&column);
                self.notification = format!("Removed filter on '{column}'");
            }
            KeyCode::Char('p') => match self.dashboard.plot_column(&column) {
                Ok(_) => self.notification = format!("Plotted movements per '{column}'"),
                Err(e) => {
                    warn!(error = %e, column = %column, "column plot failed");
                    self.notification = format!("Could not plot '{column}': {e}");
                }
            },
            _ => {}
        }
    }

    fn handle_stations_key(&mut self, code: KeyCode) {
        if code != KeyCode::Enter {
            return;
        }
        if let Some(station) = self.selected_station_id() {
            self.dashboard.on_selection(&SelectionEvent::click(station.clone()));
            self.notification = format!("Origin pinned to station {station}; hover-select off");
        }
    }

    fn handle_queries_key(&mut self, code: KeyCode) {
        let Some(id) = self
            .dashboard
            .queries()
            .iter()
            .nth(self.selected_query)
            .map(|result| result.id)
        else {
            return;
        };
        let kind = match code {
            KeyCode::Char('1') => PlotKind::Bar,
            KeyCode::Char('2') => PlotKind::Line,
            KeyCode::Char('3') => PlotKind::Histogram,
            KeyCode::Char('4') => PlotKind::GeoScatter,
            KeyCode::Char('d') => {
                self.dashboard.remove_query(id);
                self.selected_query = self.selected_query.saturating_sub(1);
                self.notification = "Query result removed".to_string();
                return;
            }
            _ => return,
        };
        if self.dashboard.plot_query(id, kind).is_some() {
            self.notification = format!("Plotted as {}", kind.label());
        }
    }

    fn handle_plots_key(&mut self, code: KeyCode) {
        let Some(plot) = self.dashboard.board().plots().get(self.selected_plot) else {
            return;
        };
        let id = plot.id;
        match code {
            KeyCode::Char('d') => {
                self.dashboard.remove_plot(id);
                self.selected_plot = self.selected_plot.saturating_sub(1);
                self.notification = "Plot removed".to_string();
            }
            KeyCode::Char('e') => {
                let path = self.output_dir.join(format!("plot-{id}.png"));
                let result = export::export_plot(&plot.spec, &path);
                self.report_export(result, &path);
            }
            _ => {}
        }
    }

    fn export_map(&mut self) {
        let path = self.output_dir.join("map.png");
        let result = export::export_map(&self.dashboard.frame().map, &path);
        self.report_export(result, &path);
    }

    fn report_export(&mut self, result: tripviz::Result<()>, path: &Path) {
        self.notification = match result {
            Ok(()) => format!("Saved {}", path.display()),
            Err(e) => {
                warn!(error = %e, "export failed");
                format!("Export failed: {e}")
            }
        };
    }

    fn handle_editing(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => {
                self.input.take();
                self.preview = None;
                self.current_mode = AppMode::Navigation;
                self.notification = "Cancelled".to_string();
            }
            KeyCode::Enter => self.confirm_input(),
            other => {
                let changed = self.input.edit(other);
                if changed && self.current_mode == AppMode::EditingQuery {
                    self.preview = self.dashboard.preview_query(&self.input.text);
                }
            }
        }
    }

    fn confirm_input(&mut self) {
        let text = self.input.take();
        match self.current_mode {
            AppMode::EditingFilterValue => {
                self.current_mode = AppMode::Navigation;
                if let Some(column) = self.selected_column() {
                    if text.is_empty() {
                        self.dashboard.remove_filter(&column);
                        self.notification = format!("Removed filter on '{column}'");
                    } else {
                        self.dashboard.set_filter(&column, &text);
                        self.notification = format!("Filtering {column} = {text}");
                    }
                }
            }
            AppMode::EditingQueryName => {
                self.pending_query_name = text;
                self.current_mode = AppMode::EditingQuery;
                self.notification = "Query text (preview updates as you type):".to_string();
            }
            AppMode::EditingQuery => {
                self.current_mode = AppMode::Navigation;
                self.preview = None;
                let name = std::mem::take(&mut self.pending_query_name);
                self.notification = match self.dashboard.submit_query(&name, &text) {
                    Ok(_) => {
                        self.selected_query = self.dashboard.queries().len().saturating_sub(1);
                        format!("Query '{name}' added")
                    }
                    Err(e) => format!("Query '{name}' failed: {e}"),
                };
            }
            AppMode::EditingOverlayPath => {
                self.pending_overlay_path = text;
                self.input.set("YlOrRd");
                self.current_mode = AppMode::EditingOverlayScale;
                self.notification = "Color scale (YlOrRd, Jet, Viridis, Blues, Reds, Greys, Hot):".to_string();
            }
            AppMode::EditingOverlayScale => {
                self.current_mode = AppMode::Navigation;
                let path = PathBuf::from(std::mem::take(&mut self.pending_overlay_path));
                let scale = text.parse::<ColorScale>().unwrap_or_else(|e| {
                    warn!(error = %e, "falling back to Viridis");
                    ColorScale::Viridis
                });
                self.notification = match overlay::load(&path, scale) {
                    Ok(layer) => {
                        let message = format!("Loaded {} events from {}", layer.len(), path.display());
                        self.dashboard.add_overlay(layer);
                        message
                    }
                    Err(e) => format!("Could not load {}: {e}", path.display()),
                };
            }
            AppMode::Navigation => {}
        }
        info!(mode = ?self.current_mode, "input confirmed");
    }
}
