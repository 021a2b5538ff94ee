// ui.rs

use std::collections::BTreeMap;

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Bar, BarChart, BarGroup, Block, Borders, Paragraph, Wrap,
        canvas::{Canvas, Map, MapResolution, Points},
    },
};

use tripviz::backend::Backend;
use tripviz::map_layers::{LayerKind, MapView};
use tripviz::render::MapFrame;

use crate::app::{App, AppMode, CurrentScreen, Focus};

pub fn render<B: Backend>(frame: &mut Frame, app: &App<B>) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)]) // Main content, then footer
        .split(frame.size());

    match app.current_screen {
        CurrentScreen::Help => render_help_screen(frame, app, main_layout[0]),
        CurrentScreen::Dashboard => render_dashboard(frame, app, main_layout[0]),
    }

    render_footer(frame, app, main_layout[1]);
}

/// Renders the help screen.
fn render_help_screen<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let block = Block::default()
        .title(" Help / Keybinds ")
        .title_style(Style::default().fg(Color::Yellow).bold())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let lines: Vec<Line> = app
        .help_keybinds
        .iter()
        .map(|s| Line::from(s.as_str()))
        .collect();
    let help = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::LightGreen));
    frame.render_widget(help, area);
}

fn editing(app_mode: AppMode) -> bool {
    app_mode != AppMode::Navigation
}

fn render_dashboard<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let mut constraints = vec![
        Constraint::Length(1), // Notification
        Constraint::Length(1), // Spacer
    ];
    if editing(app.current_mode) {
        constraints.push(Constraint::Length(1)); // Input line
    }
    constraints.push(Constraint::Min(0)); // Panels

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);
    let mut chunk_idx = 0;

    let notification = Paragraph::new(app.notification.clone())
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::White).bg(Color::DarkGray));
    frame.render_widget(notification, chunks[chunk_idx]);
    chunk_idx += 2;

    if editing(app.current_mode) {
        render_input_line(frame, app, chunks[chunk_idx]);
        chunk_idx += 1;
    }

    let panels = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(app.left_pane_width_percentage),
            Constraint::Percentage(100 - app.left_pane_width_percentage),
        ])
        .split(chunks[chunk_idx]);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Min(0)])
        .split(panels[0]);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(30),
            Constraint::Min(0),
        ])
        .split(panels[1]);

    render_map(frame, &app.dashboard.frame().map, left[0]);
    render_filters(frame, app, left[1]);
    render_popularity(frame, app, right[0]);
    render_queries(frame, app, right[1]);
    render_plots(frame, app, right[2]);
}

fn render_input_line<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let label = match app.current_mode {
        AppMode::EditingFilterValue => "Value:",
        AppMode::EditingQueryName => "Name:",
        AppMode::EditingQuery => "Query:",
        AppMode::EditingOverlayPath => "File:",
        AppMode::EditingOverlayScale => "Scale:",
        AppMode::Navigation => "",
    };
    let layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(area);
    frame.render_widget(
        Paragraph::new(label).style(Style::default().fg(Color::LightCyan)),
        layout[0],
    );
    frame.render_widget(
        Paragraph::new(app.input.text.clone()).style(Style::default().fg(Color::Yellow)),
        layout[1],
    );
    frame.set_cursor(layout[1].x + app.input.cursor as u16, layout[1].y);
}

fn panel_block(title: &str, focused: bool) -> Block<'_> {
    let color = if focused { Color::LightYellow } else { Color::LightBlue };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

/// Canvas window for a viewport, or the whole world when there is none.
fn map_bounds(view: Option<MapView>) -> ([f64; 2], [f64; 2]) {
    match view {
        Some(view) => {
            let span = 360.0 / 2f64.powf(view.zoom) * 1.2;
            (
                [view.center_lon - span / 2.0, view.center_lon + span / 2.0],
                [view.center_lat - span / 4.0, view.center_lat + span / 4.0],
            )
        }
        None => ([-180.0, 180.0], [-90.0, 90.0]),
    }
}

/// Points of every layer, grouped by terminal color, in draw order.
fn map_point_groups(map: &MapFrame) -> Vec<(Vec<(f64, f64)>, Color)> {
    let mut groups = Vec::new();
    let order = [
        LayerKind::DensityOverlay,
        LayerKind::BaseMarkers,
        LayerKind::UploadedOverlay,
        LayerKind::HighlightMarker,
    ];
    for kind in order {
        for layer in map.layers.iter().filter(|layer| layer.kind == kind) {
            match kind {
                LayerKind::DensityOverlay => {
                    let coords = layer.points().iter().map(|p| (p.lon, p.lat)).collect();
                    groups.push((coords, Color::DarkGray));
                }
                LayerKind::HighlightMarker => {
                    let coords = layer.points().iter().map(|p| (p.lon, p.lat)).collect();
                    groups.push((coords, Color::LightMagenta));
                }
                _ => {
                    let mut by_color: BTreeMap<(u8, u8, u8), Vec<(f64, f64)>> = BTreeMap::new();
                    for point in layer.points() {
                        let rgb = layer.point_color(point).unwrap_or((200, 200, 200));
                        by_color.entry(rgb).or_default().push((point.lon, point.lat));
                    }
                    for ((r, g, b), coords) in by_color {
                        groups.push((coords, Color::Rgb(r, g, b)));
                    }
                }
            }
        }
    }
    groups
}

fn render_map(frame: &mut Frame, map: &MapFrame, area: Rect) {
    let (x_bounds, y_bounds) = map_bounds(map.view);
    let groups = map_point_groups(map);
    let title = match map.view {
        Some(view) => format!(
            " Map ({:.3}, {:.3}) zoom {:.1} ",
            view.center_lat, view.center_lon, view.zoom
        ),
        None => " Map (no traffic yet) ".to_string(),
    };
    let canvas = Canvas::default()
        .block(panel_block(&title, false))
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            ctx.draw(&Map {
                resolution: MapResolution::High,
                color: Color::Gray,
            });
            ctx.layer();
            for (coords, color) in &groups {
                ctx.draw(&Points {
                    coords,
                    color: *color,
                });
            }
        });
    frame.render_widget(canvas, area);
}

fn render_filters<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let focused = app.focus == Focus::Filters;
    let block = panel_block(" Filters ", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(inner);

    let list = &app.dashboard.frame().filter_list;
    for (side, entries) in [&list.left, &list.right].into_iter().enumerate() {
        let lines: Vec<Line> = entries
            .iter()
            .enumerate()
            .map(|(row, entry)| {
                let index = row * 2 + side;
                let value = entry.value.as_deref().unwrap_or("-");
                let mut style = Style::default().fg(Color::White);
                if entry.value.is_some() {
                    style = style.fg(Color::LightGreen);
                }
                if focused && index == app.selected_filter {
                    style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
                }
                Line::from(Span::styled(format!("{}: {}", entry.column, value), style))
            })
            .collect();
        frame.render_widget(Paragraph::new(lines), halves[side]);
    }
}

fn render_popularity<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let focused = app.focus == Focus::Stations;
    let origin = app
        .dashboard
        .filters()
        .get(&app.dashboard.settings().origin_column);
    let hover = if app.dashboard.hover_select() { "hover on" } else { "hover off" };
    let title = format!(" Most trafficked stations ({hover}) ");

    let bars: Vec<Bar> = app
        .dashboard
        .frame()
        .map
        .popularity
        .iter()
        .enumerate()
        .map(|(i, ranked)| {
            let mut style = Style::default().fg(Color::LightRed);
            if origin == Some(ranked.station.as_str()) {
                style = style.fg(Color::LightMagenta);
            }
            if focused && i == app.selected_station {
                style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
            }
            Bar::default()
                .value(ranked.traffic.max(0.0).round() as u64)
                .label(Line::from(ranked.station.clone()))
                .style(style)
        })
        .collect();

    let chart = BarChart::default()
        .block(panel_block(&title, focused))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn render_queries<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let focused = app.focus == Focus::Queries;
    let mut lines: Vec<Line> = app
        .dashboard
        .queries()
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let mut style = Style::default().fg(Color::White);
            if focused && i == app.selected_query {
                style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
            }
            Line::from(vec![
                Span::styled(format!("{} ", result.label), style.fg(Color::LightCyan)),
                Span::styled(
                    format!(
                        "({} rows, {}) {}",
                        result.data_rows(),
                        result.created_at.format("%H:%M:%S"),
                        result.query
                    ),
                    style,
                ),
            ])
        })
        .collect();

    if let Some(preview) = &app.preview {
        lines.push(Line::styled("Preview:", Style::default().fg(Color::Gray)));
        for row in preview {
            lines.push(Line::styled(row.join(" | "), Style::default().fg(Color::Gray)));
        }
    }

    let paragraph = Paragraph::new(lines)
        .block(panel_block(" Queries ", focused))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_plots<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let focused = app.focus == Focus::Plots;
    let board = app.dashboard.board();
    let selected_id = board.plots().get(app.selected_plot).map(|p| p.id);

    let cell = |plot: Option<&tripviz::grid::PlacedPlot>| -> Span<'static> {
        match plot {
            Some(plot) => {
                let mut style = Style::default().fg(Color::White);
                if focused && Some(plot.id) == selected_id {
                    style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
                }
                Span::styled(
                    format!(
                        "[{} · {} · {} traces]",
                        plot.spec.title,
                        plot.spec.kind.label(),
                        plot.spec.traces.len()
                    ),
                    style,
                )
            }
            None => Span::styled("[ ]", Style::default().fg(Color::DarkGray)),
        }
    };

    let mut lines = vec![Line::styled("1. [map] [popular stations]", Style::default().fg(Color::Gray))];
    for (row, [left, right]) in board.rows().into_iter().enumerate() {
        lines.push(Line::from(vec![
            Span::raw(format!("{}. ", row + 2)),
            cell(left),
            Span::raw(" "),
            cell(right),
        ]));
    }

    let paragraph = Paragraph::new(lines)
        .block(panel_block(" Plots ", focused))
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

/// Renders a common footer area.
fn render_footer<B: Backend>(frame: &mut Frame, app: &App<B>, area: Rect) {
    let current_screen_name = match app.current_screen {
        CurrentScreen::Dashboard => "Dashboard",
        CurrentScreen::Help => "Help",
    };
    let current_mode_name = match app.current_mode {
        AppMode::Navigation => "Navigation",
        AppMode::EditingFilterValue => "Editing Filter",
        AppMode::EditingQueryName => "Naming Query",
        AppMode::EditingQuery => "Editing Query",
        AppMode::EditingOverlayPath | AppMode::EditingOverlayScale => "Loading Overlay",
    };

    let footer_text = Line::from(vec![
        Span::raw("Project: "),
        Span::styled(
            app.dashboard.settings().project.clone(),
            Style::default().fg(Color::LightGreen).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Screen: "),
        Span::styled(
            current_screen_name,
            Style::default()
                .fg(Color::LightBlue)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Mode: "),
        Span::styled(
            current_mode_name,
            Style::default()
                .fg(Color::LightMagenta)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | Press "),
        Span::styled(
            "q",
            Style::default().add_modifier(Modifier::BOLD).fg(Color::Red),
        ),
        Span::raw(" to quit "),
        Span::raw(" | Press "),
        Span::styled(
            "h",
            Style::default()
                .add_modifier(Modifier::BOLD)
                .fg(Color::Green),
        ),
        Span::raw(" for Help "),
    ]);

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray));

    let footer = Paragraph::new(footer_text)
        .alignment(Alignment::Center)
        .block(block)
        .style(Style::default().fg(Color::Gray));

    frame.render_widget(footer, area);
}
