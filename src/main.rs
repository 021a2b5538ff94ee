// main.rs for the tripviz dashboard TUI
mod app;
mod event;
mod ui;

use std::fs;
use std::io;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{error, info};

use tripviz::backend::HttpBackend;
use tripviz::config::Config;
use tripviz::logging;
use tripviz::render::RenderCoordinator;

use crate::app::App;
use crate::event::{Event, EventHandler};

fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("creating output directory {}", config.output_dir.display()))?;
    logging::init(&config.log_file, &config.log_level)?;

    let project = config.project();
    info!(backend = %config.backend, project = %project, "starting dashboard");

    let backend = HttpBackend::new(&config.backend, &project, config.request_timeout())
        .context("building backend client")?;
    let dashboard = RenderCoordinator::start(backend, config.dashboard_settings());
    let mut app = App::new(dashboard, config.output_dir.clone());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, &mut app, &config);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!(error = %e, "dashboard stopped");
    }
    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<HttpBackend>,
    config: &Config,
) -> anyhow::Result<()> {
    let events = EventHandler::new(config.tick_rate());
    while !app.quit {
        terminal.draw(|frame| ui::render(frame, app))?;
        match events.next()? {
            Event::Input(key) => app.handle_key(key),
            Event::Tick | Event::Resize => {}
        }
    }
    info!("quit requested");
    Ok(())
}
