// config.rs

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::render::DashboardSettings;

pub const DEFAULT_PROJECT: &str = "citibike";

/// Terminal dashboard for exploring movement datasets on a map.
#[derive(Debug, Clone, Parser)]
#[command(name = "tripviz", version, about)]
pub struct Config {
    /// Base URL of the data service.
    #[arg(long, default_value = "http://localhost:5000")]
    pub backend: String,

    /// Dataset to explore (e.g. citibike, flights).
    #[arg(long)]
    pub project: Option<String>,

    /// Page query string to take the project from, e.g. "?project=flights".
    #[arg(long)]
    pub page_query: Option<String>,

    /// Filter column that pins the trip-origin station.
    #[arg(long, default_value = "from")]
    pub origin_column: String,

    /// Where exported PNGs go.
    #[arg(long, default_value = "output/")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "tripviz.log")]
    pub log_file: PathBuf,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "tripviz=info")]
    pub log_level: String,

    #[arg(long, default_value_t = 250)]
    pub tick_rate_ms: u64,

    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Start with hover-to-select turned off.
    #[arg(long)]
    pub no_hover_select: bool,
}

impl Config {
    /// `--project`, else the page query's `project=` pair, else citibike.
    pub fn project(&self) -> String {
        self.project
            .clone()
            .or_else(|| self.page_query.as_deref().and_then(project_from_query))
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string())
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            project: self.project(),
            origin_column: self.origin_column.clone(),
            hover_select: !self.no_hover_select,
        }
    }
}

/// Value of the `project` pair in a query string such as
/// `?project=flights&x=1`.
pub fn project_from_query(query: &str) -> Option<String> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "project")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_from_page_query() {
        assert_eq!(project_from_query("?project=flights"), Some("flights".into()));
        assert_eq!(project_from_query("a=1&project=bikes&b=2"), Some("bikes".into()));
        assert_eq!(project_from_query("?projects=x"), None);
        assert_eq!(project_from_query("?project="), None);
        assert_eq!(project_from_query(""), None);
    }

    #[test]
    fn project_resolution_order() {
        let config = Config::parse_from(["tripviz"]);
        assert_eq!(config.project(), "citibike");

        let config = Config::parse_from(["tripviz", "--page-query", "?project=flights"]);
        assert_eq!(config.project(), "flights");

        let config = Config::parse_from([
            "tripviz",
            "--page-query",
            "?project=flights",
            "--project",
            "taxis",
        ]);
        assert_eq!(config.project(), "taxis");
    }

    #[test]
    fn settings_follow_flags() {
        let config = Config::parse_from(["tripviz", "--no-hover-select", "--origin-column", "origin"]);
        let settings = config.dashboard_settings();
        assert!(!settings.hover_select);
        assert_eq!(settings.origin_column, "origin");
        assert_eq!(config.tick_rate(), Duration::from_millis(250));
    }
}
