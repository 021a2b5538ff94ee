// backend.rs

use std::time::Duration;

use reqwest::blocking::Client;
use tracing::debug;

use crate::error::{DashError, Result};
use crate::filter::FilterStore;

/// The data service behind the dashboard. Every method returns the raw
/// response body; decoding is the caller's business.
pub trait Backend {
    /// `GET /project/columns`: comma-separated column names.
    fn columns(&self) -> Result<String>;

    /// `GET /vertex`: the station table.
    fn vertices(&self) -> Result<String>;

    /// `GET /station/traffic` under the given filters.
    fn traffic(&self, filters: &FilterStore) -> Result<String>;

    /// `GET /sql`. A non-success status is a [`DashError::Query`].
    fn sql(&self, query: &str) -> Result<String>;

    /// The static density dataset.
    fn density(&self) -> Result<String>;
}

/// Splits the `/project/columns` body into names. An empty body means the
/// project has no columns.
pub fn parse_columns(text: &str) -> Vec<String> {
    text.trim()
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}

/// [`Backend`] over HTTP.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    project: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, project: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            project: project.to_string(),
        })
    }

    fn get(&self, path: &str, extra: &[(String, String)]) -> Result<reqwest::blocking::Response> {
        let mut pairs = vec![("project".to_string(), self.project.clone())];
        pairs.extend_from_slice(extra);
        debug!(path, ?pairs, "GET");
        Ok(self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&pairs)
            .send()?)
    }

    fn get_text(&self, path: &str, extra: &[(String, String)]) -> Result<String> {
        Ok(self.get(path, extra)?.error_for_status()?.text()?)
    }
}

impl Backend for HttpBackend {
    fn columns(&self) -> Result<String> {
        self.get_text("/project/columns", &[])
    }

    fn vertices(&self) -> Result<String> {
        self.get_text("/vertex", &[])
    }

    fn traffic(&self, filters: &FilterStore) -> Result<String> {
        self.get_text("/station/traffic", &filters.query_pairs())
    }

    fn sql(&self, query: &str) -> Result<String> {
        let response = self.get("/sql", &[("query".to_string(), query.to_string())])?;
        let status = response.status();
        if !status.is_success() {
            return Err(DashError::Query {
                status: status.as_u16(),
            });
        }
        Ok(response.text()?)
    }

    fn density(&self) -> Result<String> {
        let url = format!("{}/data/crime.csv", self.base_url);
        debug!(%url, "GET");
        Ok(self.client.get(url).send()?.error_for_status()?.text()?)
    }
}
