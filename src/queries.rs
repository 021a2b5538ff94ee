// queries.rs

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::backend::Backend;
use crate::error::{DashError, Result};
use crate::plotter::{self, PlotKind, PlotSpec};
use crate::tabular::{Table, decode};

/// Appended to a query being typed so the preview stays small and quick.
pub const PREVIEW_SUFFIX: &str = " limit 5";

/// Label shown for the backend's unnamed row-index column.
pub const INDEX_LABEL: &str = "-";

pub type QueryId = u64;

/// Decodes a `/sql` response. A blank first header cell is the backend's
/// row index; it is relabelled [`INDEX_LABEL`].
pub fn decode_result(text: &str) -> (Table, bool) {
    let mut table = decode(text);
    let has_index = match table.first_mut().and_then(|header| header.first_mut()) {
        Some(cell) if cell.is_empty() || cell.as_str() == INDEX_LABEL => {
            *cell = INDEX_LABEL.to_string();
            true
        }
        _ => false,
    };
    (table, has_index)
}

/// `table` without its first column.
pub fn without_index(table: &Table) -> Table {
    table
        .iter()
        .map(|row| row.iter().skip(1).cloned().collect())
        .collect()
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub id: QueryId,
    pub label: String,
    pub query: String,
    pub created_at: DateTime<Local>,
    pub table: Table,
    has_index: bool,
}

impl QueryResult {
    pub fn new(id: QueryId, label: &str, query: &str, body: &str) -> Self {
        let (table, has_index) = decode_result(body);
        Self {
            id,
            label: label.to_string(),
            query: query.to_string(),
            created_at: Local::now(),
            table,
            has_index,
        }
    }

    pub fn data_rows(&self) -> usize {
        self.table.len().saturating_sub(1)
    }

    /// The table as the plotter sees it: header first, row index removed.
    pub fn plot_table(&self) -> Table {
        if self.has_index {
            without_index(&self.table)
        } else {
            self.table.clone()
        }
    }

    /// A fresh chart of this result. Earlier charts are left alone.
    pub fn plot(&self, kind: PlotKind) -> PlotSpec {
        plotter::plot(kind, &self.plot_table(), &self.label)
    }
}

/// Submitted queries, oldest first.
#[derive(Debug, Clone, Default)]
pub struct QueryResults {
    results: Vec<QueryResult>,
    next_id: QueryId,
}

impl QueryResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `query` and keeps its result. A failed query keeps nothing.
    pub fn submit<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        label: &str,
        query: &str,
    ) -> Result<QueryId> {
        let body = backend.sql(query).inspect_err(|e| {
            warn!(error = %e, query, "query failed");
        })?;
        self.next_id += 1;
        let result = QueryResult::new(self.next_id, label, query, &body);
        if result.data_rows() == 0 {
            info!(query, "{}", DashError::EmptyResult);
        }
        info!(id = result.id, label, rows = result.data_rows(), "query result added");
        self.results.push(result);
        Ok(self.next_id)
    }

    pub fn remove(&mut self, id: QueryId) -> Option<QueryResult> {
        let index = self.results.iter().position(|r| r.id == id)?;
        Some(self.results.remove(index))
    }

    pub fn get(&self, id: QueryId) -> Option<&QueryResult> {
        self.results.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryResult> {
        self.results.iter()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// First few rows of `query`, or `None` when the backend rejects it.
pub fn preview<B: Backend + ?Sized>(backend: &B, query: &str) -> Option<Table> {
    if query.trim().is_empty() {
        return None;
    }
    match backend.sql(&format!("{query}{PREVIEW_SUFFIX}")) {
        Ok(body) => Some(decode_result(&body).0),
        Err(e) => {
            tracing::debug!(error = %e, "preview suppressed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterStore;
    use std::cell::RefCell;

    #[derive(Default)]
    struct SqlOnly {
        seen: RefCell<Vec<String>>,
    }

    impl Backend for SqlOnly {
        fn columns(&self) -> Result<String> {
            Ok(String::new())
        }
        fn vertices(&self) -> Result<String> {
            Ok(String::new())
        }
        fn traffic(&self, _: &FilterStore) -> Result<String> {
            Ok(String::new())
        }
        fn density(&self) -> Result<String> {
            Ok(String::new())
        }
        fn sql(&self, query: &str) -> Result<String> {
            self.seen.borrow_mut().push(query.to_string());
            if query.contains("bogus") {
                Err(DashError::Query { status: 500 })
            } else if query.contains("nothing") {
                Ok(",hour,count\n".to_string())
            } else {
                Ok(",hour,count\n0,8,12\n1,9,30\n".to_string())
            }
        }
    }

    #[test]
    fn index_column_is_relabelled_and_hidden_from_plots() {
        let result = QueryResult::new(1, "rides", "select", ",x,A\n0,1,10\n1,2,15\n");
        assert_eq!(result.table[0], vec!["-", "x", "A"]);
        assert_eq!(result.data_rows(), 2);
        assert_eq!(result.plot_table()[0], vec!["x", "A"]);
        assert_eq!(result.plot(PlotKind::Bar).traces.len(), 1);
    }

    #[test]
    fn tables_without_index_plot_as_is() {
        let result = QueryResult::new(1, "rides", "select", "x,A\n1,10\n");
        assert_eq!(result.plot_table(), result.table);
    }

    #[test]
    fn submit_keeps_successful_results_only() {
        let backend = SqlOnly::default();
        let mut results = QueryResults::new();
        let id = results.submit(&backend, "by hour", "select hour").unwrap();
        assert_eq!(results.get(id).unwrap().label, "by hour");

        let err = results.submit(&backend, "broken", "bogus").unwrap_err();
        assert!(matches!(err, DashError::Query { status: 500 }));
        assert_eq!(results.len(), 1);

        let empty = results.submit(&backend, "none", "select nothing").unwrap();
        assert_ne!(id, empty);
        assert_eq!(results.get(empty).unwrap().data_rows(), 0);
    }

    #[test]
    fn remove_only_drops_that_result() {
        let backend = SqlOnly::default();
        let mut results = QueryResults::new();
        let a = results.submit(&backend, "a", "select a").unwrap();
        let b = results.submit(&backend, "b", "select b").unwrap();
        assert!(results.remove(a).is_some());
        assert!(results.remove(a).is_none());
        let labels: Vec<_> = results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["b"]);
        assert!(results.get(b).is_some());
    }

    #[test]
    fn preview_appends_limit_and_hides_failures() {
        let backend = SqlOnly::default();
        let rows = preview(&backend, "select hour").unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(backend.seen.borrow().last().unwrap(), "select hour limit 5");

        assert!(preview(&backend, "bogus").is_none());
        assert!(preview(&backend, "   ").is_none());
    }
}
