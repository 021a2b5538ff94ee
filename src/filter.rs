// filter.rs

use indexmap::IndexMap;

/// Active `column = value` constraints, in the order they were first set.
///
/// A missing column is unconstrained. Column names are not validated here;
/// the filter list only ever offers the project's known columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStore {
    constraints: IndexMap<String, String>,
}

impl FilterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrains `column`. Re-setting a column keeps its original position.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.constraints.insert(column.into(), value.into());
    }

    /// Returns the removed value, if the column was constrained.
    pub fn unset(&mut self, column: &str) -> Option<String> {
        self.constraints.shift_remove(column)
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.constraints.get(column).map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.constraints
            .iter()
            .map(|(column, value)| (column.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// `(column, value)` pairs ready to append to a request's query string.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.constraints
            .iter()
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_unset() {
        let mut filters = FilterStore::new();
        assert!(filters.is_empty());
        filters.set("hour", "4");
        assert_eq!(filters.get("hour"), Some("4"));
        assert_eq!(filters.unset("hour"), Some("4".to_string()));
        assert_eq!(filters.get("hour"), None);
        assert_eq!(filters.unset("hour"), None);
    }

    #[test]
    fn entries_follow_insertion_order() {
        let mut filters = FilterStore::new();
        filters.set("gender", "1");
        filters.set("from", "72.0");
        filters.set("hour", "8");
        filters.set("from", "79.0");
        let entries: Vec<_> = filters.entries().collect();
        assert_eq!(
            entries,
            vec![("gender", "1"), ("from", "79.0"), ("hour", "8")]
        );

        filters.unset("gender");
        let columns: Vec<_> = filters.entries().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["from", "hour"]);
    }

    #[test]
    fn query_pairs_mirror_entries() {
        let mut filters = FilterStore::new();
        filters.set("birth year", "1980");
        assert_eq!(
            filters.query_pairs(),
            vec![("birth year".to_string(), "1980".to_string())]
        );
    }
}
