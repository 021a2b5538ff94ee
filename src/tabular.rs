// tabular.rs

use tracing::warn;

/// One line of delimited text, split into fields.
pub type Row = Vec<String>;

/// Rows in source order. Whether `rows[0]` is a header is up to the caller.
pub type Table = Vec<Row>;

/// Splits raw comma-delimited text into rows.
///
/// Quoted fields keep embedded commas and newlines, and `""` inside quotes
/// becomes a single `"`. Blank lines yield no rows. An unterminated quote
/// does not fail: whatever follows it becomes the field's content.
pub fn decode(text: &str) -> Table {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut table = Table::new();
    for record in reader.byte_records() {
        match record {
            Ok(record) => table.push(
                record
                    .iter()
                    .map(|field| String::from_utf8_lossy(field).into_owned())
                    .collect(),
            ),
            Err(e) => {
                // Best effort: keep what decoded so far.
                warn!(error = %e, rows = table.len(), "stopping decode early");
                break;
            }
        }
    }
    table
}

/// Drops the first `n` rows regardless of their content.
pub fn skip_rows(mut table: Table, n: usize) -> Table {
    table.drain(..n.min(table.len()));
    table
}

/// Position of `name` in a header row, exact match.
pub fn header_index(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|column| column == name)
}

/// Like [`header_index`], falling back to an ASCII case-insensitive match.
pub fn header_index_loose(header: &[String], name: &str) -> Option<usize> {
    header_index(header, name)
        .or_else(|| header.iter().position(|column| column.eq_ignore_ascii_case(name)))
}

/// Field `index` of `row`, or `""` when the row is short.
pub fn field(row: &[String], index: usize) -> &str {
    row.get(index).map(String::as_str).unwrap_or("")
}
