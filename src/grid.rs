// grid.rs

use crate::plotter::PlotSpec;

/// Where a plot landed in the two-column grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub row: usize,
    pub column: usize,
    pub created_row: bool,
}

/// Packs plots into a two-column grid, left to right then top to bottom.
///
/// Row 0 is already full (map and popularity chart). Placement is
/// monotonic: removing a plot leaves a gap and the packing carries on.
#[derive(Debug, Clone)]
pub struct PlotGridLayoutEngine {
    last_row_full: bool,
    rows: usize,
}

impl Default for PlotGridLayoutEngine {
    fn default() -> Self {
        Self {
            last_row_full: true,
            rows: 1,
        }
    }
}

impl PlotGridLayoutEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the next plot opens a new row.
    pub fn next_slot(&self) -> bool {
        self.last_row_full
    }

    pub fn place(&mut self) -> Placement {
        let placement = if self.last_row_full {
            self.rows += 1;
            Placement {
                row: self.rows - 1,
                column: 0,
                created_row: true,
            }
        } else {
            Placement {
                row: self.rows - 1,
                column: 1,
                created_row: false,
            }
        };
        self.last_row_full = !self.last_row_full;
        placement
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

pub type PlotId = u64;

#[derive(Debug, Clone)]
pub struct PlacedPlot {
    pub id: PlotId,
    pub placement: Placement,
    pub spec: PlotSpec,
}

/// The plots currently on screen, each in its grid slot.
#[derive(Debug, Clone, Default)]
pub struct PlotBoard {
    layout: PlotGridLayoutEngine,
    plots: Vec<PlacedPlot>,
    next_id: PlotId,
}

impl PlotBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn place_plot(&mut self, spec: PlotSpec) -> &PlacedPlot {
        let placement = self.layout.place();
        self.next_id += 1;
        tracing::debug!(id = self.next_id, ?placement, title = %spec.title, "plot placed");
        self.plots.push(PlacedPlot {
            id: self.next_id,
            placement,
            spec,
        });
        &self.plots[self.plots.len() - 1]
    }

    /// Drops a plot. Its slot stays empty.
    pub fn remove(&mut self, id: PlotId) -> Option<PlacedPlot> {
        let index = self.plots.iter().position(|p| p.id == id)?;
        Some(self.plots.remove(index))
    }

    pub fn get(&self, id: PlotId) -> Option<&PlacedPlot> {
        self.plots.iter().find(|p| p.id == id)
    }

    pub fn plots(&self) -> &[PlacedPlot] {
        &self.plots
    }

    /// Plots grouped by grid row, `[left, right]`; row 0 is omitted.
    pub fn rows(&self) -> Vec<[Option<&PlacedPlot>; 2]> {
        let mut rows = vec![[None, None]; self.layout.rows().saturating_sub(1)];
        for plot in &self.plots {
            if let Some(row) = rows.get_mut(plot.placement.row - 1) {
                row[plot.placement.column] = Some(plot);
            }
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plotter::{PlotKind, PlotSpec};

    fn spec(title: &str) -> PlotSpec {
        PlotSpec::empty(PlotKind::Bar, title)
    }

    #[test]
    fn odd_calls_open_rows_even_calls_fill_them() {
        let mut engine = PlotGridLayoutEngine::new();
        assert!(engine.next_slot());
        for n in 1..=9 {
            let placement = engine.place();
            assert_eq!(placement.created_row, n % 2 == 1, "call {n}");
            assert_eq!(placement.column, if n % 2 == 1 { 0 } else { 1 });
            assert_eq!(placement.row, (n + 1) / 2);
        }
        assert_eq!(engine.rows(), 6);
    }

    #[test]
    fn removal_leaves_a_gap() {
        let mut board = PlotBoard::new();
        let first = board.place_plot(spec("a")).id;
        board.place_plot(spec("b"));
        assert!(board.remove(first).is_some());
        assert!(board.remove(first).is_none());

        let third = board.place_plot(spec("c"));
        assert_eq!(third.placement, Placement { row: 2, column: 0, created_row: true });

        let rows = board.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows[0][0].is_none());
        assert_eq!(rows[0][1].map(|p| p.spec.title.as_str()), Some("b"));
        assert_eq!(rows[1][0].map(|p| p.spec.title.as_str()), Some("c"));
    }

    #[test]
    fn ids_are_unique() {
        let mut board = PlotBoard::new();
        let a = board.place_plot(spec("a")).id;
        let b = board.place_plot(spec("b")).id;
        assert_ne!(a, b);
        assert_eq!(board.get(b).map(|p| p.spec.title.as_str()), Some("b"));
    }
}
