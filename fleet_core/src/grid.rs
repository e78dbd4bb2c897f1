//! Grid Planner - arranges N instances on a square-like 2D grid.
//!
//! The layout is the smallest near-square rectangle covering `count`
//! cells:
//!
//! ```text
//! columns = ceil(sqrt(count))
//! rows    = ceil(count / columns)
//! ```
//!
//! Cells are enumerated from the last row (`rows - 1`) down to row 0, west
//! to east within a row, and numbered 1, 2, 3, ... in that order.
//! Enumeration stops at `count`, so only the final (southern-most) row can
//! be partially filled. For `count = 5`:
//!
//! ```text
//!   y = d   [1] [2] [3]
//!   y = 0   [4] [5]
//!           x=0 x=d x=2d
//! ```

use serde::Serialize;

/// The `(columns, rows)` arrangement for one fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridLayout {
    pub columns: u32,
    pub rows: u32,
}

impl GridLayout {
    /// Computes the layout for `count` instances.
    ///
    /// `count` is validated upstream; a zero count is treated as one so the
    /// planner never divides by zero.
    pub fn plan(count: u32) -> Self {
        let count = count.max(1);
        let columns = ceil_sqrt(count);
        let rows = count.div_ceil(columns);
        Self { columns, rows }
    }

    /// Number of cells the rectangle offers (`columns * rows`).
    pub fn capacity(&self) -> u64 {
        self.columns as u64 * self.rows as u64
    }

    /// Enumerates the first `count` cells with the given spacing in meters.
    pub fn cells(&self, count: u32, spacing: f64) -> GridCells {
        GridCells {
            layout: *self,
            count: count.min(self.capacity().min(u32::MAX as u64) as u32),
            spacing,
            next_index: 1,
        }
    }
}

/// Integer `ceil(sqrt(n))`, exact for every `u32`.
fn ceil_sqrt(n: u32) -> u32 {
    let n = n as u64;
    let mut root = (n as f64).sqrt() as u64;
    while root * root < n {
        root += 1;
    }
    while root > 0 && (root - 1) * (root - 1) >= n {
        root -= 1;
    }
    root as u32
}

/// One placement slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridCell {
    /// 1-based instance index
    pub index: u32,

    /// Column (0 = west)
    pub column: u32,

    /// Row (0 = south)
    pub row: u32,

    /// East offset in meters
    pub x: f64,

    /// North offset in meters
    pub y: f64,
}

/// Lazy iterator over grid cells, see [`GridLayout::cells`].
#[derive(Debug, Clone)]
pub struct GridCells {
    layout: GridLayout,
    count: u32,
    spacing: f64,
    next_index: u64,
}

impl Iterator for GridCells {
    type Item = GridCell;

    fn next(&mut self) -> Option<GridCell> {
        if self.next_index > self.count as u64 {
            return None;
        }
        let index = self.next_index as u32;
        self.next_index += 1;

        let ordinal = index - 1;
        let column = ordinal % self.layout.columns;
        let row = self.layout.rows - 1 - ordinal / self.layout.columns;

        Some(GridCell {
            index,
            column,
            row,
            x: column as f64 * self.spacing,
            y: row as f64 * self.spacing,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.count as u64 + 1 - self.next_index) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GridCells {}

/// Renders cells as one text line per grid row, north first:
/// `sim-1 (0, 1)\tsim-2 (1, 1)\t`.
pub fn format_rows(cells: &[GridCell], container_prefix: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current_row = None;

    for cell in cells {
        if current_row != Some(cell.row) {
            lines.push(String::new());
            current_row = Some(cell.row);
        }
        if let Some(line) = lines.last_mut() {
            line.push_str(&format!(
                "{}{} ({}, {})\t",
                container_prefix, cell.index, cell.x, cell.y
            ));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn positions(count: u32, spacing: f64) -> Vec<(u32, f64, f64)> {
        GridLayout::plan(count)
            .cells(count, spacing)
            .map(|c| (c.index, c.x, c.y))
            .collect()
    }

    #[test]
    fn test_single_instance() {
        let layout = GridLayout::plan(1);
        assert_eq!(layout, GridLayout { columns: 1, rows: 1 });
        assert_eq!(positions(1, 1.0), vec![(1, 0.0, 0.0)]);
    }

    #[test]
    fn test_four_instances_fill_top_row_first() {
        let layout = GridLayout::plan(4);
        assert_eq!(layout, GridLayout { columns: 2, rows: 2 });

        let s = 2.5;
        assert_eq!(
            positions(4, s),
            vec![(1, 0.0, s), (2, s, s), (3, 0.0, 0.0), (4, s, 0.0)]
        );
    }

    #[test]
    fn test_five_instances_stop_at_count() {
        let layout = GridLayout::plan(5);
        assert_eq!(layout, GridLayout { columns: 3, rows: 2 });

        let cells: Vec<GridCell> = layout.cells(5, 1.0).collect();
        assert_eq!(cells.len(), 5);

        let top: Vec<u32> = cells.iter().filter(|c| c.row == 1).map(|c| c.index).collect();
        let bottom: Vec<u32> = cells.iter().filter(|c| c.row == 0).map(|c| c.index).collect();
        assert_eq!(top, vec![1, 2, 3]);
        assert_eq!(bottom, vec![4, 5]);
        assert!(cells.iter().all(|c| c.index != 6));
    }

    #[test]
    fn test_cell_coordinates_scale_with_spacing() {
        let cells: Vec<GridCell> = GridLayout::plan(10).cells(10, 0.3).collect();
        let last = cells.last().unwrap();
        assert_eq!(last.index, 10);
        assert_eq!((last.column, last.row), (1, 0));
        assert_relative_eq!(last.x, 0.3);
        assert_relative_eq!(last.y, 0.0);

        let first = cells.first().unwrap();
        assert_relative_eq!(first.y, 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_ceil_sqrt_at_perfect_squares() {
        assert_eq!(ceil_sqrt(1), 1);
        assert_eq!(ceil_sqrt(9), 3);
        assert_eq!(ceil_sqrt(10), 4);
        assert_eq!(ceil_sqrt(u32::MAX), 65536);
    }

    #[test]
    fn test_size_hint_is_exact() {
        let mut cells = GridLayout::plan(7).cells(7, 1.0);
        assert_eq!(cells.len(), 7);
        cells.next();
        assert_eq!(cells.len(), 6);
    }

    #[test]
    fn test_format_rows() {
        let cells: Vec<GridCell> = GridLayout::plan(3).cells(3, 1.0).collect();
        let lines = format_rows(&cells, "sim-");
        assert_eq!(lines, vec!["sim-1 (0, 1)\tsim-2 (1, 1)\t", "sim-3 (0, 0)\t"]);
    }

    proptest! {
        #[test]
        fn prop_layout_matches_formula(count in 1u32..5000) {
            let layout = GridLayout::plan(count);
            let expected_columns = (count as f64).sqrt().ceil() as u32;
            prop_assert_eq!(layout.columns, expected_columns);
            prop_assert_eq!(layout.rows, (count + layout.columns - 1) / layout.columns);
            prop_assert!(layout.capacity() >= count as u64);
        }

        #[test]
        fn prop_indices_are_exactly_one_to_count(count in 1u32..2000) {
            let indices: Vec<u32> = GridLayout::plan(count).cells(count, 1.0).map(|c| c.index).collect();
            let expected: Vec<u32> = (1..=count).collect();
            prop_assert_eq!(indices, expected);
        }

        #[test]
        fn prop_cells_stay_inside_layout(count in 1u32..2000, spacing in 0.01f64..100.0) {
            let layout = GridLayout::plan(count);
            let mut seen = std::collections::HashSet::new();
            for cell in layout.cells(count, spacing) {
                prop_assert!(cell.column < layout.columns);
                prop_assert!(cell.row < layout.rows);
                prop_assert!(seen.insert((cell.column, cell.row)));
                prop_assert!((cell.x - cell.column as f64 * spacing).abs() < 1e-9);
                prop_assert!((cell.y - cell.row as f64 * spacing).abs() < 1e-9);
            }
        }
    }
}
