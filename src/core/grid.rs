//! Grid geometry solver.
//!
//! Derives a (rows, columns) pair from the effective frame count and the
//! user's optional hints:
//!
//! | rows  | columns | result                                              |
//! |-------|---------|-----------------------------------------------------|
//! | unset | unset   | `columns = ceil(sqrt(n))`, `rows = ceil(n / columns)` |
//! | unset | set     | `rows = ceil(n / columns)`                          |
//! | set   | unset   | `columns = ceil(n / rows)`, then `rows = ceil(n / columns)` |
//! | set   | set     | used as given, not checked against `n`              |
//!
//! A requested row count is a hint: 12 frames on 10 rows gives 2 columns,
//! and rows are recomputed to 6.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridGeometry {
    pub rows: u32,
    pub columns: u32,
}

impl GridGeometry {
    /// Number of cells.
    pub fn capacity(&self) -> u64 {
        self.rows as u64 * self.columns as u64
    }

    pub fn fits(&self, frame_count: usize) -> bool {
        self.capacity() >= frame_count as u64
    }

    /// Sheet size in pixels for frames of `frame_width` x `frame_height`.
    ///
    /// `None` when a side does not fit in `u32`.
    pub fn sheet_size(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32)> {
        Some((self.columns.checked_mul(frame_width)?, self.rows.checked_mul(frame_height)?))
    }
}

/// Solve the grid for `frame_count` frames.
///
/// `Some(0)` is treated as unset. A zero frame count is solved as one frame
/// so the result is always a positive grid.
pub fn solve_grid(frame_count: usize, rows: Option<u32>, columns: Option<u32>) -> GridGeometry {
    let n = frame_count.max(1) as u64;
    let rows = rows.filter(|&r| r > 0).map(u64::from);
    let columns = columns.filter(|&c| c > 0).map(u64::from);

    let (rows, columns) = match (rows, columns) {
        (None, None) => {
            let columns = ceil_sqrt(n);
            (n.div_ceil(columns), columns)
        }
        (None, Some(columns)) => (n.div_ceil(columns), columns),
        (Some(rows), None) => {
            let columns = n.div_ceil(rows);
            (n.div_ceil(columns), columns)
        }
        (Some(rows), Some(columns)) => (rows, columns),
    };

    GridGeometry {
        rows: clamp_u32(rows),
        columns: clamp_u32(columns),
    }
}

/// Exact `ceil(sqrt(n))` for integers.
fn ceil_sqrt(n: u64) -> u64 {
    let mut root = (n as f64).sqrt().ceil() as u64;
    // Float sqrt can be off by one for large n
    while root > 1 && (root - 1) * (root - 1) >= n {
        root -= 1;
    }
    while root * root < n {
        root += 1;
    }
    root
}

fn clamp_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
