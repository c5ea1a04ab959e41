//! Placement planner: grid slot -> pixel offset on the sheet.

use super::grid::GridGeometry;
use crate::entities::job::FillDirection;

/// Top-left pixel offset of a frame on the sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
}

/// Offset of the frame in `slot` (0-based, counting emitted frames only).
///
/// - Horizontal: `x = (slot % columns) * w`, `y = (slot / columns) * h`
/// - Vertical: `x = (slot / rows) * w`, `y = (slot % rows) * h`
///
/// Slots past the grid capacity map outside the sheet; callers check
/// [`GridGeometry::capacity`] first.
pub fn placement_for(
    slot: usize,
    geometry: &GridGeometry,
    frame_width: u32,
    frame_height: u32,
    direction: FillDirection,
) -> Placement {
    let slot = slot as u64;
    let (column, row) = match direction {
        FillDirection::Horizontal => {
            let columns = geometry.columns.max(1) as u64;
            (slot % columns, slot / columns)
        }
        FillDirection::Vertical => {
            let rows = geometry.rows.max(1) as u64;
            (slot / rows, slot % rows)
        }
    };

    Placement {
        x: (column * frame_width as u64).min(u32::MAX as u64) as u32,
        y: (row * frame_height as u64).min(u32::MAX as u64) as u32,
    }
}
