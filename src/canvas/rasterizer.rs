use std::collections::BTreeSet;

use crate::{constants::CANVAS_SIZE, models::GridCell};

/// Integer offsets `(dx, dy)` with `dx² + dy² <= radius²`.
pub fn disk_offsets(radius: u32) -> impl Iterator<Item = (i32, i32)> {
    let r = i64::from(radius);
    (-r..=r).flat_map(move |dx| {
        (-r..=r).filter_map(move |dy| {
            (dx * dx + dy * dy <= r * r).then_some((dx as i32, dy as i32))
        })
    })
}

/// Disk cells inside the half-open box `[start_x, end_x) × [start_y, end_y)`.
///
/// Only the intersection of the disk's bounding box with the given box is
/// walked, so the cost is bounded by the box whatever the radius.
pub fn disk_cells_within(
    center: GridCell,
    radius: u32,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> impl Iterator<Item = GridCell> {
    let r = i64::from(radius);
    let (cx, cy) = (i64::from(center.x), i64::from(center.y));
    let x_range = (cx - r).max(i64::from(start_x))..(cx + r + 1).min(i64::from(end_x));
    let y_range = (cy - r).max(i64::from(start_y))..(cy + r + 1).min(i64::from(end_y));
    let r2 = i128::from(r) * i128::from(r);
    x_range.flat_map(move |x| {
        y_range.clone().filter_map(move |y| {
            let (dx, dy) = (i128::from(x - cx), i128::from(y - cy));
            (dx * dx + dy * dy <= r2).then(|| GridCell::new(x as i32, y as i32))
        })
    })
}

/// Euclidean disk around `center`, clipped to the board.
pub fn cells_in_radius(center: GridCell, radius: u32) -> BTreeSet<GridCell> {
    disk_cells_within(center, radius, 0, 0, CANVAS_SIZE, CANVAS_SIZE).collect()
}

/// Disk-shaped area effect of a bomb or rocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaEffect {
    pub center: GridCell,
    pub radius: u32,
}

impl AreaEffect {
    pub fn new(center: GridCell, radius: u32) -> Self {
        Self { center, radius }
    }

    pub fn cells(&self) -> BTreeSet<GridCell> {
        cells_in_radius(self.center, self.radius)
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        cell.in_bounds()
            && i128::from(cell.distance_squared(&self.center))
                <= i128::from(self.radius) * i128::from(self.radius)
    }
}
