//! Authoritative in-memory pixel map and its merge policy.
//!
//! Three sources write here: confirmed local paints, patches from session
//! peers and replayed chain events. Every write is last-writer-wins per cell.
//! Convergence across peers assumes the realtime layer delivers patches in
//! one total order; nothing here detects or repairs reordering. Area clears
//! write the background color explicitly, so they are idempotent and two
//! clears commute.

use std::collections::HashMap;

use super::rasterizer::AreaEffect;
use crate::models::{CellRect, Color, GridCell, PixelPatch};

#[derive(Debug, Clone)]
pub struct PixelStore {
    cells: HashMap<GridCell, Color>,
    background: Color,
    revision: u64,
}

impl Default for PixelStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelStore {
    pub fn new() -> Self {
        Self {
            cells: HashMap::new(),
            background: Color::background(),
            revision: 0,
        }
    }

    pub fn get(&self, cell: GridCell) -> &Color {
        self.cells.get(&cell).unwrap_or(&self.background)
    }

    pub fn background(&self) -> &Color {
        &self.background
    }

    /// Number of cells holding an explicit entry, cleared ones included.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Bumped whenever a write changes a cell.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Write a confirmed local paint. Returns the patch to publish to peers.
    pub fn apply_local(&mut self, cell: GridCell, color: Color) -> PixelPatch {
        let mut patch = PixelPatch::new();
        if !cell.in_bounds() {
            tracing::warn!("Ignoring local paint outside board at {}", cell);
            return patch;
        }
        patch.insert(cell, color);
        self.write_batch(&patch);
        patch
    }

    /// Merge a patch from a session peer. Returns how many cells changed.
    pub fn apply_remote(&mut self, patch: &PixelPatch) -> usize {
        let changed = self.write_batch(patch);
        if changed > 0 {
            tracing::debug!("Merged remote patch: {} of {} cells changed", changed, patch.len());
        }
        changed
    }

    /// Reset every cell of the disk to the background color.
    ///
    /// Returns the batch that was written, whether or not it changed anything.
    pub fn apply_area_clear(&mut self, center: GridCell, radius: u32) -> PixelPatch {
        let patch: PixelPatch = AreaEffect::new(center, radius)
            .cells()
            .into_iter()
            .map(|cell| (cell, self.background.clone()))
            .collect();
        let changed = self.write_batch(&patch);
        tracing::debug!(
            "Area clear at {} r={} wrote {} cells ({} changed)",
            center,
            radius,
            patch.len(),
            changed
        );
        patch
    }

    /// Full content as a patch, for session snapshots.
    pub fn snapshot(&self) -> PixelPatch {
        self.cells.iter().map(|(c, color)| (*c, color.clone())).collect()
    }

    /// Colors of `rect` in row-major order.
    pub fn crop(&self, rect: &CellRect) -> Vec<Color> {
        rect.cells().map(|cell| self.get(cell).clone()).collect()
    }

    fn write_batch(&mut self, patch: &PixelPatch) -> usize {
        let mut changed = 0;
        for (cell, color) in patch.iter() {
            if !cell.in_bounds() {
                continue;
            }
            if self.cells.get(cell) != Some(color) {
                self.cells.insert(*cell, color.clone());
                changed += 1;
            }
        }
        if changed > 0 {
            self.revision += 1;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> Color {
        Color::parse("#FF0000").unwrap()
    }

    fn painted_store() -> PixelStore {
        let mut store = PixelStore::new();
        for x in 240..260 {
            for y in 240..260 {
                store.apply_local(GridCell::new(x, y), red());
            }
        }
        store
    }

    #[test]
    fn absent_cells_read_as_background() {
        let store = PixelStore::new();
        assert!(store.get(GridCell::new(1, 1)).is_background());
        assert!(store.is_empty());
    }

    #[test]
    fn local_write_returns_publishable_patch() {
        let mut store = PixelStore::new();
        let patch = store.apply_local(GridCell::new(3, 4), red());
        assert_eq!(patch.len(), 1);
        assert_eq!(store.get(GridCell::new(3, 4)), &red());
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn remote_patch_is_last_writer_wins() {
        let mut store = PixelStore::new();
        store.apply_local(GridCell::new(3, 4), red());
        let blue = Color::parse("#0000FF").unwrap();
        let patch: PixelPatch = [(GridCell::new(3, 4), blue.clone())].into_iter().collect();
        assert_eq!(store.apply_remote(&patch), 1);
        assert_eq!(store.get(GridCell::new(3, 4)), &blue);
        // re-delivery changes nothing and leaves the revision alone
        let revision = store.revision();
        assert_eq!(store.apply_remote(&patch), 0);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn area_clear_is_idempotent() {
        let mut once = painted_store();
        once.apply_area_clear(GridCell::new(250, 250), 3);
        let mut twice = once.clone();
        twice.apply_area_clear(GridCell::new(250, 250), 3);
        assert_eq!(once.snapshot(), twice.snapshot());
        assert_eq!(once.revision(), twice.revision());
    }

    #[test]
    fn disjoint_clears_commute() {
        let mut ab = painted_store();
        ab.apply_area_clear(GridCell::new(243, 243), 2);
        ab.apply_area_clear(GridCell::new(255, 255), 3);
        let mut ba = painted_store();
        ba.apply_area_clear(GridCell::new(255, 255), 3);
        ba.apply_area_clear(GridCell::new(243, 243), 2);
        assert_eq!(ab.snapshot(), ba.snapshot());
    }

    #[test]
    fn clear_writes_explicit_background_entries() {
        let mut store = PixelStore::new();
        let patch = store.apply_area_clear(GridCell::new(0, 0), 1);
        assert_eq!(patch.len(), 3);
        assert_eq!(store.len(), 3);
        assert!(store.get(GridCell::new(1, 0)).is_background());
    }

    #[test]
    fn out_of_bounds_writes_are_dropped() {
        let mut store = PixelStore::new();
        assert!(store.apply_local(GridCell::new(500, 0), red()).is_empty());
        let patch: PixelPatch = [(GridCell::new(-1, 3), red())].into_iter().collect();
        assert_eq!(store.apply_remote(&patch), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn crop_is_row_major() {
        let mut store = PixelStore::new();
        store.apply_local(GridCell::new(11, 10), red());
        let colors = store.crop(&CellRect { x: 10, y: 10, width: 2, height: 2 });
        assert_eq!(colors.len(), 4);
        assert_eq!(colors[1], red());
        assert!(colors[0].is_background());
    }
}
