//! Affine mapping between world grid cells and screen pixels.
//!
//! `screen = (world - offset) * scale`; `offset` is the world coordinate of the
//! screen origin and is kept inside `[0, CANVAS_SIZE - visible_extent]`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::{
    constants::{
        BUTTON_ZOOM_STEP, CANVAS_SIZE, INITIAL_OFFSET, INITIAL_SCALE, MAX_SCALE, MIN_SCALE,
        WHEEL_ZOOM_STEP,
    },
    models::{GridCell, ScreenPoint},
};

/// How a screen point is snapped to a cell.
///
/// `Legacy` reproduces the deployed clients: x is `floor(px/scale + 0.5 + offset)`,
/// y is the same expression rounded half-up. Both pick the neighbouring cell once
/// the pointer is past the middle of a cell, and the y axis is one cell further
/// down than x for the same fraction. `Exact` snaps to the cell drawn under the
/// pointer on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HitRounding {
    #[default]
    Legacy,
    Exact,
}

impl FromStr for HitRounding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(HitRounding::Legacy),
            "exact" => Ok(HitRounding::Exact),
            other => Err(format!("unknown hit rounding '{other}' (expected legacy|exact)")),
        }
    }
}

/// Zoom direction of one wheel tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Positive wheel delta scrolls away from the user and zooms out.
    pub fn from_wheel_delta(delta_y: f64) -> Self {
        if delta_y > 0.0 {
            ZoomDirection::Out
        } else {
            ZoomDirection::In
        }
    }

    fn step(self) -> f64 {
        match self {
            ZoomDirection::In => WHEEL_ZOOM_STEP,
            ZoomDirection::Out => -WHEEL_ZOOM_STEP,
        }
    }
}

/// Half-open range of visible cells, `[start, end)` on each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleWindow {
    pub start_x: i32,
    pub start_y: i32,
    pub end_x: i32,
    pub end_y: i32,
}

impl VisibleWindow {
    pub fn contains(&self, cell: GridCell) -> bool {
        cell.x >= self.start_x && cell.x < self.end_x && cell.y >= self.start_y && cell.y < self.end_y
    }

    pub fn cell_count(&self) -> usize {
        let w = (self.end_x - self.start_x).max(0) as usize;
        let h = (self.end_y - self.start_y).max(0) as usize;
        w * h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// Screen pixels per cell.
    pub scale: f64,
    /// World coordinate of the screen's top-left corner.
    pub offset: ScreenPoint,
    /// Size of the drawing surface in screen pixels.
    pub width: f64,
    pub height: f64,
}

// JavaScript `Math.round`: halves round towards +inf, also for negatives.
fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn clamp_axis(value: f64, extent: f64) -> f64 {
    // Same clamp order as max(0, min(limit, v)) so an oversized view pins to 0.
    value.min(CANVAS_SIZE as f64 - extent).max(0.0)
}

impl ViewportState {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            scale: INITIAL_SCALE,
            offset: ScreenPoint::new(INITIAL_OFFSET.0, INITIAL_OFFSET.1),
            width,
            height,
        }
        .clamped()
    }

    pub fn with(scale: f64, offset: ScreenPoint, width: f64, height: f64) -> Self {
        Self {
            scale: scale.clamp(MIN_SCALE, MAX_SCALE),
            offset,
            width,
            height,
        }
        .clamped()
    }

    pub fn world_to_screen(&self, cell: GridCell) -> ScreenPoint {
        ScreenPoint::new(
            (cell.x as f64 - self.offset.x) * self.scale,
            (cell.y as f64 - self.offset.y) * self.scale,
        )
    }

    /// Fractional world position under a canvas-relative screen point.
    pub fn screen_to_world_point(&self, canvas: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(
            canvas.x / self.scale + self.offset.x,
            canvas.y / self.scale + self.offset.y,
        )
    }

    /// Cell under a canvas-relative point, `None` outside the board.
    pub fn screen_to_world(&self, px: f64, py: f64, rounding: HitRounding) -> Option<GridCell> {
        let (wx, wy) = match rounding {
            HitRounding::Legacy => {
                let half = self.scale / 2.0;
                (
                    ((px + half) / self.scale + self.offset.x).floor(),
                    round_half_up((py + half) / self.scale + self.offset.y),
                )
            }
            HitRounding::Exact => (
                (px / self.scale + self.offset.x).floor(),
                (py / self.scale + self.offset.y).floor(),
            ),
        };
        if !wx.is_finite() || !wy.is_finite() {
            return None;
        }
        let cell = GridCell::new(wx as i32, wy as i32);
        let size = CANVAS_SIZE as f64;
        if wx < 0.0 || wy < 0.0 || wx >= size || wy >= size {
            return None;
        }
        Some(cell)
    }

    /// One wheel tick of zoom keeping the world point under `anchor` fixed.
    pub fn zoom_at(&self, anchor: ScreenPoint, direction: ZoomDirection) -> Self {
        self.zoom_to(anchor, self.scale + direction.step())
    }

    /// Button zoom (`±BUTTON_ZOOM_STEP` per press) anchored at the view centre.
    pub fn zoom_by(&self, steps: i32) -> Self {
        let center = ScreenPoint::new(self.width / 2.0, self.height / 2.0);
        self.zoom_to(center, self.scale + steps as f64 * BUTTON_ZOOM_STEP)
    }

    fn zoom_to(&self, anchor: ScreenPoint, target_scale: f64) -> Self {
        let world = self.screen_to_world_point(anchor);
        let scale = target_scale.clamp(MIN_SCALE, MAX_SCALE);
        Self {
            scale,
            offset: ScreenPoint::new(world.x - anchor.x / scale, world.y - anchor.y / scale),
            width: self.width,
            height: self.height,
        }
        .clamped()
    }

    /// Drag by a screen delta; content follows the pointer.
    pub fn pan_by(&self, dx_screen: f64, dy_screen: f64) -> Self {
        Self {
            offset: ScreenPoint::new(
                self.offset.x - dx_screen / self.scale,
                self.offset.y - dy_screen / self.scale,
            ),
            ..*self
        }
        .clamped()
    }

    pub fn resize(&self, width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..*self
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            offset: ScreenPoint::new(
                clamp_axis(self.offset.x, self.width / self.scale),
                clamp_axis(self.offset.y, self.height / self.scale),
            ),
            ..self
        }
    }

    pub fn visible_window(&self) -> VisibleWindow {
        VisibleWindow {
            start_x: self.offset.x.floor().max(0.0) as i32,
            start_y: self.offset.y.floor().max(0.0) as i32,
            end_x: (self.offset.x + self.width / self.scale).ceil().min(CANVAS_SIZE as f64) as i32,
            end_y: (self.offset.y + self.height / self.scale).ceil().min(CANVAS_SIZE as f64) as i32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(scale: f64, ox: f64, oy: f64) -> ViewportState {
        ViewportState::with(scale, ScreenPoint::new(ox, oy), 375.0, 600.0)
    }

    #[test]
    fn world_to_screen_is_affine() {
        let v = view(16.0, 200.0, 200.0);
        assert_eq!(v.world_to_screen(GridCell::new(205, 210)), ScreenPoint::new(80.0, 160.0));
    }

    #[test]
    fn legacy_rounding_matches_deployed_clients() {
        // (80 + 8) / 16 + 200 = 205.5 -> floor on x, half-up on y
        let v = view(16.0, 200.0, 200.0);
        assert_eq!(v.screen_to_world(80.0, 80.0, HitRounding::Legacy), Some(GridCell::new(205, 206)));
    }

    #[test]
    fn exact_rounding_picks_drawn_cell() {
        let v = view(16.0, 200.0, 200.0);
        assert_eq!(v.screen_to_world(80.0, 80.0, HitRounding::Exact), Some(GridCell::new(205, 205)));
        assert_eq!(v.screen_to_world(95.9, 95.9, HitRounding::Exact), Some(GridCell::new(205, 205)));
    }

    #[test]
    fn round_trip_oracle_over_scales() {
        // Top-left corner of a cell maps back to the cell under `Exact`; under
        // `Legacy` x is stable and y lands one row below.
        for scale in 3..=40 {
            let v = view(scale as f64, 100.0, 120.0);
            let window = v.visible_window();
            for cell in [
                GridCell::new(window.start_x, window.start_y),
                GridCell::new(window.start_x + 3, window.start_y + 5),
                GridCell::new(window.end_x - 1, window.end_y - 2),
            ] {
                let p = v.world_to_screen(cell);
                assert_eq!(v.screen_to_world(p.x, p.y, HitRounding::Exact), Some(cell), "scale {scale}");
                assert_eq!(
                    v.screen_to_world(p.x, p.y, HitRounding::Legacy),
                    Some(GridCell::new(cell.x, cell.y + 1)),
                    "scale {scale}"
                );
            }
        }
    }

    #[test]
    fn screen_to_world_rejects_outside_board() {
        let v = view(10.0, 0.0, 0.0);
        assert_eq!(v.screen_to_world(-20.0, 5.0, HitRounding::Exact), None);
        let far = view(10.0, 490.0, 490.0);
        assert_eq!(far.screen_to_world(374.0, 599.0, HitRounding::Legacy), None);
    }

    #[test]
    fn legacy_half_cell_left_of_board_is_still_inside() {
        // -0.5 rounds up to 0 on the y axis, as Math.round does.
        let v = view(10.0, 0.0, 0.0);
        assert_eq!(v.screen_to_world(0.0, -10.0, HitRounding::Legacy), Some(GridCell::new(0, 0)));
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let v = view(16.0, 200.0, 200.0);
        let anchor = ScreenPoint::new(150.0, 222.0);
        let before = v.screen_to_world_point(anchor);
        for direction in [ZoomDirection::In, ZoomDirection::Out] {
            let zoomed = v.zoom_at(anchor, direction);
            let back_x = (before.x - zoomed.offset.x) * zoomed.scale;
            let back_y = (before.y - zoomed.offset.y) * zoomed.scale;
            assert!((back_x - anchor.x).abs() <= 1.0);
            assert!((back_y - anchor.y).abs() <= 1.0);
        }
    }

    #[test]
    fn zoom_is_clamped_to_bounds() {
        let v = view(40.0, 200.0, 200.0);
        assert_eq!(v.zoom_at(ScreenPoint::new(10.0, 10.0), ZoomDirection::In).scale, 40.0);
        let v = view(3.0, 0.0, 0.0);
        assert_eq!(v.zoom_at(ScreenPoint::new(10.0, 10.0), ZoomDirection::Out).scale, 3.0);
    }

    #[test]
    fn wheel_delta_sign_selects_direction() {
        assert_eq!(ZoomDirection::from_wheel_delta(120.0), ZoomDirection::Out);
        assert_eq!(ZoomDirection::from_wheel_delta(-120.0), ZoomDirection::In);
        assert_eq!(ZoomDirection::from_wheel_delta(0.0), ZoomDirection::In);
    }

    #[test]
    fn offset_stays_inside_board() {
        let v = view(16.0, 200.0, 200.0).pan_by(1.0e6, 1.0e6);
        assert_eq!(v.offset, ScreenPoint::new(0.0, 0.0));
        let v = v.pan_by(-1.0e6, -1.0e6);
        assert!((v.offset.x + v.width / v.scale - 500.0).abs() < 1e-9);
        assert!((v.offset.y + v.height / v.scale - 500.0).abs() < 1e-9);
    }

    #[test]
    fn pan_moves_content_with_pointer() {
        let v = view(10.0, 100.0, 100.0);
        let moved = v.pan_by(-50.0, 20.0);
        assert_eq!(moved.offset, ScreenPoint::new(105.0, 98.0));
    }

    #[test]
    fn visible_window_is_bounded() {
        let v = view(16.0, 200.0, 200.0);
        let w = v.visible_window();
        assert_eq!((w.start_x, w.start_y), (200, 200));
        assert_eq!((w.end_x, w.end_y), (224, 238));
        assert!(w.cell_count() < 500 * 500);
    }

    #[test]
    fn hit_rounding_parses_from_env_values() {
        assert_eq!("EXACT".parse::<HitRounding>(), Ok(HitRounding::Exact));
        assert!("nearest".parse::<HitRounding>().is_err());
    }
}
