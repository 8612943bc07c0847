//! Interaction modes and what each pointer gesture means in them.
//!
//! Exactly one [`SelectionState`] is active. Pan, zoom and cell selection are
//! suppressed while a weapon is targeting or an NFT region is being dragged.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::hit_test::PointerHit;
use crate::{
    constants::TAP_THRESHOLD_MS,
    error::{AppError, Result},
    models::{CellRect, GridCell, ScreenPoint},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weapon {
    Bomb,
    Rocket,
}

impl Weapon {
    pub fn label(&self) -> &'static str {
        match self {
            Weapon::Bomb => "Bomb",
            Weapon::Rocket => "Rocket",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionState {
    Idle,
    PixelSelected(GridCell),
    AreaTargeting {
        cell: GridCell,
        radius: u32,
        weapon: Weapon,
        pending_id: u64,
    },
    /// `start`/`current` stay empty until the first pointer-down.
    NftSelecting {
        start: Option<GridCell>,
        current: Option<GridCell>,
    },
    NftAreaConfirmed(CellRect),
}

impl SelectionState {
    pub fn selected_cell(&self) -> Option<GridCell> {
        match self {
            SelectionState::PixelSelected(cell) => Some(*cell),
            SelectionState::AreaTargeting { cell, .. } => Some(*cell),
            _ => None,
        }
    }

    /// Normalized rectangle being dragged, if any.
    pub fn nft_in_progress(&self) -> Option<CellRect> {
        match self {
            SelectionState::NftSelecting {
                start: Some(start),
                current: Some(current),
            } => Some(CellRect::normalize(*start, *current)),
            _ => None,
        }
    }

    pub fn nft_confirmed(&self) -> Option<CellRect> {
        match self {
            SelectionState::NftAreaConfirmed(rect) => Some(*rect),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragKind {
    None,
    Pan,
    Overlay,
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    pressed_at: Option<Instant>,
    moved: bool,
    drag: DragKind,
    last_client: ScreenPoint,
}

impl Default for Gesture {
    fn default() -> Self {
        Self {
            pressed_at: None,
            moved: false,
            drag: DragKind::None,
            last_client: ScreenPoint::default(),
        }
    }
}

/// What the caller must do in response to a gesture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEffect {
    None,
    /// Screen delta the content should follow.
    Pan { dx: f64, dy: f64 },
    /// Screen delta the reference overlay should follow.
    DragOverlay { dx: f64, dy: f64 },
    Selected(GridCell),
    NftProgress(CellRect),
    NftConfirmed(CellRect),
}

#[derive(Debug, Clone)]
pub struct SelectionMachine {
    state: SelectionState,
    gesture: Gesture,
    next_pending_id: u64,
    tap_threshold: Duration,
}

impl Default for SelectionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionMachine {
    pub fn new() -> Self {
        Self {
            state: SelectionState::Idle,
            gesture: Gesture::default(),
            next_pending_id: 1,
            tap_threshold: Duration::from_millis(TAP_THRESHOLD_MS),
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn is_interaction_disabled(&self) -> bool {
        matches!(
            self.state,
            SelectionState::AreaTargeting { .. } | SelectionState::NftSelecting { .. }
        )
    }

    pub fn is_dragging(&self) -> bool {
        self.gesture.drag != DragKind::None
    }

    /// `over_overlay` is true when the press lands on an unlocked overlay.
    pub fn pointer_down(&mut self, hit: &PointerHit, now: Instant, over_overlay: bool) -> InputEffect {
        match &mut self.state {
            SelectionState::AreaTargeting { .. } => return InputEffect::None,
            SelectionState::NftSelecting { start, current } => {
                if start.is_none() {
                    if let Some(cell) = hit.cell {
                        *start = Some(cell);
                        *current = Some(cell);
                        self.gesture = Gesture {
                            pressed_at: Some(now),
                            moved: false,
                            drag: DragKind::None,
                            last_client: hit.client,
                        };
                        return InputEffect::NftProgress(CellRect::normalize(cell, cell));
                    }
                }
                return InputEffect::None;
            }
            _ => {}
        }

        self.gesture = Gesture {
            pressed_at: Some(now),
            moved: false,
            drag: if over_overlay {
                DragKind::Overlay
            } else {
                DragKind::Pan
            },
            last_client: hit.client,
        };
        InputEffect::None
    }

    pub fn pointer_move(&mut self, hit: &PointerHit) -> InputEffect {
        if self.gesture.pressed_at.is_none() {
            return InputEffect::None;
        }
        let dx = hit.client.x - self.gesture.last_client.x;
        let dy = hit.client.y - self.gesture.last_client.y;
        if dx != 0.0 || dy != 0.0 {
            self.gesture.moved = true;
        }
        self.gesture.last_client = hit.client;

        if let SelectionState::NftSelecting {
            start: Some(start),
            current,
        } = &mut self.state
        {
            if let Some(cell) = hit.cell {
                *current = Some(cell);
            }
            let end = current.unwrap_or(*start);
            return InputEffect::NftProgress(CellRect::normalize(*start, end));
        }
        if self.is_interaction_disabled() {
            return InputEffect::None;
        }

        match self.gesture.drag {
            DragKind::Pan => InputEffect::Pan { dx, dy },
            DragKind::Overlay => InputEffect::DragOverlay { dx, dy },
            DragKind::None => InputEffect::None,
        }
    }

    /// `hit` may be `None` when the release happened off the canvas.
    pub fn pointer_up(&mut self, hit: Option<&PointerHit>, now: Instant) -> InputEffect {
        let gesture = std::mem::take(&mut self.gesture);

        if let SelectionState::NftSelecting {
            start: Some(start),
            current,
        } = &self.state
        {
            let end = current
                .or_else(|| hit.and_then(|h| h.cell))
                .unwrap_or(*start);
            let rect = CellRect::normalize(*start, end);
            self.state = SelectionState::NftAreaConfirmed(rect);
            tracing::debug!("NFT area confirmed: {}x{} at {},{}", rect.width, rect.height, rect.x, rect.y);
            return InputEffect::NftConfirmed(rect);
        }

        let Some(pressed_at) = gesture.pressed_at else {
            return InputEffect::None;
        };
        let is_tap = now.saturating_duration_since(pressed_at) < self.tap_threshold && !gesture.moved;
        if !is_tap || gesture.drag == DragKind::Overlay {
            return InputEffect::None;
        }
        match (&self.state, hit.and_then(|h| h.cell)) {
            (SelectionState::Idle | SelectionState::PixelSelected(_), Some(cell)) => {
                self.state = SelectionState::PixelSelected(cell);
                InputEffect::Selected(cell)
            }
            _ => InputEffect::None,
        }
    }

    /// Enter weapon targeting on the selected cell; returns the pending id.
    pub fn begin_targeting(&mut self, weapon: Weapon, radius: u32) -> Result<(u64, GridCell)> {
        let cell = match &self.state {
            SelectionState::PixelSelected(cell) => *cell,
            SelectionState::AreaTargeting { .. } => {
                return Err(AppError::ActionPending(weapon.label().to_string()))
            }
            SelectionState::NftSelecting { .. } => return Err(AppError::InteractionDisabled),
            _ => return Err(AppError::NoPixelSelected),
        };
        let pending_id = self.next_pending_id;
        self.next_pending_id += 1;
        self.gesture = Gesture::default();
        self.state = SelectionState::AreaTargeting {
            cell,
            radius,
            weapon,
            pending_id,
        };
        Ok((pending_id, cell))
    }

    /// Leave targeting after the transaction settles, success or not.
    pub fn resolve_targeting(&mut self, pending_id: u64) -> bool {
        match self.state {
            SelectionState::AreaTargeting { pending_id: id, .. } if id == pending_id => {
                self.state = SelectionState::Idle;
                true
            }
            _ => {
                tracing::warn!("Stale targeting resolution for pending id {}", pending_id);
                false
            }
        }
    }

    /// Leave targeting after a failed transaction; the target cell stays selected.
    pub fn cancel_targeting(&mut self, pending_id: u64) -> bool {
        match self.state {
            SelectionState::AreaTargeting { cell, pending_id: id, .. } if id == pending_id => {
                self.state = SelectionState::PixelSelected(cell);
                true
            }
            _ => false,
        }
    }

    pub fn start_nft_capture(&mut self) -> Result<()> {
        match self.state {
            SelectionState::Idle | SelectionState::PixelSelected(_) => {
                self.gesture = Gesture::default();
                self.state = SelectionState::NftSelecting {
                    start: None,
                    current: None,
                };
                Ok(())
            }
            SelectionState::NftAreaConfirmed(_) => Err(AppError::InvalidInput(
                "an NFT area is already selected; clear it first".to_string(),
            )),
            SelectionState::NftSelecting { .. } | SelectionState::AreaTargeting { .. } => {
                Err(AppError::InteractionDisabled)
            }
        }
    }

    /// Drop an NFT selection, in progress or confirmed.
    pub fn clear_nft(&mut self) -> bool {
        match self.state {
            SelectionState::NftSelecting { .. } | SelectionState::NftAreaConfirmed(_) => {
                self.gesture = Gesture::default();
                self.state = SelectionState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn mint_succeeded(&mut self) {
        if matches!(self.state, SelectionState::NftAreaConfirmed(_)) {
            self.state = SelectionState::Idle;
        }
    }

    /// Drop a pixel selection (Idle stays Idle).
    pub fn deselect(&mut self) {
        if matches!(self.state, SelectionState::PixelSelected(_)) {
            self.state = SelectionState::Idle;
        }
    }
}
