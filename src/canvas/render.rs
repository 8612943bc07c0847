//! Display-list construction and a software frame painter.
//!
//! A frame is built only from the visible window of the viewport. Layers are
//! emitted back to front in [`Layer`] order and that order is kept when the
//! list is painted, so later layers always cover earlier ones.

use image::{Rgba, RgbaImage};
use std::time::Instant;

use super::{
    effects::{EffectKind, EffectQueue},
    overlay::ReferenceOverlay,
    pixel_store::PixelStore,
    rasterizer::disk_cells_within,
    selection::SelectionState,
    viewport::ViewportState,
};
use crate::{
    constants::{
        GRID_LINES_MIN_SCALE, HOVER_PREVIEW_ALPHA, HOVER_PREVIEW_MIN_SCALE,
        PIXEL_HIGHLIGHT_MIN_SCALE,
    },
    models::{CellRect, Color, GridCell, ScreenPoint},
};

const GRID_LINE: [u8; 4] = [255, 255, 255, 26];
const NFT_ACCENT: [u8; 4] = [255, 214, 53, 255];
const NFT_FILL: [u8; 4] = [255, 214, 53, 77];
const HIGHLIGHT_OUTER: [u8; 4] = [59, 130, 246, 255];
const HIGHLIGHT_INNER: [u8; 4] = [96, 165, 250, 255];
const HOVER_OUTLINE: [u8; 4] = [255, 255, 255, 255];
const TARGET_FILL: [u8; 4] = [255, 69, 0, 90];
const BOOM_COLOR: [u8; 3] = [255, 69, 0];
const ROCKET_COLOR: [u8; 3] = [255, 215, 0];
const CORNER_MARKER: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Pixels,
    ReferenceOverlay,
    SelectionInProgress,
    SelectionConfirmed,
    PixelHighlight,
    HoverPreview,
    TargetHighlight,
    Effects,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Fill,
    Stroke { width: f64 },
}

/// One rectangle in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawOp {
    pub layer: Layer,
    pub shape: Shape,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub rgba: [u8; 4],
}

impl DrawOp {
    fn fill(layer: Layer, x: f64, y: f64, width: f64, height: f64, rgba: [u8; 4]) -> Self {
        Self {
            layer,
            shape: Shape::Fill,
            x,
            y,
            width,
            height,
            rgba,
        }
    }

    fn stroke(layer: Layer, x: f64, y: f64, width: f64, height: f64, rgba: [u8; 4], line: f64) -> Self {
        Self {
            layer,
            shape: Shape::Stroke { width: line },
            x,
            y,
            width,
            height,
            rgba,
        }
    }
}

/// Everything a frame depends on.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub viewport: &'a ViewportState,
    pub store: &'a PixelStore,
    pub selection: &'a SelectionState,
    pub overlay: Option<&'a ReferenceOverlay>,
    pub effects: &'a EffectQueue,
    pub hover: Option<GridCell>,
    pub selected_color: &'a Color,
    pub now: Instant,
}

fn with_alpha(rgba: [u8; 4], alpha: f32) -> [u8; 4] {
    [rgba[0], rgba[1], rgba[2], (alpha.clamp(0.0, 1.0) * 255.0).round() as u8]
}

fn rect_on_screen(viewport: &ViewportState, rect: &CellRect) -> (f64, f64, f64, f64) {
    let top_left = viewport.world_to_screen(GridCell::new(rect.x, rect.y));
    (
        top_left.x,
        top_left.y,
        rect.width as f64 * viewport.scale,
        rect.height as f64 * viewport.scale,
    )
}

pub fn build_display_list(scene: &Scene<'_>) -> Vec<DrawOp> {
    let viewport = scene.viewport;
    let scale = viewport.scale;
    let window = viewport.visible_window();
    let mut ops = Vec::with_capacity(window.cell_count() + 16);

    let background = scene.store.background().to_rgba();
    ops.push(DrawOp::fill(Layer::Pixels, 0.0, 0.0, viewport.width, viewport.height, background));
    for y in window.start_y..window.end_y {
        for x in window.start_x..window.end_x {
            let cell = GridCell::new(x, y);
            let pos = viewport.world_to_screen(cell);
            let (cx, cy) = (pos.x.floor(), pos.y.floor());
            let color = scene.store.get(cell);
            if !color.is_background() {
                ops.push(DrawOp::fill(Layer::Pixels, cx, cy, scale, scale, color.to_rgba()));
            }
            if scale >= GRID_LINES_MIN_SCALE {
                ops.push(DrawOp::stroke(Layer::Pixels, cx + 0.5, cy + 0.5, scale - 1.0, scale - 1.0, GRID_LINE, 1.0));
            }
        }
    }

    if let Some(overlay) = scene.overlay {
        let anchor = overlay.origin_cell();
        let size = overlay.size() as i32;
        for y in anchor.y..anchor.y + size {
            for x in anchor.x..anchor.x + size {
                let cell = GridCell::new(x, y);
                if !window.contains(cell) {
                    continue;
                }
                if let Some(rgba) = overlay.sample(cell).filter(|p| p[3] > 0) {
                    let pos = viewport.world_to_screen(cell);
                    ops.push(DrawOp::fill(Layer::ReferenceOverlay, pos.x, pos.y, scale, scale, rgba));
                }
            }
        }
    }

    if let Some(rect) = scene.selection.nft_in_progress() {
        let (x, y, w, h) = rect_on_screen(viewport, &rect);
        ops.push(DrawOp::fill(Layer::SelectionInProgress, x, y, w, h, NFT_FILL));
        ops.push(DrawOp::stroke(Layer::SelectionInProgress, x, y, w, h, NFT_ACCENT, 3.0));
    }

    if let Some(rect) = scene.selection.nft_confirmed() {
        let (x, y, w, h) = rect_on_screen(viewport, &rect);
        ops.push(DrawOp::stroke(Layer::SelectionConfirmed, x, y, w, h, NFT_ACCENT, 2.0));
        let half = CORNER_MARKER / 2.0;
        for (cx, cy) in [(x, y), (x + w, y), (x, y + h), (x + w, y + h)] {
            ops.push(DrawOp::fill(
                Layer::SelectionConfirmed,
                cx - half,
                cy - half,
                CORNER_MARKER,
                CORNER_MARKER,
                NFT_ACCENT,
            ));
        }
    }

    if let SelectionState::PixelSelected(cell) = scene.selection {
        if scale >= PIXEL_HIGHLIGHT_MIN_SCALE {
            let pos = viewport.world_to_screen(*cell);
            ops.push(DrawOp::stroke(Layer::PixelHighlight, pos.x, pos.y, scale, scale, HIGHLIGHT_OUTER, 2.0));
            ops.push(DrawOp::stroke(
                Layer::PixelHighlight,
                pos.x + 1.0,
                pos.y + 1.0,
                scale - 2.0,
                scale - 2.0,
                HIGHLIGHT_INNER,
                1.0,
            ));
        }
    }

    let hover_suppressed = matches!(
        scene.selection,
        SelectionState::AreaTargeting { .. }
            | SelectionState::NftSelecting { .. }
            | SelectionState::NftAreaConfirmed(_)
    );
    if let Some(hover) = scene.hover.filter(|_| !hover_suppressed && scale >= HOVER_PREVIEW_MIN_SCALE) {
        let pos = viewport.world_to_screen(hover);
        let fill = with_alpha(scene.selected_color.to_rgba(), HOVER_PREVIEW_ALPHA);
        ops.push(DrawOp::fill(Layer::HoverPreview, pos.x, pos.y, scale, scale, fill));
        ops.push(DrawOp::stroke(
            Layer::HoverPreview,
            pos.x + 0.5,
            pos.y + 0.5,
            scale - 1.0,
            scale - 1.0,
            HOVER_OUTLINE,
            1.0,
        ));
    }

    if let SelectionState::AreaTargeting { cell, radius, .. } = scene.selection {
        push_disk(&mut ops, viewport, Layer::TargetHighlight, *cell, *radius, TARGET_FILL);
    }

    for effect in scene.effects.active(scene.now) {
        let rgb = match effect.kind {
            EffectKind::Boom => BOOM_COLOR,
            EffectKind::Rocket => ROCKET_COLOR,
        };
        let alpha = 1.0 - effect.progress(scene.now);
        let rgba = with_alpha([rgb[0], rgb[1], rgb[2], 255], alpha);
        push_disk(&mut ops, viewport, Layer::Effects, effect.center, effect.radius, rgba);
    }

    ops
}

fn push_disk(
    ops: &mut Vec<DrawOp>,
    viewport: &ViewportState,
    layer: Layer,
    center: GridCell,
    radius: u32,
    rgba: [u8; 4],
) {
    let w = viewport.visible_window();
    for cell in disk_cells_within(center, radius, w.start_x, w.start_y, w.end_x, w.end_y) {
        let pos = viewport.world_to_screen(cell);
        ops.push(DrawOp::fill(layer, pos.x, pos.y, viewport.scale, viewport.scale, rgba));
    }
}

/// Source-over compositing of straight-alpha pixels.
fn alpha_blend(dst: Rgba<u8>, src: [u8; 4]) -> Rgba<u8> {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 || dst[3] == 0 {
        return Rgba(src);
    }
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let inv = 1.0 / out_a;
    let channel = |i: usize| {
        ((src[i] as f32 * sa + dst[i] as f32 * da * (1.0 - sa)) * inv)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    Rgba([channel(0), channel(1), channel(2), (out_a * 255.0).round() as u8])
}

/// Paints display lists onto an RGBA surface the size of the viewport.
#[derive(Debug, Clone)]
pub struct FrameRenderer {
    surface: RgbaImage,
}

impl FrameRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: RgbaImage::new(width.max(1), height.max(1)),
        }
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.surface.dimensions() != (width.max(1), height.max(1)) {
            self.surface = RgbaImage::new(width.max(1), height.max(1));
        }
    }

    pub fn paint(&mut self, ops: &[DrawOp]) {
        for pixel in self.surface.pixels_mut() {
            *pixel = Rgba([0, 0, 0, 0]);
        }
        for op in ops {
            match op.shape {
                Shape::Fill => self.fill(op.x, op.y, op.width, op.height, op.rgba),
                Shape::Stroke { width: line } => {
                    let half = line / 2.0;
                    let (x0, y0) = (op.x - half, op.y - half);
                    let (x1, y1) = (op.x + op.width - half, op.y + op.height - half);
                    self.fill(x0, y0, op.width + line, line, op.rgba);
                    self.fill(x0, y1, op.width + line, line, op.rgba);
                    self.fill(x0, y0 + line, line, op.height - line, op.rgba);
                    self.fill(x1, y0 + line, line, op.height - line, op.rgba);
                }
            }
        }
    }

    fn fill(&mut self, x: f64, y: f64, width: f64, height: f64, rgba: [u8; 4]) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        let (sw, sh) = self.surface.dimensions();
        let x0 = x.round().max(0.0) as u32;
        let y0 = y.round().max(0.0) as u32;
        let x1 = ((x + width).round().max(0.0) as u32).min(sw);
        let y1 = ((y + height).round().max(0.0) as u32).min(sh);
        for py in y0..y1 {
            for px in x0..x1 {
                let dst = self.surface.get_pixel_mut(px, py);
                *dst = alpha_blend(*dst, rgba);
            }
        }
    }
}

/// Inputs that decide whether the previous frame is still valid.
#[derive(Debug, Clone, PartialEq)]
struct FrameKey {
    revision: u64,
    viewport: ViewportState,
    selection: SelectionState,
    hover: Option<GridCell>,
    overlay: Option<(ScreenPoint, u32, bool)>,
    selected_color: Color,
    animating: bool,
}

impl FrameKey {
    fn of(scene: &Scene<'_>) -> Self {
        Self {
            revision: scene.store.revision(),
            viewport: *scene.viewport,
            selection: scene.selection.clone(),
            hover: scene.hover,
            overlay: scene
                .overlay
                .map(|o| (o.origin(), (o.opacity() * 1000.0) as u32, o.is_locked())),
            selected_color: scene.selected_color.clone(),
            animating: scene.effects.active(scene.now).next().is_some(),
        }
    }
}

/// Redraws only when something the frame depends on has changed.
#[derive(Debug, Clone)]
pub struct RenderLoop {
    renderer: FrameRenderer,
    last: Option<FrameKey>,
    frames: u64,
}

impl RenderLoop {
    pub fn new(viewport: &ViewportState) -> Self {
        Self {
            renderer: FrameRenderer::new(viewport.width as u32, viewport.height as u32),
            last: None,
            frames: 0,
        }
    }

    /// Returns the new frame, or `None` when the previous one is still current.
    pub fn render_if_dirty(&mut self, scene: &Scene<'_>) -> Option<&RgbaImage> {
        let key = FrameKey::of(scene);
        // effects animate, so an active one keeps every frame dirty
        if !key.animating && self.last.as_ref() == Some(&key) {
            return None;
        }
        self.renderer
            .resize(scene.viewport.width as u32, scene.viewport.height as u32);
        let ops = build_display_list(scene);
        self.renderer.paint(&ops);
        self.last = Some(key);
        self.frames += 1;
        Some(self.renderer.surface())
    }

    pub fn invalidate(&mut self) {
        self.last = None;
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::selection::Weapon;

    struct Fixture {
        viewport: ViewportState,
        store: PixelStore,
        selection: SelectionState,
        effects: EffectQueue,
        color: Color,
        now: Instant,
    }

    impl Fixture {
        fn new(scale: f64) -> Self {
            Self {
                viewport: ViewportState::with(scale, ScreenPoint::new(200.0, 200.0), 160.0, 160.0),
                store: PixelStore::new(),
                selection: SelectionState::Idle,
                effects: EffectQueue::new(),
                color: Color::parse("#FF4500").unwrap(),
                now: Instant::now(),
            }
        }

        fn scene(&self, hover: Option<GridCell>) -> Scene<'_> {
            Scene {
                viewport: &self.viewport,
                store: &self.store,
                selection: &self.selection,
                overlay: None,
                effects: &self.effects,
                hover,
                selected_color: &self.color,
                now: self.now,
            }
        }
    }

    fn layers(ops: &[DrawOp]) -> Vec<Layer> {
        let mut seen: Vec<Layer> = ops.iter().map(|op| op.layer).collect();
        seen.dedup();
        seen
    }

    #[test]
    fn only_visible_cells_are_drawn() {
        let mut fx = Fixture::new(16.0);
        fx.store.apply_local(GridCell::new(205, 205), fx.color.clone());
        fx.store.apply_local(GridCell::new(100, 100), fx.color.clone());
        let ops = build_display_list(&fx.scene(None));
        let pixel_fills: Vec<_> = ops
            .iter()
            .filter(|op| op.layer == Layer::Pixels && op.shape == Shape::Fill && op.rgba != fx.store.background().to_rgba())
            .collect();
        assert_eq!(pixel_fills.len(), 1);
        assert_eq!((pixel_fills[0].x, pixel_fills[0].y), (80.0, 80.0));
        // 10x10 visible cells, one grid stroke each at scale 16, plus the background
        let strokes = ops.iter().filter(|op| matches!(op.shape, Shape::Stroke { .. })).count();
        assert_eq!(strokes, 100);
    }

    #[test]
    fn grid_lines_hidden_when_zoomed_out() {
        let fx = Fixture::new(4.0);
        let ops = build_display_list(&fx.scene(None));
        assert!(ops.iter().all(|op| op.shape == Shape::Fill));
    }

    #[test]
    fn layers_come_out_back_to_front() {
        let mut fx = Fixture::new(16.0);
        fx.selection = SelectionState::PixelSelected(GridCell::new(203, 203));
        fx.effects.spawn(EffectKind::Boom, GridCell::new(205, 205), 1, fx.now);
        let ops = build_display_list(&fx.scene(Some(GridCell::new(201, 201))));
        assert_eq!(
            layers(&ops),
            vec![Layer::Pixels, Layer::PixelHighlight, Layer::HoverPreview, Layer::Effects]
        );
        let mut sorted = ops.clone();
        sorted.sort_by_key(|op| op.layer);
        assert_eq!(sorted, ops);
    }

    #[test]
    fn hover_is_suppressed_while_targeting() {
        let mut fx = Fixture::new(16.0);
        fx.selection = SelectionState::AreaTargeting {
            cell: GridCell::new(205, 205),
            radius: 3,
            weapon: Weapon::Bomb,
            pending_id: 1,
        };
        let ops = build_display_list(&fx.scene(Some(GridCell::new(201, 201))));
        let seen = layers(&ops);
        assert!(!seen.contains(&Layer::HoverPreview));
        let targets = ops.iter().filter(|op| op.layer == Layer::TargetHighlight).count();
        // radius-3 disk around (205,205) clipped to the 200..210 window
        assert_eq!(targets, 29);
    }

    #[test]
    fn confirmed_nft_rect_has_corner_markers() {
        let mut fx = Fixture::new(16.0);
        fx.selection = SelectionState::NftAreaConfirmed(CellRect { x: 201, y: 201, width: 3, height: 2 });
        let ops = build_display_list(&fx.scene(None));
        let confirmed: Vec<_> = ops.iter().filter(|op| op.layer == Layer::SelectionConfirmed).collect();
        assert_eq!(confirmed.len(), 5);
        assert_eq!(confirmed[0].shape, Shape::Stroke { width: 2.0 });
        assert_eq!((confirmed[0].width, confirmed[0].height), (48.0, 32.0));
    }

    #[test]
    fn painter_blends_translucent_fills() {
        let mut renderer = FrameRenderer::new(4, 4);
        renderer.paint(&[
            DrawOp::fill(Layer::Pixels, 0.0, 0.0, 4.0, 4.0, [0, 0, 0, 255]),
            DrawOp::fill(Layer::HoverPreview, 0.0, 0.0, 2.0, 2.0, [255, 255, 255, 128]),
        ]);
        let blended = renderer.surface().get_pixel(0, 0).0;
        assert_eq!(blended[3], 255);
        assert!((127..=129).contains(&blended[0]));
        assert_eq!(renderer.surface().get_pixel(3, 3).0, [0, 0, 0, 255]);
    }

    #[test]
    fn render_loop_skips_unchanged_frames() {
        let mut fx = Fixture::new(16.0);
        let mut render_loop = RenderLoop::new(&fx.viewport);
        assert!(render_loop.render_if_dirty(&fx.scene(None)).is_some());
        assert!(render_loop.render_if_dirty(&fx.scene(None)).is_none());
        fx.store.apply_local(GridCell::new(205, 205), fx.color.clone());
        let frame = render_loop.render_if_dirty(&fx.scene(None)).unwrap();
        assert_eq!(frame.get_pixel(85, 85).0, [255, 69, 0, 255]);
        assert_eq!(render_loop.frames_rendered(), 2);
    }
}
