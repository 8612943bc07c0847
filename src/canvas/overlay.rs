//! Semi-transparent reference image drawn over the pixels as a painting guide.

use image::{imageops::FilterType, RgbaImage};

use crate::{
    constants::{OVERLAY_CELLS, OVERLAY_DEFAULT_OPACITY},
    error::{AppError, Result},
    models::{GridCell, ScreenPoint},
};

#[derive(Debug, Clone)]
pub struct ReferenceOverlay {
    /// One pixel per grid cell.
    cells: RgbaImage,
    /// World position of the top-left cell; fractional while dragging.
    origin: ScreenPoint,
    opacity: f32,
    locked: bool,
}

impl ReferenceOverlay {
    /// Decode any supported raster format and downscale it to the overlay grid.
    pub fn from_bytes(bytes: &[u8], origin: ScreenPoint) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|err| AppError::InvalidInput(format!("Failed to decode image: {err}")))?;
        let cells = decoded
            .resize_exact(OVERLAY_CELLS, OVERLAY_CELLS, FilterType::Nearest)
            .to_rgba8();
        tracing::info!(
            "Reference overlay loaded ({}x{} source) at {},{}",
            decoded.width(),
            decoded.height(),
            origin.x,
            origin.y
        );
        Ok(Self {
            cells,
            origin,
            opacity: OVERLAY_DEFAULT_OPACITY,
            locked: false,
        })
    }

    pub fn origin(&self) -> ScreenPoint {
        self.origin
    }

    /// Cell the overlay is anchored to.
    pub fn origin_cell(&self) -> GridCell {
        GridCell::new(self.origin.x.round() as i32, self.origin.y.round() as i32)
    }

    pub fn size(&self) -> u32 {
        OVERLAY_CELLS
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            OVERLAY_DEFAULT_OPACITY
        };
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    /// Whether a world point lies inside the overlay square.
    pub fn contains(&self, world: ScreenPoint) -> bool {
        let size = OVERLAY_CELLS as f64;
        world.x >= self.origin.x
            && world.x < self.origin.x + size
            && world.y >= self.origin.y
            && world.y < self.origin.y + size
    }

    /// Move by a world-space delta; ignored while locked.
    pub fn drag_by(&mut self, dx: f64, dy: f64) -> bool {
        if self.locked {
            return false;
        }
        self.origin = ScreenPoint::new(self.origin.x + dx, self.origin.y + dy);
        true
    }

    /// Overlay pixel covering `cell`, with the overlay opacity folded into alpha.
    pub fn sample(&self, cell: GridCell) -> Option<[u8; 4]> {
        let anchor = self.origin_cell();
        let (lx, ly) = (cell.x - anchor.x, cell.y - anchor.y);
        if lx < 0 || ly < 0 || lx >= OVERLAY_CELLS as i32 || ly >= OVERLAY_CELLS as i32 {
            return None;
        }
        let [r, g, b, a] = self.cells.get_pixel(lx as u32, ly as u32).0;
        let alpha = (a as f32 * self.opacity).round() as u8;
        Some([r, g, b, alpha])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, Rgba(rgba));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn loads_and_downscales_to_grid() {
        let bytes = png_bytes(100, 60, [255, 0, 0, 255]);
        let overlay = ReferenceOverlay::from_bytes(&bytes, ScreenPoint::new(5.0, 5.0)).unwrap();
        assert_eq!(overlay.size(), 25);
        assert_eq!(overlay.opacity(), 0.4);
        assert_eq!(overlay.sample(GridCell::new(5, 5)), Some([255, 0, 0, 102]));
        assert_eq!(overlay.sample(GridCell::new(29, 29)).map(|p| p[0]), Some(255));
        assert_eq!(overlay.sample(GridCell::new(30, 5)), None);
        assert_eq!(overlay.sample(GridCell::new(4, 5)), None);
    }

    #[test]
    fn rejects_non_image_bytes() {
        let err = ReferenceOverlay::from_bytes(b"not an image", ScreenPoint::default()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn locked_overlay_does_not_move() {
        let bytes = png_bytes(4, 4, [0, 0, 0, 255]);
        let mut overlay = ReferenceOverlay::from_bytes(&bytes, ScreenPoint::new(10.0, 10.0)).unwrap();
        assert!(overlay.contains(ScreenPoint::new(34.5, 10.0)));
        assert!(!overlay.contains(ScreenPoint::new(35.0, 10.0)));
        assert!(overlay.drag_by(2.5, -1.0));
        assert_eq!(overlay.origin(), ScreenPoint::new(12.5, 9.0));
        overlay.set_locked(true);
        assert!(!overlay.drag_by(1.0, 1.0));
        assert_eq!(overlay.origin(), ScreenPoint::new(12.5, 9.0));
    }

    #[test]
    fn opacity_is_clamped() {
        let bytes = png_bytes(4, 4, [0, 0, 0, 255]);
        let mut overlay = ReferenceOverlay::from_bytes(&bytes, ScreenPoint::default()).unwrap();
        overlay.set_opacity(1.7);
        assert_eq!(overlay.opacity(), 1.0);
        overlay.set_opacity(-0.2);
        assert_eq!(overlay.opacity(), 0.0);
        overlay.set_opacity(f32::NAN);
        assert_eq!(overlay.opacity(), 0.4);
    }
}
