use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{
    constants::{BACKGROUND_COLOR, CANVAS_SIZE},
    error::{AppError, Result},
};

/// One addressable cell of the 500×500 board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

impl GridCell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(&self) -> bool {
        (0..CANVAS_SIZE).contains(&self.x) && (0..CANVAS_SIZE).contains(&self.y)
    }

    /// Canonical `"x,y"` key used on the realtime channel.
    pub fn key(&self) -> String {
        format!("{},{}", self.x, self.y)
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let (x, y) = key.split_once(',')?;
        let cell = Self::new(x.trim().parse().ok()?, y.trim().parse().ok()?);
        cell.in_bounds().then_some(cell)
    }

    pub fn packed(&self) -> u32 {
        (self.y * CANVAS_SIZE + self.x) as u32
    }

    pub fn distance_squared(&self, other: &GridCell) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx * dx + dy * dy
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Hex color identifier (`#RGB` or `#RRGGBB`), stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let Some(hex) = trimmed.strip_prefix('#') else {
            return Err(AppError::InvalidInput(format!("color must start with '#': {raw}")));
        };
        if !(hex.len() == 3 || hex.len() == 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AppError::InvalidInput(format!("invalid hex color: {raw}")));
        }
        Ok(Self(format!("#{}", hex.to_ascii_uppercase())))
    }

    pub fn background() -> Self {
        Self(BACKGROUND_COLOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_background(&self) -> bool {
        self.to_rgba() == Color::background().to_rgba()
    }

    pub fn to_rgba(&self) -> [u8; 4] {
        let hex = &self.0[1..];
        let channel = |s: &str| u8::from_str_radix(s, 16).unwrap_or(0);
        if hex.len() == 3 {
            let expand = |i: usize| channel(&hex[i..i + 1]) * 17;
            [expand(0), expand(1), expand(2), 255]
        } else {
            [channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6]), 255]
        }
    }
}

impl TryFrom<String> for Color {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Screen-space (or fractional world-space) point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle of cells; `width` and `height` are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl CellRect {
    /// Rectangle spanned by two corner cells, inclusive of both.
    pub fn normalize(a: GridCell, b: GridCell) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).unsigned_abs() + 1,
            height: (a.y - b.y).unsigned_abs() + 1,
        }
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        cell.x >= self.x
            && cell.y >= self.y
            && cell.x < self.x + self.width as i32
            && cell.y < self.y + self.height as i32
    }

    pub fn cells(&self) -> impl Iterator<Item = GridCell> + '_ {
        (0..self.height as i32).flat_map(move |dy| {
            (0..self.width as i32).map(move |dx| GridCell::new(self.x + dx, self.y + dy))
        })
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Batch of cell→color writes as carried on the `pixelUpdates` key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelPatch(pub BTreeMap<GridCell, Color>);

impl PixelPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cell: GridCell, color: Color) {
        self.0.insert(cell, color);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GridCell, &Color)> {
        self.0.iter()
    }

    pub fn to_value(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .0
            .iter()
            .map(|(cell, color)| (cell.key(), serde_json::Value::String(color.to_string())))
            .collect();
        serde_json::Value::Object(map)
    }

    /// Strict decode: any malformed key or color fails the whole patch.
    pub fn try_from_value(value: &serde_json::Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| AppError::InvalidInput("pixel patch must be an object".to_string()))?;
        let mut patch = PixelPatch::new();
        for (key, raw) in map {
            let cell = GridCell::from_key(key)
                .ok_or_else(|| AppError::InvalidInput(format!("bad cell key {}", key)))?;
            let color = raw
                .as_str()
                .ok_or_else(|| AppError::InvalidInput(format!("color of {} is not a string", key)))
                .and_then(Color::parse)?;
            patch.insert(cell, color);
        }
        Ok(patch)
    }

    /// Lenient decode: malformed keys or colors from peers are skipped.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let mut patch = PixelPatch::new();
        let Some(map) = value.as_object() else {
            tracing::warn!("Ignoring non-object pixel patch");
            return patch;
        };
        for (key, raw) in map {
            let cell = GridCell::from_key(key);
            let color = raw.as_str().and_then(|s| Color::parse(s).ok());
            match (cell, color) {
                (Some(cell), Some(color)) => patch.insert(cell, color),
                _ => tracing::warn!("Skipping malformed pixel entry {}={}", key, raw),
            }
        }
        patch
    }
}

impl FromIterator<(GridCell, Color)> for PixelPatch {
    fn from_iter<I: IntoIterator<Item = (GridCell, Color)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_key_round_trips() {
        let cell = GridCell::new(12, 499);
        assert_eq!(cell.key(), "12,499");
        assert_eq!(GridCell::from_key("12,499"), Some(cell));
    }

    #[test]
    fn from_key_rejects_out_of_bounds() {
        assert_eq!(GridCell::from_key("500,1"), None);
        assert_eq!(GridCell::from_key("-1,1"), None);
        assert_eq!(GridCell::from_key("garbage"), None);
    }

    #[test]
    fn color_parse_normalizes_case() {
        assert_eq!(Color::parse("#ffd635").unwrap().as_str(), "#FFD635");
        assert!(Color::parse("ffd635").is_err());
        assert!(Color::parse("#12345").is_err());
    }

    #[test]
    fn short_hex_expands_to_rgba() {
        assert_eq!(Color::background().to_rgba(), [0x11, 0x11, 0x11, 255]);
        assert!(Color::parse("#111111").unwrap().is_background());
    }

    #[test]
    fn rect_normalize_is_order_independent() {
        let a = GridCell::new(10, 4);
        let b = GridCell::new(7, 9);
        let rect = CellRect::normalize(a, b);
        assert_eq!(rect, CellRect::normalize(b, a));
        assert_eq!((rect.x, rect.y, rect.width, rect.height), (7, 4, 4, 6));
        assert_eq!(rect.cells().count() as u64, rect.area());
    }

    #[test]
    fn single_cell_rect_has_unit_size() {
        let c = GridCell::new(3, 3);
        let rect = CellRect::normalize(c, c);
        assert_eq!((rect.width, rect.height), (1, 1));
        assert!(rect.contains(c));
    }

    #[test]
    fn patch_from_value_skips_bad_entries() {
        let value = serde_json::json!({
            "1,2": "#FF0000",
            "bad": "#00FF00",
            "3,4": "red",
        });
        let patch = PixelPatch::from_value(&value);
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.to_value(), serde_json::json!({ "1,2": "#FF0000" }));
    }
}
