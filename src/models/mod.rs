// src/models/mod.rs
pub mod canvas;

pub use canvas::{CellRect, Color, GridCell, PixelPatch, ScreenPoint};

use serde::Serialize;

/// `{ success: true, data }` envelope of the relay's JSON endpoints.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
