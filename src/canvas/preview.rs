//! NFT preview image and metadata document for a confirmed area.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use super::pixel_store::PixelStore;
use crate::{
    constants::{NFT_NAME, NFT_PIXEL_SIZE},
    error::{AppError, Result},
    models::CellRect,
};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NftPreview {
    pub rect: CellRect,
    pub png: Vec<u8>,
}

impl NftPreview {
    /// Crop `rect` out of the store at `NFT_PIXEL_SIZE` pixels per cell.
    pub fn render(store: &PixelStore, rect: &CellRect) -> Result<Self> {
        if rect.width == 0 || rect.height == 0 {
            return Err(AppError::InvalidInput("NFT area must be at least 1x1".to_string()));
        }
        let width = rect.width * NFT_PIXEL_SIZE;
        let height = rect.height * NFT_PIXEL_SIZE;
        let mut image = RgbaImage::from_pixel(width, height, Rgba(store.background().to_rgba()));

        for (index, color) in store.crop(rect).iter().enumerate() {
            if color.is_background() {
                continue;
            }
            let col = index as u32 % rect.width;
            let row = index as u32 / rect.width;
            let rgba = Rgba(color.to_rgba());
            for py in row * NFT_PIXEL_SIZE..(row + 1) * NFT_PIXEL_SIZE {
                for px in col * NFT_PIXEL_SIZE..(col + 1) * NFT_PIXEL_SIZE {
                    image.put_pixel(px, py, rgba);
                }
            }
        }

        let mut png = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| AppError::Internal(format!("Failed to encode NFT preview: {e}")))?;
        tracing::debug!("Rendered NFT preview {}x{} ({} bytes)", width, height, png.len());
        Ok(Self { rect: *rect, png })
    }

    pub fn data_url(&self) -> String {
        format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(&self.png))
    }
}

/// Bytes of a base64 PNG data URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .ok_or_else(|| AppError::InvalidInput("expected a base64 PNG data URL".to_string()))?;
    STANDARD
        .decode(payload)
        .map_err(|e| AppError::InvalidInput(format!("invalid base64 payload: {e}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftMetadata {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub attributes: Vec<NftAttribute>,
}

impl NftMetadata {
    pub fn for_area(rect: &CellRect) -> Self {
        let attribute = |name: &str, value: i64| NftAttribute {
            trait_type: name.to_string(),
            value: value.into(),
        };
        Self {
            name: NFT_NAME.to_string(),
            description: format!(
                "Pixel art created on canvas at coordinates ({}, {})",
                rect.x, rect.y
            ),
            image: None,
            attributes: vec![
                attribute("Width", rect.width as i64),
                attribute("Height", rect.height as i64),
                attribute("X Position", rect.x as i64),
                attribute("Y Position", rect.y as i64),
            ],
        }
    }

    pub fn with_image(mut self, uri: impl Into<String>) -> Self {
        self.image = Some(uri.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Color, GridCell};

    #[test]
    fn preview_is_ten_pixels_per_cell() {
        let mut store = PixelStore::new();
        store.apply_local(GridCell::new(11, 20), Color::parse("#00FF00").unwrap());
        let rect = CellRect { x: 10, y: 20, width: 3, height: 2 };
        let preview = NftPreview::render(&store, &rect).unwrap();

        let decoded = image::load_from_memory(&preview.png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (30, 20));
        assert_eq!(decoded.get_pixel(15, 5).0, [0, 255, 0, 255]);
        assert_eq!(decoded.get_pixel(5, 5).0, [17, 17, 17, 255]);
        assert_eq!(decoded.get_pixel(15, 15).0, [17, 17, 17, 255]);
    }

    #[test]
    fn data_url_round_trips_bytes() {
        let store = PixelStore::new();
        let preview = NftPreview::render(&store, &CellRect { x: 0, y: 0, width: 1, height: 1 }).unwrap();
        let url = preview.data_url();
        assert!(url.starts_with("data:image/png;base64,"));
        assert_eq!(decode_data_url(&url).unwrap(), preview.png);
        assert!(decode_data_url("data:text/plain;base64,AAAA").is_err());
    }

    #[test]
    fn metadata_describes_area() {
        let meta = NftMetadata::for_area(&CellRect { x: 12, y: 34, width: 5, height: 6 })
            .with_image("ipfs://QmImage");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["name"], "Pixel Art");
        assert_eq!(
            json["description"],
            "Pixel art created on canvas at coordinates (12, 34)"
        );
        assert_eq!(json["image"], "ipfs://QmImage");
        assert_eq!(json["attributes"][0]["trait_type"], "Width");
        assert_eq!(json["attributes"][0]["value"], 5);
        assert_eq!(json["attributes"][3]["trait_type"], "Y Position");
        assert_eq!(json["attributes"][3]["value"], 34);
    }
}
