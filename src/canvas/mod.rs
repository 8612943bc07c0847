pub mod effects;
pub mod overlay;
pub mod pixel_store;
pub mod preview;
pub mod rasterizer;
pub mod render;
pub mod selection;
pub mod viewport;

pub use effects::{EffectEvent, EffectKind, EffectQueue};
pub use hit_test::{HitTester, PointerHit, PointerInput, TouchPoint};
pub use overlay::ReferenceOverlay;
pub use pixel_store::PixelStore;
pub use preview::{NftMetadata, NftPreview};
pub use rasterizer::{cells_in_radius, AreaEffect};
pub use render::{build_display_list, DrawOp, FrameRenderer, Layer, RenderLoop, Scene};
pub use selection::{InputEffect, SelectionMachine, SelectionState, Weapon};
pub use viewport::{HitRounding, ViewportState, VisibleWindow, ZoomDirection};
