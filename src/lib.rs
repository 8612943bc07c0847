pub mod api;
pub mod canvas;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod indexer;
pub mod models;
pub mod services;
pub mod utils;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::CanvasController;
pub use error::{AppError, Result};
