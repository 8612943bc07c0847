// src/api/mod.rs
pub mod health;
pub mod sessions;

use crate::{config::Config, services::realtime::SessionHub};

#[derive(Clone)]
pub struct AppState {
    pub hub: SessionHub,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            hub: SessionHub::new(),
            config,
        }
    }
}
