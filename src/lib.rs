//! Rentyard equipment rental server
//!
//! Tracks rental contracts through their lifecycle, keeps the equipment and
//! employee assignment ledgers in step with them, and derives each
//! equipment's status from those ledgers plus pending maintenance. A
//! scheduled monitor detects and corrects stored statuses that drifted.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
