//! Scheduled multi-account order burst runner.
//!
//! Wires the venue client, clock sync and batch orchestrator together:
//! - TOML configuration with CLI overrides
//! - Clock sync against the venue before anything is scheduled
//! - One burst per configured account around the target instant
//! - Open-order cleanup before and after the burst

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, Overrides};
pub use error::{AppError, AppResult};
