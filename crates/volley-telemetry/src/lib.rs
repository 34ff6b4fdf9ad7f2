//! Prometheus metrics and structured logging for volley.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise),
//!   optionally mirrored to a daily log file
//! - Prometheus counters and gauges for the burst engine

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, LogConfig};
pub use metrics::{gather_text, Metrics};
