//! Roost Common Library
//!
//! Shared code for the Roost back office including:
//! - Database models and repository patterns
//! - The occupancy engine (lease lifecycle, unit/bedroom status sync)
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod occupancy;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};
pub use occupancy::OccupancyService;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default invoice number prefix
pub const DEFAULT_INVOICE_PREFIX: &str = "INV-LEASE-";

/// Default zero-padded width of the invoice sequence number
pub const DEFAULT_INVOICE_SEQ_WIDTH: usize = 5;
