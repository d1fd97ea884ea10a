//! Configuration loading and management.
//!
//! - [`types`]: Config struct definitions (Config, SiteConfig, LoggingConfig)
//! - [`validation`]: Startup validation returning every problem found

mod types;
mod validation;

pub use types::{Config, LoggingConfig, SiteConfig};
pub use validation::{ValidationError, validate};
