//! Unified error handling for handler-delegate.
//!
//! Absence (no handler, cache miss) is never an error in this crate and is
//! represented with `Option`. The types here cover the two places where
//! something can actually go wrong: a handler's own enablement check, and
//! loading configuration.

use thiserror::Error;

// ============================================================================
// Handler Errors (enablement checks)
// ============================================================================

/// Errors a handler may report from its enablement check.
///
/// The delegate never propagates these to its callers; a failing check
/// marks the handler as disabled and is logged.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("site not available")]
    NoSite,

    #[error("feature unavailable: {0}")]
    Unavailable(String),

    #[error("enablement check panicked")]
    Panicked,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Get a static error code string for log labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoSite => "no_site",
            Self::Unavailable(_) => "unavailable",
            Self::Panicked => "panicked",
            Self::Other(_) => "other",
        }
    }
}

/// Result type for handler enablement checks.
pub type EnabledResult = Result<bool, HandlerError>;

// ============================================================================
// Config Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", format_validation(.0))]
    Invalid(Vec<crate::config::ValidationError>),
}

fn format_validation(errors: &[crate::config::ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
