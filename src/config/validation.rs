//! Configuration validation.
//!
//! Validates configuration at load time to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("site.id is required")]
    MissingSiteId,
    #[error("site.url must start with http:// or https://, got '{0}'")]
    InvalidSiteUrl(String),
    #[error("site.disabled_features contains a blank entry at index {0}")]
    BlankFeature(usize),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.site.id.trim().is_empty() {
        errors.push(ValidationError::MissingSiteId);
    }

    if let Some(ref url) = config.site.url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        errors.push(ValidationError::InvalidSiteUrl(url.clone()));
    }

    for (index, feature) in config.site.disabled_features.iter().enumerate() {
        if feature.trim().is_empty() {
            errors.push(ValidationError::BlankFeature(index));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
