//! The site a delegate evaluates its handlers against.

use crate::config::SiteConfig;
use std::collections::HashSet;

/// A configured site and the features its administrator disabled.
#[derive(Debug, Clone, Default)]
pub struct Site {
    pub id: String,
    pub url: Option<String>,
    disabled_features: HashSet<String>,
}

impl Site {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Builder-style helper to disable a feature.
    pub fn with_disabled_feature(mut self, feature: impl Into<String>) -> Self {
        self.disabled_features.insert(feature.into());
        self
    }

    /// Whether `feature` was disabled for this site.
    pub fn is_feature_disabled(&self, feature: &str) -> bool {
        self.disabled_features.contains(feature)
    }
}

impl From<&SiteConfig> for Site {
    fn from(config: &SiteConfig) -> Self {
        Self {
            id: config.id.clone(),
            url: config.url.clone(),
            disabled_features: config
                .disabled_features
                .iter()
                .map(|f| f.trim().to_string())
                .collect(),
        }
    }
}
