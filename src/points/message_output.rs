//! Message output processor handlers (popup, email, airnotifier...).
//!
//! Handlers are keyed by the processor name the server reports in a user's
//! notification preferences. Processors without a handler are not shown.

use crate::delegate::{Delegate, DelegateHandler};
use std::sync::Arc;

pub const MESSAGE_OUTPUT_DELEGATE: &str = "MessageOutputDelegate";

/// How a processor is presented in notification preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOutputDisplay {
    pub icon: String,
    pub label: String,
    pub priority: i32,
}

pub trait MessageOutputHandler: DelegateHandler {
    fn display_data(&self) -> MessageOutputDisplay;
}

/// Message output extension point.
pub struct MessageOutputDelegate {
    delegate: Arc<Delegate<dyn MessageOutputHandler>>,
}

impl MessageOutputDelegate {
    pub fn new() -> Self {
        let delegate = Delegate::<dyn MessageOutputHandler>::new(MESSAGE_OUTPUT_DELEGATE)
            .with_feature_prefix(format!("{MESSAGE_OUTPUT_DELEGATE}_"))
            .with_unique_keys();
        Self {
            delegate: Arc::new(delegate),
        }
    }

    pub fn delegate(&self) -> &Arc<Delegate<dyn MessageOutputHandler>> {
        &self.delegate
    }

    /// Display data for `processor`, or `None` if it has no enabled handler.
    pub fn display_data(&self, processor: &str) -> Option<MessageOutputDisplay> {
        self.delegate
            .execute_function_on_enabled(processor, |h| h.display_data())
    }

    /// Display data for every processor in `processors` that has an enabled
    /// handler, highest priority first.
    pub fn displayable<'a>(
        &self,
        processors: impl IntoIterator<Item = &'a str>,
    ) -> Vec<(String, MessageOutputDisplay)> {
        let mut shown: Vec<_> = processors
            .into_iter()
            .filter_map(|p| self.display_data(p).map(|d| (p.to_string(), d)))
            .collect();
        shown.sort_by_key(|(_, d)| std::cmp::Reverse(d.priority));
        shown
    }
}

impl Default for MessageOutputDelegate {
    fn default() -> Self {
        Self::new()
    }
}
