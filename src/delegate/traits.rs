//! The contract shared by every extension point's handlers.
//!
//! Each extension point defines its own trait extending [`DelegateHandler`]
//! with the operations it needs, and keeps a `Delegate<dyn ThatTrait>`.
//!
//! ## Example
//!
//! ```
//! use async_trait::async_trait;
//! use handler_delegate::{Delegate, DelegateHandler};
//! use std::sync::Arc;
//!
//! trait BlockHandler: DelegateHandler {
//!     fn title(&self) -> String;
//! }
//!
//! struct Calendar;
//!
//! #[async_trait]
//! impl DelegateHandler for Calendar {
//!     fn name(&self) -> &str {
//!         "block_calendar"
//!     }
//! }
//!
//! impl BlockHandler for Calendar {
//!     fn title(&self) -> String {
//!         "Calendar".into()
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let blocks: Delegate<dyn BlockHandler> = Delegate::new("BlockDelegate");
//! blocks.register_handler(Arc::new(Calendar));
//! blocks.update_handlers().await;
//! let title = blocks.execute_function_on_enabled("block_calendar", |h| h.title());
//! assert_eq!(title.as_deref(), Some("Calendar"));
//! # }
//! ```

use crate::error::EnabledResult;
use async_trait::async_trait;

/// A handler pluggable into a [`Delegate`](super::Delegate).
#[async_trait]
pub trait DelegateHandler: Send + Sync {
    /// Unique name within the delegate. Re-registering a name replaces
    /// the previous handler.
    fn name(&self) -> &str;

    /// Key callers dispatch by (a question type, a processor name...).
    ///
    /// Several handlers may share a key; the enabled one with the highest
    /// [`priority`](Self::priority) is used.
    fn key(&self) -> &str {
        self.name()
    }

    fn priority(&self) -> i32 {
        0
    }

    /// Whether the handler is usable right now.
    ///
    /// May do I/O. An error is treated as "disabled".
    async fn is_enabled(&self) -> EnabledResult {
        Ok(true)
    }
}

/// Memoised result of a handler's enablement check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Enablement {
    /// Not checked since registration or the last invalidation.
    #[default]
    Unknown,
    Enabled,
    Disabled,
}

impl Enablement {
    #[inline]
    pub fn is_enabled(self) -> bool {
        self == Self::Enabled
    }
}

impl From<bool> for Enablement {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }
}
