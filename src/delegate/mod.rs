//! Extension-point handler delegates.
//!
//! A [`Delegate`] owns the handlers registered for one extension point,
//! remembers which of them are currently enabled, and dispatches calls to
//! the best enabled handler for a key.
//!
//! - [`traits`]: the [`DelegateHandler`] contract every handler implements
//! - [`registry`]: the [`Delegate`] registry and its dispatch
//! - [`events`]: site lifecycle events that trigger enablement refreshes

mod events;
mod registry;
mod traits;

pub use events::{SiteEvent, spawn_refresh_task};
pub use registry::Delegate;
pub use traits::{DelegateHandler, Enablement};
