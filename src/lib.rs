//! handler-delegate - extension-point registries for feature handlers.
//!
//! Feature modules register handlers with a [`Delegate`]; the delegate
//! tracks which handlers are enabled for the current [`Site`] and dispatches
//! to the best one. [`TtlCache`] and [`ResultMemoiser`] cover short-lived
//! caching of fetched values and repeated computations.

pub mod cache;
pub mod clock;
pub mod config;
pub mod delegate;
pub mod error;
pub mod memoiser;
pub mod points;
pub mod site;
pub mod telemetry;

pub use cache::{CACHE_TTL, CacheValue, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use delegate::{Delegate, DelegateHandler, Enablement, SiteEvent, spawn_refresh_task};
pub use error::{ConfigError, EnabledResult, HandlerError};
pub use memoiser::{MemoParam, ResultMemoiser};
pub use site::Site;
