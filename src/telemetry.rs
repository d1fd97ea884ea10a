//! Logging setup and refresh timing.

use crate::config::LoggingConfig;
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured filter. Returns `false` if a
/// subscriber was already installed (the existing one is kept).
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    }
}

/// Guard timing one enablement refresh of a delegate.
///
/// Logs the elapsed time when dropped, and whether the refresh results were
/// applied or discarded as stale.
pub struct RefreshTimer<'a> {
    delegate: &'a str,
    start: Instant,
    discarded: bool,
}

impl<'a> RefreshTimer<'a> {
    /// Start timing a refresh.
    pub fn new(delegate: &'a str) -> Self {
        Self {
            delegate,
            start: Instant::now(),
            discarded: false,
        }
    }

    /// Mark the refresh as superseded; its results were not applied.
    pub fn discard(&mut self) {
        self.discarded = true;
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded
    }
}

impl Drop for RefreshTimer<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        if self.discarded {
            debug!(delegate = %self.delegate, elapsed_ms, "Discarding stale handler refresh");
        } else {
            debug!(delegate = %self.delegate, elapsed_ms, "Handler refresh finished");
        }
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span};

    /// Span around a delegate-wide refresh.
    pub fn refresh(delegate: &str, handlers: usize) -> Span {
        debug_span!("delegate.refresh", delegate = %delegate, handlers)
    }

    /// Span around one handler's enablement check.
    pub fn enablement(delegate: &str, handler: &str) -> Span {
        debug_span!("delegate.enablement", delegate = %delegate, handler = %handler)
    }
}
