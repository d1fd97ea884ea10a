//! Handler registry and dispatch.
//!
//! The `Delegate` stores handlers by name (or by dispatch key, for points
//! that allow one handler per key), memoises each handler's enablement, and
//! resolves dispatch keys to the best enabled handler.

use super::traits::{DelegateHandler, Enablement};
use crate::error::HandlerError;
use crate::site::Site;
use crate::telemetry::{RefreshTimer, spans};
use futures_util::FutureExt;
use futures_util::future::join_all;
use parking_lot::RwLock;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{Instrument, debug, info, warn};

struct Entry<H: ?Sized> {
    handler: Arc<H>,
    /// Registration order, used to break priority ties.
    seq: u64,
    enablement: Enablement,
}

/// Registry of handlers for one extension point.
pub struct Delegate<H: DelegateHandler + ?Sized> {
    name: String,
    /// Prepended to handler names when checking site-disabled features.
    feature_prefix: Option<String>,
    /// Registering a handler replaces any handler with the same `key()`.
    unique_keys: bool,
    handlers: RwLock<HashMap<String, Entry<H>>>,
    /// Used by `execute_function_on_enabled` when no enabled handler matches.
    default_handler: Option<Arc<H>>,
    site: RwLock<Option<Arc<Site>>>,
    /// Bumped by every refresh and invalidation; results computed under an
    /// older generation are dropped.
    generation: AtomicU64,
    next_seq: AtomicU64,
    ready: watch::Sender<bool>,
}

impl<H: DelegateHandler + ?Sized> Delegate<H> {
    /// Create an empty delegate for the extension point `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            name: name.into(),
            feature_prefix: None,
            unique_keys: false,
            handlers: RwLock::new(HashMap::new()),
            default_handler: None,
            site: RwLock::new(None),
            generation: AtomicU64::new(0),
            next_seq: AtomicU64::new(0),
            ready,
        }
    }

    /// Check `prefix + handler name` against the site's disabled features.
    pub fn with_feature_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.feature_prefix = Some(prefix.into());
        self
    }

    /// Allow one handler per dispatch key: a registration replaces any
    /// handler whose `key()` matches, whatever its name.
    pub fn with_unique_keys(mut self) -> Self {
        self.unique_keys = true;
        self
    }

    /// Fallback handler for dispatch when no enabled handler matches.
    pub fn with_default_handler(mut self, handler: Arc<H>) -> Self {
        self.default_handler = Some(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a handler under its name.
    ///
    /// An existing handler with the same name is replaced and returned. With
    /// [`with_unique_keys`](Self::with_unique_keys), handlers sharing the new
    /// handler's key are replaced too. The new handler starts out
    /// [`Enablement::Unknown`].
    pub fn register_handler(&self, handler: Arc<H>) -> Option<Arc<H>> {
        let handler_name = handler.name().to_string();

        // Resolve keys before taking the write lock; handlers may call back
        // into the delegate from `key()`.
        let same_key: Vec<(String, Arc<H>)> = if self.unique_keys {
            let key = handler.key().to_string();
            self.snapshot()
                .into_iter()
                .filter(|(name, h, ..)| *name != handler_name && h.key() == key)
                .map(|(name, h, ..)| (name, h))
                .collect()
        } else {
            Vec::new()
        };

        let entry = Entry {
            handler,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            enablement: Enablement::Unknown,
        };

        let previous = {
            let mut handlers = self.handlers.write();
            let mut replaced: Vec<Entry<H>> = same_key
                .iter()
                .filter_map(|(name, h)| {
                    let matches = handlers
                        .get(name)
                        .is_some_and(|e| Arc::ptr_eq(&e.handler, h));
                    if matches { handlers.remove(name) } else { None }
                })
                .collect();
            replaced.extend(handlers.insert(handler_name.clone(), entry));
            replaced.into_iter().max_by_key(|e| e.seq)
        };

        match &previous {
            Some(old) => warn!(
                delegate = %self.name,
                handler = %handler_name,
                replaced = %old.handler.name(),
                "Handler re-registered; replacing previous registration"
            ),
            None => debug!(delegate = %self.name, handler = %handler_name, "Handler registered"),
        }

        previous.map(|e| e.handler)
    }

    /// Names of all registered handlers, in registration order.
    pub fn handler_names(&self) -> Vec<String> {
        let handlers = self.handlers.read();
        let mut names: Vec<_> = handlers.iter().map(|(n, e)| (e.seq, n.clone())).collect();
        names.sort_unstable_by_key(|(seq, _)| *seq);
        names.into_iter().map(|(_, n)| n).collect()
    }

    // ------------------------------------------------------------------
    // Site
    // ------------------------------------------------------------------

    /// Install the current site and forget all memoised enablement.
    pub fn set_site(&self, site: Option<Arc<Site>>) {
        debug!(
            delegate = %self.name,
            site = site.as_ref().map(|s| s.id.as_str()),
            "Site changed"
        );
        *self.site.write() = site;
        self.invalidate_enablement();
    }

    pub fn site(&self) -> Option<Arc<Site>> {
        self.site.read().clone()
    }

    // ------------------------------------------------------------------
    // Enablement
    // ------------------------------------------------------------------

    /// Re-check every handler's enablement.
    ///
    /// Checks run concurrently and are isolated from each other: an error or
    /// panic in one check disables that handler only. Never fails. If another
    /// refresh or an invalidation starts before this one settles, these
    /// results are discarded.
    pub async fn update_handlers(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let site = self.site();
        let snapshot: Vec<(String, Arc<H>)> = self
            .handlers
            .read()
            .iter()
            .map(|(name, e)| (name.clone(), Arc::clone(&e.handler)))
            .collect();

        let span = spans::refresh(&self.name, snapshot.len());
        let mut timer = RefreshTimer::new(&self.name);

        let checks = snapshot.into_iter().map(|(name, handler)| {
            let site = site.clone();
            async move {
                let state = self.check_enablement(&name, &*handler, site.as_deref()).await;
                (name, handler, state)
            }
        });
        let results = join_all(checks).instrument(span).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            timer.discard();
            return;
        }

        let enabled = {
            let mut handlers = self.handlers.write();
            for (name, handler, state) in results {
                // Skip handlers replaced while their check was running.
                if let Some(entry) = handlers.get_mut(&name)
                    && Arc::ptr_eq(&entry.handler, &handler)
                {
                    entry.enablement = state;
                }
            }
            handlers
                .values()
                .filter(|e| e.enablement.is_enabled())
                .count()
        };

        self.ready.send_replace(true);
        info!(delegate = %self.name, enabled, "Handlers updated");
    }

    /// Re-check a single handler. Returns its new state, or `None` if no
    /// handler is registered under `name`.
    pub async fn update_handler(&self, name: &str) -> Option<Enablement> {
        let generation = self.generation.load(Ordering::SeqCst);
        let handler = self.handlers.read().get(name).map(|e| Arc::clone(&e.handler))?;
        let site = self.site();

        let state = self.check_enablement(name, &*handler, site.as_deref()).await;

        if self.generation.load(Ordering::SeqCst) == generation
            && let Some(entry) = self.handlers.write().get_mut(name)
            && Arc::ptr_eq(&entry.handler, &handler)
        {
            entry.enablement = state;
        }
        Some(state)
    }

    /// Forget every memoised enablement and drop in-flight refresh results.
    pub fn invalidate_enablement(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for entry in self.handlers.write().values_mut() {
            entry.enablement = Enablement::Unknown;
        }
        self.ready.send_replace(false);
    }

    /// Memoised enablement of the handler named `name`.
    pub fn enablement(&self, name: &str) -> Option<Enablement> {
        self.handlers.read().get(name).map(|e| e.enablement)
    }

    /// Whether the handler named `name` is registered and known to be enabled.
    pub fn is_handler_enabled(&self, name: &str) -> bool {
        self.enablement(name).is_some_and(Enablement::is_enabled)
    }

    /// Like [`is_handler_enabled`](Self::is_handler_enabled), but resolves an
    /// unknown state by running the check now.
    pub async fn is_handler_enabled_lazy(&self, name: &str) -> bool {
        match self.enablement(name) {
            None => false,
            Some(Enablement::Unknown) => self
                .update_handler(name)
                .await
                .is_some_and(Enablement::is_enabled),
            Some(state) => state.is_enabled(),
        }
    }

    /// Resolves once a full refresh has completed since the last invalidation.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    async fn check_enablement(&self, name: &str, handler: &H, site: Option<&Site>) -> Enablement {
        if let (Some(prefix), Some(site)) = (&self.feature_prefix, site) {
            let feature = format!("{prefix}{name}");
            if site.is_feature_disabled(&feature) {
                debug!(delegate = %self.name, handler = %name, feature = %feature, "Handler disabled by site");
                return Enablement::Disabled;
            }
        }

        let outcome = AssertUnwindSafe(handler.is_enabled())
            .catch_unwind()
            .instrument(spans::enablement(&self.name, name))
            .await
            .unwrap_or(Err(HandlerError::Panicked));

        match outcome {
            Ok(enabled) => enabled.into(),
            Err(e) => {
                warn!(
                    delegate = %self.name,
                    handler = %name,
                    code = e.error_code(),
                    error = %e,
                    "Enablement check failed; treating handler as disabled"
                );
                Enablement::Disabled
            }
        }
    }

    // ------------------------------------------------------------------
    // Lookup and dispatch
    // ------------------------------------------------------------------

    /// Copy out every entry so handler methods run without the lock held.
    fn snapshot(&self) -> Vec<(String, Arc<H>, u64, Enablement)> {
        self.handlers
            .read()
            .iter()
            .map(|(name, e)| (name.clone(), Arc::clone(&e.handler), e.seq, e.enablement))
            .collect()
    }

    /// Best handler for `key`: highest priority first, then earliest
    /// registration.
    fn select(&self, key: &str, enabled_only: bool) -> Option<Arc<H>> {
        self.snapshot()
            .into_iter()
            .filter(|(_, h, ..)| h.key() == key)
            .filter(|(.., state)| !enabled_only || state.is_enabled())
            .max_by_key(|(_, h, seq, _)| (h.priority(), Reverse(*seq)))
            .map(|(_, h, ..)| h)
    }

    /// Whether any handler is registered for `key` (and enabled, if asked).
    pub fn has_handler(&self, key: &str, enabled_only: bool) -> bool {
        self.select(key, enabled_only).is_some()
    }

    /// The handler that dispatch for `key` would use, without the default
    /// fallback.
    pub fn get_handler(&self, key: &str, enabled_only: bool) -> Option<Arc<H>> {
        self.select(key, enabled_only)
    }

    /// All enabled handlers, highest priority first, ties in registration
    /// order.
    pub fn enabled_handlers(&self) -> Vec<Arc<H>> {
        let mut enabled: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|(.., state)| state.is_enabled())
            .map(|(_, h, seq, _)| (h.priority(), seq, h))
            .collect();
        enabled.sort_by_key(|(priority, seq, _)| (Reverse(*priority), *seq));
        enabled.into_iter().map(|(.., h)| h).collect()
    }

    /// Run `f` on the enabled handler for `key`.
    ///
    /// Falls back to the default handler if one is configured. `None` means
    /// no handler is available, which callers should treat as a normal
    /// outcome.
    pub fn execute_function_on_enabled<R, F>(&self, key: &str, f: F) -> Option<R>
    where
        F: FnOnce(&H) -> R,
    {
        let handler = self
            .select(key, true)
            .or_else(|| self.default_handler.clone());

        match handler {
            Some(handler) => Some(f(&*handler)),
            None => {
                debug!(delegate = %self.name, key = %key, "No enabled handler");
                None
            }
        }
    }

    /// Run `f` on any registered handler for `key`, enabled or not, falling
    /// back to the default handler.
    pub fn execute_function<R, F>(&self, key: &str, f: F) -> Option<R>
    where
        F: FnOnce(&H) -> R,
    {
        self.select(key, false)
            .or_else(|| self.default_handler.clone())
            .map(|handler| f(&*handler))
    }
}
