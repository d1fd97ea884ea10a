//! Site lifecycle events that drive enablement refreshes.

use super::registry::Delegate;
use super::traits::DelegateHandler;
use crate::site::Site;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Events after which handler enablement must be recomputed.
#[derive(Debug, Clone)]
pub enum SiteEvent {
    /// A user logged in to a site.
    Login(Arc<Site>),
    /// The current site's configuration changed.
    SiteUpdated(Arc<Site>),
    /// Remote plugins finished loading and may have registered handlers.
    PluginsLoaded,
    /// The user logged out; there is no current site.
    Logout,
}

/// Keep `delegate` in sync with site events.
///
/// Runs until the channel closes. A lagged receiver refreshes once to
/// catch up.
pub fn spawn_refresh_task<H>(
    delegate: Arc<Delegate<H>>,
    mut events: broadcast::Receiver<SiteEvent>,
) -> JoinHandle<()>
where
    H: DelegateHandler + ?Sized + 'static,
{
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SiteEvent::Login(site)) | Ok(SiteEvent::SiteUpdated(site)) => {
                    delegate.set_site(Some(site));
                    delegate.update_handlers().await;
                }
                Ok(SiteEvent::PluginsLoaded) => {
                    delegate.update_handlers().await;
                }
                Ok(SiteEvent::Logout) => {
                    delegate.set_site(None);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(delegate = %delegate.name(), skipped, "Site events lagged; refreshing");
                    delegate.update_handlers().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!(delegate = %delegate.name(), "Site event channel closed");
    })
}
