//! User profile handlers: entries shown on a user's profile page.
//!
//! On top of the delegate-wide enablement, each handler may restrict itself
//! per user and context. Handlers that opt in have that per-user result
//! kept in a [`TtlCache`] keyed by `(user, context)`.

use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::delegate::{Delegate, DelegateHandler};
use crate::error::{EnabledResult, HandlerError};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::join_all;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::debug;

pub const USER_PROFILE_DELEGATE: &str = "UserProfileDelegate";

/// Where the profile is being viewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileContext {
    Site,
    Course(i64),
}

#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub id: i64,
    pub fullname: String,
}

/// How an entry is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileHandlerType {
    #[default]
    ListItem,
    /// A list item related to the user's account.
    AccountListItem,
    Button,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProfileHandlerData {
    pub title: String,
    pub icon: Option<String>,
    pub class: Option<String>,
}

/// An enabled entry ready to display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    pub name: String,
    pub priority: i32,
    pub kind: ProfileHandlerType,
    pub data: ProfileHandlerData,
}

#[async_trait]
pub trait UserProfileHandler: DelegateHandler {
    fn kind(&self) -> ProfileHandlerType {
        ProfileHandlerType::ListItem
    }

    /// Whether per-user results may be cached.
    fn cache_enabled(&self) -> bool {
        false
    }

    /// Whether the entry applies to `user` in `context`.
    async fn is_enabled_for_user(&self, _user: &UserProfile, _context: ProfileContext) -> EnabledResult {
        Ok(true)
    }

    fn display_data(&self, user: &UserProfile, context: ProfileContext) -> ProfileHandlerData;
}

/// User profile extension point.
pub struct UserProfileDelegate {
    delegate: Arc<Delegate<dyn UserProfileHandler>>,
    enabled_for_user: TtlCache<(i64, ProfileContext), bool>,
}

impl UserProfileDelegate {
    pub fn new() -> Self {
        Self::with_cache(TtlCache::new())
    }

    /// Use a cache driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_cache(TtlCache::with_clock(clock))
    }

    fn with_cache(enabled_for_user: TtlCache<(i64, ProfileContext), bool>) -> Self {
        let delegate = Delegate::<dyn UserProfileHandler>::new(USER_PROFILE_DELEGATE)
            .with_feature_prefix(format!("{USER_PROFILE_DELEGATE}_"));
        Self {
            delegate: Arc::new(delegate),
            enabled_for_user,
        }
    }

    pub fn delegate(&self) -> &Arc<Delegate<dyn UserProfileHandler>> {
        &self.delegate
    }

    /// Entries to show for `user` in `context`, highest priority first.
    ///
    /// A handler whose per-user check fails or panics is left out.
    pub async fn profile_handlers_for(
        &self,
        user: &UserProfile,
        context: ProfileContext,
    ) -> Vec<ProfileEntry> {
        let checks = self.delegate.enabled_handlers().into_iter().map(|handler| async move {
            let enabled = self.check_for_user(&*handler, user, context).await;
            (handler, enabled)
        });

        // Handlers arrive sorted by priority and join_all keeps that order.
        join_all(checks)
            .await
            .into_iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(handler, _)| ProfileEntry {
                name: handler.name().to_string(),
                priority: handler.priority(),
                kind: handler.kind(),
                data: handler.display_data(user, context),
            })
            .collect()
    }

    /// Forget cached per-user results, for one user or for everyone.
    pub fn clear_user_cache(&self, user_id: Option<i64>) {
        match user_id {
            None => self.enabled_for_user.clear(),
            Some(id) => self.enabled_for_user.invalidate_matching(|(user, _)| *user == id),
        }
        debug!(user = user_id, "Cleared per-user profile handler cache");
    }

    /// Forget cached per-user results for one user in one context.
    pub fn invalidate_user_context(&self, user_id: i64, context: ProfileContext) {
        self.enabled_for_user.invalidate(&(user_id, context));
    }

    async fn check_for_user(
        &self,
        handler: &dyn UserProfileHandler,
        user: &UserProfile,
        context: ProfileContext,
    ) -> bool {
        let cache_key = (user.id, context);
        let cacheable = handler.cache_enabled();

        if cacheable
            && let Some(enabled) = self
                .enabled_for_user
                .get_value(&cache_key, handler.name(), false)
        {
            return enabled;
        }

        let outcome = AssertUnwindSafe(handler.is_enabled_for_user(user, context))
            .catch_unwind()
            .await
            .unwrap_or(Err(HandlerError::Panicked));

        match outcome {
            Ok(enabled) => {
                if cacheable {
                    self.enabled_for_user
                        .set_value(cache_key, handler.name(), enabled);
                }
                enabled
            }
            Err(e) => {
                debug!(handler = %handler.name(), user = user.id, error = %e, "Not enabled for user");
                false
            }
        }
    }
}

impl Default for UserProfileDelegate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CACHE_TTL;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Entry {
        name: &'static str,
        priority: i32,
        kind: ProfileHandlerType,
        cache: bool,
        only_user: Option<i64>,
        fail: bool,
        checks: AtomicUsize,
    }

    impl Entry {
        fn new(name: &'static str, priority: i32) -> Self {
            Self {
                name,
                priority,
                kind: ProfileHandlerType::ListItem,
                cache: false,
                only_user: None,
                fail: false,
                checks: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DelegateHandler for Entry {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    #[async_trait]
    impl UserProfileHandler for Entry {
        fn kind(&self) -> ProfileHandlerType {
            self.kind
        }

        fn cache_enabled(&self) -> bool {
            self.cache
        }

        async fn is_enabled_for_user(&self, user: &UserProfile, _context: ProfileContext) -> EnabledResult {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HandlerError::Unavailable("course options".into()));
            }
            Ok(self.only_user.is_none_or(|id| id == user.id))
        }

        fn display_data(&self, user: &UserProfile, _context: ProfileContext) -> ProfileHandlerData {
            ProfileHandlerData {
                title: format!("{} for {}", self.name, user.fullname),
                ..ProfileHandlerData::default()
            }
        }
    }

    fn user(id: i64) -> UserProfile {
        UserProfile {
            id,
            fullname: format!("User {id}"),
        }
    }

    #[tokio::test]
    async fn test_entries_sorted_and_filtered() {
        let profile = UserProfileDelegate::new();
        profile.delegate().register_handler(Arc::new(Entry::new("badges", 100)));
        profile.delegate().register_handler(Arc::new(Entry {
            kind: ProfileHandlerType::Button,
            ..Entry::new("message", 700)
        }));
        profile.delegate().register_handler(Arc::new(Entry {
            only_user: Some(2),
            ..Entry::new("notes", 300)
        }));
        profile.delegate().register_handler(Arc::new(Entry {
            fail: true,
            ..Entry::new("grades", 500)
        }));
        profile.delegate().update_handlers().await;

        let entries = profile.profile_handlers_for(&user(1), ProfileContext::Site).await;
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["message", "badges"]);
        assert_eq!(entries[0].kind, ProfileHandlerType::Button);
        assert_eq!(entries[1].data.title, "badges for User 1");

        let entries = profile.profile_handlers_for(&user(2), ProfileContext::Course(5)).await;
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["message", "notes", "badges"]);
    }

    #[tokio::test]
    async fn test_per_user_cache() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let profile = UserProfileDelegate::with_clock(clock.clone());
        let cached = Arc::new(Entry {
            cache: true,
            ..Entry::new("cached", 0)
        });
        let uncached = Arc::new(Entry::new("uncached", 0));
        profile.delegate().register_handler(cached.clone());
        profile.delegate().register_handler(uncached.clone());
        profile.delegate().update_handlers().await;

        for _ in 0..3 {
            profile.profile_handlers_for(&user(1), ProfileContext::Site).await;
        }
        assert_eq!(cached.checks.load(Ordering::SeqCst), 1);
        assert_eq!(uncached.checks.load(Ordering::SeqCst), 3);

        profile.clear_user_cache(Some(1));
        profile.profile_handlers_for(&user(1), ProfileContext::Site).await;
        assert_eq!(cached.checks.load(Ordering::SeqCst), 2);

        clock.advance(CACHE_TTL);
        profile.profile_handlers_for(&user(1), ProfileContext::Site).await;
        assert_eq!(cached.checks.load(Ordering::SeqCst), 3);

        profile.invalidate_user_context(1, ProfileContext::Site);
        profile.profile_handlers_for(&user(1), ProfileContext::Site).await;
        assert_eq!(cached.checks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_site_disabled_entry() {
        let profile = UserProfileDelegate::new();
        profile.delegate().register_handler(Arc::new(Entry::new("badges", 0)));
        profile.delegate().set_site(Some(Arc::new(
            crate::Site::new("s1").with_disabled_feature("UserProfileDelegate_badges"),
        )));
        profile.delegate().update_handlers().await;

        assert!(profile.profile_handlers_for(&user(1), ProfileContext::Site).await.is_empty());
    }
}
