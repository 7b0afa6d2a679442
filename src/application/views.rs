//! View counting with per-viewer deduplication.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::cache::lock::mutex_lock;

const SOURCE: &str = "application::views";

pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(3 * 60 * 60);
const DEFAULT_CAPACITY: usize = 100_000;

/// Request-derived inputs for resolving who is viewing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerHints {
    pub user_id: Option<Uuid>,
    pub client_viewer_id: Option<String>,
    /// Raw `X-Forwarded-For` value; only the first hop is used.
    pub forwarded_for: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ViewerIdentity {
    User(Uuid),
    Client(String),
    Fingerprint(String),
}

impl ViewerIdentity {
    /// Authenticated user wins, then a non-empty client id, then a salted
    /// hash of the first forwarded address and the user agent.
    pub fn resolve(hints: &ViewerHints, salt: &str) -> Self {
        if let Some(user_id) = hints.user_id {
            return Self::User(user_id);
        }

        if let Some(client) = hints
            .client_viewer_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            return Self::Client(client.to_string());
        }

        let address = hints
            .forwarded_for
            .as_deref()
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .unwrap_or_default();
        let agent = hints.user_agent.as_deref().unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(salt.as_bytes());
        hasher.update(b"|");
        hasher.update(address.as_bytes());
        hasher.update(b"|");
        hasher.update(agent.as_bytes());
        Self::Fingerprint(hex::encode(hasher.finalize()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewConfig {
    pub window: Duration,
    pub capacity: usize,
    pub fingerprint_salt: String,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_DEDUP_WINDOW,
            capacity: DEFAULT_CAPACITY,
            fingerprint_salt: String::new(),
        }
    }
}

impl From<&crate::config::ViewSettings> for ViewConfig {
    fn from(settings: &crate::config::ViewSettings) -> Self {
        Self {
            window: settings.dedup_window,
            capacity: settings.capacity.get(),
            fingerprint_salt: settings.fingerprint_salt.clone(),
        }
    }
}

/// Remembers when each viewer last counted a view of each content item.
///
/// State lives in this process only. A restart forgets every entry, so a
/// viewer may be counted again early; the LRU bound can do the same for
/// the least recently seen pairs under pressure.
pub struct ViewDedupGuard {
    window: time::Duration,
    seen: Mutex<LruCache<(Uuid, ViewerIdentity), OffsetDateTime>>,
}

impl ViewDedupGuard {
    pub fn new(config: &ViewConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            window: time::Duration::try_from(config.window).unwrap_or(time::Duration::MAX),
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn window(&self) -> time::Duration {
        self.window
    }

    /// Returns `true` and records `now` unless this viewer was counted for
    /// `content_id` less than one window ago.
    pub fn should_count_view(
        &self,
        content_id: Uuid,
        identity: &ViewerIdentity,
        now: OffsetDateTime,
    ) -> bool {
        let key = (content_id, identity.clone());
        let mut seen = mutex_lock(&self.seen, SOURCE, "should_count_view");

        if let Some(last) = seen.get(&key)
            && now - *last < self.window
        {
            counter!("inkpost_view_suppressed_total").increment(1);
            debug!(content_id = %content_id, "View suppressed inside dedup window");
            return false;
        }

        seen.put(key, now);
        true
    }

    /// Drops entries whose window has closed; returns how many were removed.
    pub fn sweep_expired(&self, now: OffsetDateTime) -> usize {
        let mut seen = mutex_lock(&self.seen, SOURCE, "sweep_expired");
        let stale: Vec<_> = seen
            .iter()
            .filter(|(_, last)| now - **last >= self.window)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            seen.pop(key);
        }
        stale.len()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.seen, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn guard() -> ViewDedupGuard {
        ViewDedupGuard::new(&ViewConfig::default())
    }

    fn viewer() -> ViewerIdentity {
        ViewerIdentity::User(Uuid::new_v4())
    }

    #[test]
    fn second_view_inside_window_is_suppressed() {
        let guard = guard();
        let content = Uuid::new_v4();
        let viewer = viewer();
        let t0 = datetime!(2026-01-01 00:00 UTC);

        assert!(guard.should_count_view(content, &viewer, t0));
        assert!(!guard.should_count_view(content, &viewer, t0 + time::Duration::hours(2)));
    }

    #[test]
    fn window_boundary_counts_again() {
        let guard = guard();
        let content = Uuid::new_v4();
        let viewer = viewer();
        let t0 = datetime!(2026-01-01 00:00 UTC);

        assert!(guard.should_count_view(content, &viewer, t0));
        let just_before = t0 + time::Duration::hours(3) - time::Duration::seconds(1);
        assert!(!guard.should_count_view(content, &viewer, just_before));
        assert!(guard.should_count_view(content, &viewer, t0 + time::Duration::hours(3)));
    }

    #[test]
    fn suppressed_view_does_not_extend_window() {
        let guard = guard();
        let content = Uuid::new_v4();
        let viewer = viewer();
        let t0 = datetime!(2026-01-01 00:00 UTC);

        assert!(guard.should_count_view(content, &viewer, t0));
        assert!(!guard.should_count_view(content, &viewer, t0 + time::Duration::hours(2)));
        assert!(guard.should_count_view(content, &viewer, t0 + time::Duration::hours(3)));
    }

    #[test]
    fn distinct_content_and_viewers_are_independent() {
        let guard = guard();
        let t0 = datetime!(2026-01-01 00:00 UTC);
        let viewer = viewer();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(guard.should_count_view(first, &viewer, t0));
        assert!(guard.should_count_view(second, &viewer, t0));
        assert!(guard.should_count_view(first, &ViewerIdentity::Client("c-1".into()), t0));
    }

    #[test]
    fn sweep_removes_closed_windows() {
        let guard = guard();
        let t0 = datetime!(2026-01-01 00:00 UTC);
        guard.should_count_view(Uuid::new_v4(), &viewer(), t0);
        guard.should_count_view(Uuid::new_v4(), &viewer(), t0 + time::Duration::hours(2));

        assert_eq!(guard.sweep_expired(t0 + time::Duration::hours(4)), 1);
        assert_eq!(guard.len(), 1);
    }

    #[test]
    fn capacity_bounds_memory() {
        let guard = ViewDedupGuard::new(&ViewConfig {
            capacity: 2,
            ..Default::default()
        });
        let t0 = datetime!(2026-01-01 00:00 UTC);
        for _ in 0..5 {
            guard.should_count_view(Uuid::new_v4(), &viewer(), t0);
        }
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn identity_prefers_user_then_client() {
        let user = Uuid::new_v4();
        let hints = ViewerHints {
            user_id: Some(user),
            client_viewer_id: Some("client".into()),
            forwarded_for: Some("10.0.0.1".into()),
            user_agent: Some("ua".into()),
        };
        assert_eq!(ViewerIdentity::resolve(&hints, "s"), ViewerIdentity::User(user));

        let hints = ViewerHints {
            user_id: None,
            ..hints
        };
        assert_eq!(
            ViewerIdentity::resolve(&hints, "s"),
            ViewerIdentity::Client("client".into())
        );
    }

    #[test]
    fn blank_client_id_falls_back_to_fingerprint() {
        let hints = ViewerHints {
            client_viewer_id: Some("   ".into()),
            forwarded_for: Some("203.0.113.7, 10.0.0.1".into()),
            user_agent: Some("Mozilla/5.0".into()),
            ..Default::default()
        };
        let ViewerIdentity::Fingerprint(hash) = ViewerIdentity::resolve(&hints, "salt") else {
            panic!("expected fingerprint");
        };
        assert_eq!(hash.len(), 64);

        let first_hop_only = ViewerHints {
            forwarded_for: Some("203.0.113.7".into()),
            ..hints.clone()
        };
        assert_eq!(
            ViewerIdentity::resolve(&first_hop_only, "salt"),
            ViewerIdentity::Fingerprint(hash.clone())
        );
        assert_ne!(
            ViewerIdentity::resolve(&hints, "other-salt"),
            ViewerIdentity::Fingerprint(hash)
        );
    }

    #[test]
    fn missing_hints_still_resolve() {
        let identity = ViewerIdentity::resolve(&ViewerHints::default(), "");
        assert!(matches!(identity, ViewerIdentity::Fingerprint(_)));
        assert_eq!(identity, ViewerIdentity::resolve(&ViewerHints::default(), ""));
    }
}
