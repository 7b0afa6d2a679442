//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_TTL_SECS: u64 = 300;
const DEFAULT_TAG_TTL_SECS: u64 = 3600;
const DEFAULT_CAPACITY: usize = 10_000;

/// Tunables for `CacheIndex` and the in-memory backend.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Disable to turn every read into a miss and every write into a no-op.
    pub enabled: bool,
    /// TTL used when a call site does not pick one.
    pub default_ttl: Duration,
    /// Lifetime of a tag's member set, refreshed on each append.
    pub tag_ttl: Duration,
    /// Maximum number of values held by the in-memory backend.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            tag_ttl: Duration::from_secs(DEFAULT_TAG_TTL_SECS),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            default_ttl: settings.default_ttl,
            tag_ttl: settings.tag_ttl,
            capacity: settings.capacity.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// Tag sets must outlive the members they point at.
    pub fn tag_ttl_for(&self, entry_ttl: Duration) -> Duration {
        self.tag_ttl.max(entry_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.tag_ttl, Duration::from_secs(3600));
        assert_eq!(config.capacity, 10_000);
    }

    #[test]
    fn tag_ttl_never_shorter_than_entry() {
        let config = CacheConfig::default();
        assert_eq!(
            config.tag_ttl_for(Duration::from_secs(60)),
            Duration::from_secs(3600)
        );
        assert_eq!(
            config.tag_ttl_for(Duration::from_secs(7200)),
            Duration::from_secs(7200)
        );
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.capacity_non_zero().get(), 1);
    }
}
