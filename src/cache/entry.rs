//! Cache Entry Types
//!
//! Expiration policies shared by both tiers and the per-entry bookkeeping
//! kept by the local tier.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::shard::Weighted;

/// A type-erased value held by the local tier
pub type LocalValue = Arc<dyn Any + Send + Sync>;

/// Expiration policy resolved for a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    /// Expires a fixed duration after the write
    Absolute(Duration),
    /// Expires after a duration without access; each access resets the clock
    Sliding(Duration),
    /// Never expires on its own
    Never,
}

impl Expiration {
    /// Get the expiration window, if any
    pub fn window(&self) -> Option<Duration> {
        match self {
            Expiration::Absolute(d) | Expiration::Sliding(d) => Some(*d),
            Expiration::Never => None,
        }
    }

    /// Check if this is a sliding expiration
    pub fn is_sliding(&self) -> bool {
        matches!(self, Expiration::Sliding(_))
    }
}

/// Instant `window` after `start`, or `None` when that is past the end of the
/// clock and the entry should be treated as never expiring
#[inline]
pub(crate) fn deadline(start: Instant, window: Duration) -> Option<Instant> {
    start.checked_add(window)
}

/// Caller-facing expiration options for a write
///
/// When both are given the absolute expiration wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryOptions {
    /// Expire this long after the write
    pub absolute_expiration_relative_to_now: Option<Duration>,
    /// Expire after this long without access
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Options with an absolute expiration
    pub fn absolute(ttl: Duration) -> Self {
        Self {
            absolute_expiration_relative_to_now: Some(ttl),
            sliding_expiration: None,
        }
    }

    /// Options with a sliding expiration
    pub fn sliding(window: Duration) -> Self {
        Self {
            absolute_expiration_relative_to_now: None,
            sliding_expiration: Some(window),
        }
    }

    /// Resolve into a single policy, falling back to `default` as absolute
    pub fn resolve(&self, default: Duration) -> Expiration {
        match (
            self.absolute_expiration_relative_to_now,
            self.sliding_expiration,
        ) {
            (Some(ttl), _) => Expiration::Absolute(ttl),
            (None, Some(window)) => Expiration::Sliding(window),
            (None, None) => Expiration::Absolute(default),
        }
    }
}

/// Local tier entry. Cloning shares the same underlying value and clock.
#[derive(Clone)]
pub struct LocalEntry {
    inner: Arc<LocalEntryInner>,
}

struct LocalEntryInner {
    value: LocalValue,
    size: u64,
    expiration: Expiration,
    created_at: Instant,
    /// Milliseconds since `created_at` of the last access
    last_access_ms: AtomicU64,
}

impl LocalEntry {
    /// Create a new entry stamped with the current time
    pub fn new(value: LocalValue, expiration: Expiration, size: u64) -> Self {
        Self::created_at(value, expiration, size, Instant::now())
    }

    fn created_at(value: LocalValue, expiration: Expiration, size: u64, now: Instant) -> Self {
        Self {
            inner: Arc::new(LocalEntryInner {
                value,
                size,
                expiration,
                created_at: now,
                last_access_ms: AtomicU64::new(0),
            }),
        }
    }

    /// Get the stored value
    #[inline]
    pub fn value(&self) -> LocalValue {
        Arc::clone(&self.inner.value)
    }

    /// Get the size hint recorded at write time
    #[inline]
    pub fn size(&self) -> u64 {
        self.inner.size
    }

    /// Get the expiration policy
    #[inline]
    pub fn expiration(&self) -> Expiration {
        self.inner.expiration
    }

    /// Instant of the last recorded access
    pub fn last_access(&self) -> Instant {
        let offset = self.inner.last_access_ms.load(Ordering::Relaxed);
        deadline(self.inner.created_at, Duration::from_millis(offset))
            .unwrap_or(self.inner.created_at)
    }

    /// Record an access, resetting a sliding expiration clock
    pub fn touch(&self, now: Instant) {
        let offset = now.saturating_duration_since(self.inner.created_at).as_millis() as u64;
        self.inner.last_access_ms.fetch_max(offset, Ordering::Relaxed);
    }

    /// Check whether the entry has expired at `now`
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.inner.expiration {
            Expiration::Absolute(ttl) => {
                deadline(self.inner.created_at, ttl).is_some_and(|at| now >= at)
            }
            Expiration::Sliding(window) => {
                deadline(self.last_access(), window).is_some_and(|at| now >= at)
            }
            Expiration::Never => false,
        }
    }

    /// Check whether the entry has expired now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

impl Weighted for LocalEntry {
    fn weight(&self) -> u64 {
        self.inner.size
    }
}

impl std::fmt::Debug for LocalEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEntry")
            .field("size", &self.inner.size)
            .field("expiration", &self.inner.expiration)
            .field("created_at", &self.inner.created_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(expiration: Expiration, now: Instant) -> LocalEntry {
        LocalEntry::created_at(Arc::new(42u32), expiration, 8, now)
    }

    #[test]
    fn test_absolute_wins_over_sliding() {
        let options = EntryOptions {
            absolute_expiration_relative_to_now: Some(Duration::from_secs(10)),
            sliding_expiration: Some(Duration::from_secs(5)),
        };
        assert_eq!(
            options.resolve(Duration::from_secs(60)),
            Expiration::Absolute(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_resolve_defaults() {
        assert_eq!(
            EntryOptions::default().resolve(Duration::from_secs(1800)),
            Expiration::Absolute(Duration::from_secs(1800))
        );
        assert_eq!(
            EntryOptions::sliding(Duration::from_secs(5)).resolve(Duration::from_secs(1800)),
            Expiration::Sliding(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_absolute_expiry() {
        let now = Instant::now();
        let e = entry(Expiration::Absolute(Duration::from_secs(1)), now);

        assert!(!e.is_expired_at(now));
        e.touch(now + Duration::from_millis(900));
        assert!(e.is_expired_at(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_sliding_expiry_resets_on_touch() {
        let now = Instant::now();
        let e = entry(Expiration::Sliding(Duration::from_secs(1)), now);

        e.touch(now + Duration::from_millis(800));
        assert!(!e.is_expired_at(now + Duration::from_millis(1500)));
        assert!(e.is_expired_at(now + Duration::from_millis(1800)));
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let now = Instant::now();
        let e = entry(Expiration::Never, now);

        e.touch(now + Duration::from_secs(5));
        e.touch(now + Duration::from_secs(2));
        assert_eq!(e.last_access(), now + Duration::from_secs(5));
        assert!(!e.is_expired_at(now + Duration::from_secs(3600)));
    }

    #[test]
    fn test_unrepresentable_deadline_never_expires() {
        let now = Instant::now();

        for expiration in [
            Expiration::Absolute(Duration::MAX),
            Expiration::Sliding(Duration::MAX),
        ] {
            let e = entry(expiration, now);
            e.touch(now + Duration::from_secs(1));
            assert!(!e.is_expired_at(now + Duration::from_secs(86_400)));
        }
        assert_eq!(deadline(now, Duration::MAX), None);
    }

    #[test]
    fn test_value_downcast() {
        let e = entry(Expiration::Never, Instant::now());
        let value = e.value();
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));
        assert!(value.downcast_ref::<String>().is_none());
        assert_eq!(e.weight(), 8);
    }
}
