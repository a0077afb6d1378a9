//! Mapper statistics with atomic counters.
//!
//! This module provides [`MapperStats`] for tracking plan compilation and
//! execution and [`StatsSnapshot`] for point-in-time views.
//!
//! # Thread Safety
//!
//! All counters use [`AtomicU64`] with [`Relaxed`](std::sync::atomic::Ordering::Relaxed)
//! ordering. Statistics are informational and need no ordering guarantees.
//!
//! # Examples
//!
//! ```
//! use om_engine::MapperStats;
//!
//! let stats = MapperStats::new();
//! stats.increment_cache_misses();
//! stats.increment_plans_compiled();
//!
//! let snapshot = stats.snapshot();
//! assert_eq!(snapshot.plans_compiled, 1);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Atomic counters for mapper statistics.
#[derive(Debug, Default)]
pub struct MapperStats {
    /// Top-level mapping calls.
    invocations: AtomicU64,
    /// Plans added to the cache.
    plans_compiled: AtomicU64,
    /// Plan lookups served from the cache.
    cache_hits: AtomicU64,
    /// Plan lookups that required compilation.
    cache_misses: AtomicU64,
    /// Target objects and collections allocated.
    objects_created: AtomicU64,
    /// Reference assignments satisfied by the tracker.
    tracker_reuses: AtomicU64,
}

impl MapperStats {
    /// Creates a new [`MapperStats`] with all counters at zero.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the invocation counter.
    #[inline]
    pub fn increment_invocations(&self) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the compiled plan counter.
    #[inline]
    pub fn increment_plans_compiled(&self) {
        self.plans_compiled.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the cache hit counter.
    #[inline]
    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the cache miss counter.
    #[inline]
    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the created object counter.
    #[inline]
    pub fn increment_objects_created(&self) {
        self.objects_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the tracker reuse counter.
    #[inline]
    pub fn increment_tracker_reuses(&self) {
        self.tracker_reuses.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of all statistics.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            invocations: self.invocations.load(Ordering::Relaxed),
            plans_compiled: self.plans_compiled.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            objects_created: self.objects_created.load(Ordering::Relaxed),
            tracker_reuses: self.tracker_reuses.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.invocations.store(0, Ordering::Relaxed);
        self.plans_compiled.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.objects_created.store(0, Ordering::Relaxed);
        self.tracker_reuses.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of mapper statistics.
///
/// # Examples
///
/// ```
/// use om_engine::StatsSnapshot;
///
/// let snap = StatsSnapshot {
///     cache_hits: 3,
///     cache_misses: 1,
///     ..StatsSnapshot::default()
/// };
/// assert!((snap.hit_rate() - 75.0).abs() < 0.1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Top-level mapping calls.
    pub invocations: u64,
    /// Plans added to the cache.
    pub plans_compiled: u64,
    /// Plan lookups served from the cache.
    pub cache_hits: u64,
    /// Plan lookups that required compilation.
    pub cache_misses: u64,
    /// Target objects and collections allocated.
    pub objects_created: u64,
    /// Reference assignments satisfied by the tracker.
    pub tracker_reuses: u64,
}

impl StatsSnapshot {
    /// Returns the plan cache hit rate as a percentage.
    ///
    /// Returns 100.0 when no lookup happened yet.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Acceptable for statistics display
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            return 100.0;
        }
        (self.cache_hits as f64 / lookups as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_increment() {
        let stats = MapperStats::new();
        stats.increment_invocations();
        stats.increment_cache_hits();
        stats.increment_cache_hits();
        stats.increment_objects_created();

        let snap = stats.snapshot();
        assert_eq!(snap.invocations, 1);
        assert_eq!(snap.cache_hits, 2);
        assert_eq!(snap.objects_created, 1);
        assert_eq!(snap.tracker_reuses, 0);
    }

    #[test]
    fn test_stats_reset() {
        let stats = MapperStats::new();
        stats.increment_plans_compiled();
        stats.increment_tracker_reuses();
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_hit_rate_empty() {
        assert!((StatsSnapshot::default().hit_rate() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snap = StatsSnapshot {
            invocations: 2,
            plans_compiled: 5,
            ..StatsSnapshot::default()
        };
        let json = serde_json::to_string(&snap).unwrap();
        let parsed: StatsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, parsed);
    }
}
