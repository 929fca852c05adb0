use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// Counters for one resource cache.
/// All fields are atomic so a snapshot can be taken from any thread.
#[derive(Debug)]
pub struct Metrics {
  // --- Lookups ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) coalesced: CachePadded<AtomicU64>,

  // --- Loads ---
  pub(crate) loads_started: CachePadded<AtomicU64>,
  pub(crate) loads_completed: CachePadded<AtomicU64>,
  pub(crate) loads_failed: CachePadded<AtomicU64>,
  pub(crate) stale_completions: CachePadded<AtomicU64>,

  // --- Releases ---
  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,
  pub(crate) released: CachePadded<AtomicU64>,

  // --- Waiters ---
  pub(crate) waiters_notified: CachePadded<AtomicU64>,
  pub(crate) waiters_dropped: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      coalesced: CachePadded::new(AtomicU64::new(0)),
      loads_started: CachePadded::new(AtomicU64::new(0)),
      loads_completed: CachePadded::new(AtomicU64::new(0)),
      loads_failed: CachePadded::new(AtomicU64::new(0)),
      stale_completions: CachePadded::new(AtomicU64::new(0)),
      evicted_by_capacity: CachePadded::new(AtomicU64::new(0)),
      released: CachePadded::new(AtomicU64::new(0)),
      waiters_notified: CachePadded::new(AtomicU64::new(0)),
      waiters_dropped: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn bump(counter: &CachePadded<AtomicU64>) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn add(counter: &CachePadded<AtomicU64>, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      coalesced: self.coalesced.load(Ordering::Relaxed),
      loads_started: self.loads_started.load(Ordering::Relaxed),
      loads_completed: self.loads_completed.load(Ordering::Relaxed),
      loads_failed: self.loads_failed.load(Ordering::Relaxed),
      stale_completions: self.stale_completions.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      released: self.released.load(Ordering::Relaxed),
      waiters_notified: self.waiters_notified.load(Ordering::Relaxed),
      waiters_dropped: self.waiters_dropped.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of a cache's metrics.
#[derive(Clone, PartialEq)]
pub struct MetricsSnapshot {
  /// Requests answered from a `Ready` record.
  pub hits: u64,
  /// Requests that found no usable record.
  pub misses: u64,
  /// The cache hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Requests that joined a load already in flight.
  pub coalesced: u64,
  pub loads_started: u64,
  pub loads_completed: u64,
  pub loads_failed: u64,
  /// Completions that arrived for a record that was removed or replaced.
  pub stale_completions: u64,
  /// Ready records evicted to stay within capacity.
  pub evicted_by_capacity: u64,
  /// Native handles released by the cache, for any reason.
  pub released: u64,
  pub waiters_notified: u64,
  /// Waiters discarded at teardown or invalidation without a notification.
  pub waiters_dropped: u64,
  /// The number of seconds the cache has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("coalesced", &self.coalesced)
      .field("loads_started", &self.loads_started)
      .field("loads_completed", &self.loads_completed)
      .field("loads_failed", &self.loads_failed)
      .field("stale_completions", &self.stale_completions)
      .field("evicted_by_capacity", &self.evicted_by_capacity)
      .field("released", &self.released)
      .field("waiters_notified", &self.waiters_notified)
      .field("waiters_dropped", &self.waiters_dropped)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
