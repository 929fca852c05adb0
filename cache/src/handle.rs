use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// A payload the cache can hold.
///
/// `release` frees whatever native resource backs the payload (a GPU texture,
/// a decoded sample buffer, a font atlas). The owning cache calls it exactly
/// once, when the record is evicted, invalidated or torn down; consumers that
/// still hold an `Arc` to the payload must not call it themselves.
pub trait Asset: Send + Sync + 'static {
  fn release(&self);
}

/// Thread-safe accounting of native handles handed out by an asset backend.
///
/// Every handle is counted once when allocated and once when released; a
/// second release of the same handle is recorded as a double release instead
/// of being counted again.
#[derive(Default)]
pub struct HandleLedger {
  next_id: AtomicU64,
  allocated: CachePadded<AtomicU64>,
  released: CachePadded<AtomicU64>,
  double_releases: CachePadded<AtomicU64>,
}

impl HandleLedger {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  /// Allocates a new tracked handle.
  pub fn allocate(self: &Arc<Self>) -> NativeHandle {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
    self.allocated.fetch_add(1, Ordering::Relaxed);
    NativeHandle {
      id,
      ledger: Arc::clone(self),
      released: AtomicBool::new(false),
    }
  }

  pub fn allocated(&self) -> u64 {
    self.allocated.load(Ordering::Relaxed)
  }

  pub fn released(&self) -> u64 {
    self.released.load(Ordering::Relaxed)
  }

  /// Handles allocated but not yet released.
  pub fn live(&self) -> u64 {
    self.allocated().saturating_sub(self.released())
  }

  pub fn double_releases(&self) -> u64 {
    self.double_releases.load(Ordering::Relaxed)
  }
}

impl fmt::Debug for HandleLedger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HandleLedger")
      .field("allocated", &self.allocated())
      .field("released", &self.released())
      .field("double_releases", &self.double_releases())
      .finish()
  }
}

/// One native resource tracked by a [`HandleLedger`].
pub struct NativeHandle {
  id: u64,
  ledger: Arc<HandleLedger>,
  released: AtomicBool,
}

impl NativeHandle {
  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn is_released(&self) -> bool {
    self.released.load(Ordering::Acquire)
  }

  /// Releases the handle. Returns `false` if it had already been released.
  pub fn release(&self) -> bool {
    if self.released.swap(true, Ordering::AcqRel) {
      self.ledger.double_releases.fetch_add(1, Ordering::Relaxed);
      tracing::warn!(handle = self.id, "native handle released twice");
      return false;
    }
    self.ledger.released.fetch_add(1, Ordering::Relaxed);
    true
  }
}

impl fmt::Debug for NativeHandle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("NativeHandle")
      .field("id", &self.id)
      .field("released", &self.is_released())
      .finish()
  }
}
