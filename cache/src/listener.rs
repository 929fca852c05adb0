use crate::key::AssetKey;

use std::fmt;
use std::sync::Arc;

/// Describes why a payload's native handle was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
  /// The record was evicted to bring the cache back under capacity.
  Capacity,
  /// The record was removed with `invalidate`.
  Invalidated,
  /// The cache was torn down with `release_all` or dropped.
  Teardown,
  /// A load finished for a record that no longer exists.
  Orphaned,
}

impl fmt::Display for ReleaseReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseReason::Capacity => write!(f, "evicted due to capacity"),
      ReleaseReason::Invalidated => write!(f, "manually invalidated"),
      ReleaseReason::Teardown => write!(f, "released at teardown"),
      ReleaseReason::Orphaned => write!(f, "orphaned by a late completion"),
    }
  }
}

/// A listener that is told about every release the cache performs.
///
/// `on_release` runs synchronously on the thread that drives the cache,
/// right after the payload's handle has been released.
pub trait ReleaseListener<T>: Send + Sync {
  fn on_release(&self, key: &AssetKey, payload: &Arc<T>, reason: ReleaseReason);
}
