use crate::error::AssetError;

use std::fmt;
use std::sync::Arc;

/// The load state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
  /// No record exists for the key.
  Absent,
  /// A load is in flight.
  Loading,
  /// The payload is resident and shared.
  Ready,
  /// The last load attempt failed.
  Failed,
}

/// The payload slot. A payload exists iff the record is `Ready`.
pub(crate) enum Slot<T> {
  Loading,
  Ready(Arc<T>),
  Failed(AssetError),
}

/// Cache-side state for one key.
pub struct AssetRecord<T> {
  pub(crate) slot: Slot<T>,
  /// Monotonic access stamp, used for least-recently-used eviction.
  pub(crate) last_access: u64,
  /// Identifies the load attempt that owns this record. Completions carrying
  /// any other generation are stale.
  pub(crate) generation: u64,
}

impl<T> AssetRecord<T> {
  pub(crate) fn loading(generation: u64, last_access: u64) -> Self {
    Self {
      slot: Slot::Loading,
      last_access,
      generation,
    }
  }

  pub fn state(&self) -> LoadState {
    match self.slot {
      Slot::Loading => LoadState::Loading,
      Slot::Ready(_) => LoadState::Ready,
      Slot::Failed(_) => LoadState::Failed,
    }
  }

  pub fn payload(&self) -> Option<&Arc<T>> {
    match &self.slot {
      Slot::Ready(payload) => Some(payload),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&AssetError> {
    match &self.slot {
      Slot::Failed(error) => Some(error),
      _ => None,
    }
  }

  pub fn last_access(&self) -> u64 {
    self.last_access
  }
}

impl<T> fmt::Debug for AssetRecord<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AssetRecord")
      .field("state", &self.state())
      .field("last_access", &self.last_access)
      .field("generation", &self.generation)
      .field("error", &self.error())
      .finish()
  }
}
