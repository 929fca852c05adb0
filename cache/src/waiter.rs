use crate::error::{AssetError, RegisterError};
use crate::key::{AssetKey, ConsumerId};

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use ahash::HashMap;

/// What a waiter receives when the load it waits on finishes.
pub type Resolution<T> = Result<Arc<T>, AssetError>;

/// A consumer parked on a key that was not ready when it asked.
pub struct Waiter<T> {
  consumer: ConsumerId,
  notify: Box<dyn FnOnce(&AssetKey, Resolution<T>) + Send>,
}

impl<T> Waiter<T> {
  pub fn new<F>(consumer: ConsumerId, notify: F) -> Self
  where
    F: FnOnce(&AssetKey, Resolution<T>) + Send + 'static,
  {
    Self {
      consumer,
      notify: Box::new(notify),
    }
  }

  pub fn consumer(&self) -> ConsumerId {
    self.consumer
  }

  pub(crate) fn resolve(self, key: &AssetKey, resolution: Resolution<T>) {
    (self.notify)(key, resolution)
  }
}

impl<T> fmt::Debug for Waiter<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Waiter")
      .field("consumer", &self.consumer)
      .finish_non_exhaustive()
  }
}

/// Per-key FIFO lists of consumers blocked on a not-yet-ready asset.
pub struct PendingWaiterRegistry<T> {
  pending: HashMap<AssetKey, VecDeque<Waiter<T>>>,
}

impl<T> Default for PendingWaiterRegistry<T> {
  fn default() -> Self {
    Self {
      pending: HashMap::default(),
    }
  }
}

impl<T> PendingWaiterRegistry<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends `waiter` to the list for `key`. A consumer can wait on a key at
  /// most once.
  pub fn register(&mut self, key: &AssetKey, waiter: Waiter<T>) -> Result<(), RegisterError> {
    if self.contains(key, waiter.consumer) {
      return Err(RegisterError::Duplicate {
        key: key.clone(),
        consumer: waiter.consumer,
      });
    }
    self.pending.entry(key.clone()).or_default().push_back(waiter);
    Ok(())
  }

  pub fn contains(&self, key: &AssetKey, consumer: ConsumerId) -> bool {
    self
      .pending
      .get(key)
      .map_or(false, |list| list.iter().any(|w| w.consumer == consumer))
  }

  pub fn has_waiters(&self, key: &AssetKey) -> bool {
    self.pending.get(key).map_or(false, |list| !list.is_empty())
  }

  pub fn waiter_count(&self, key: &AssetKey) -> usize {
    self.pending.get(key).map_or(0, VecDeque::len)
  }

  /// Total number of waiters across all keys.
  pub fn len(&self) -> usize {
    self.pending.values().map(VecDeque::len).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.pending.values().all(VecDeque::is_empty)
  }

  /// Removes and returns every waiter of `key`, in registration order.
  pub fn take(&mut self, key: &AssetKey) -> VecDeque<Waiter<T>> {
    self.pending.remove(key).unwrap_or_default()
  }

  /// Drops every waiter without notifying it. Returns how many were dropped.
  pub fn clear(&mut self) -> usize {
    let dropped = self.len();
    self.pending.clear();
    dropped
  }
}

impl<T> fmt::Debug for PendingWaiterRegistry<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PendingWaiterRegistry")
      .field("keys", &self.pending.len())
      .field("waiters", &self.len())
      .finish()
  }
}
