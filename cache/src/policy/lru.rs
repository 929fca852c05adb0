use super::EvictionPolicy;
use crate::key::AssetKey;

use std::collections::BTreeMap;

use ahash::HashMap;

/// An eviction policy that evicts the least recently used entries.
///
/// Keys are ordered by the cache's monotonic access stamp, so the oldest
/// stamp is always the first candidate.
#[derive(Debug, Default)]
pub struct LruPolicy {
  // Access stamp -> key, oldest first.
  by_order: BTreeMap<u64, AssetKey>,
  // Key -> its current stamp, for O(log n) moves.
  orders: HashMap<AssetKey, u64>,
}

impl LruPolicy {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.orders.len()
  }

  pub fn is_empty(&self) -> bool {
    self.orders.is_empty()
  }

  fn touch(&mut self, key: &AssetKey, order: u64) {
    if let Some(previous) = self.orders.insert(key.clone(), order) {
      self.by_order.remove(&previous);
    }
    self.by_order.insert(order, key.clone());
  }
}

impl EvictionPolicy for LruPolicy {
  fn on_insert(&mut self, key: &AssetKey, order: u64) {
    self.touch(key, order);
  }

  fn on_access(&mut self, key: &AssetKey, order: u64) {
    // Only keys that were admitted are tracked.
    if self.orders.contains_key(key) {
      self.touch(key, order);
    }
  }

  fn on_remove(&mut self, key: &AssetKey) {
    if let Some(order) = self.orders.remove(key) {
      self.by_order.remove(&order);
    }
  }

  fn select_victim(&self, evictable: &dyn Fn(&AssetKey) -> bool) -> Option<AssetKey> {
    self.by_order.values().find(|key| evictable(key)).cloned()
  }

  fn clear(&mut self) {
    self.by_order.clear();
    self.orders.clear();
  }
}
