use super::EvictionPolicy;
use crate::key::AssetKey;

/// A "no-op" eviction policy for unbounded caches. It never evicts anything.
#[derive(Debug, Default)]
pub struct NullPolicy;

impl EvictionPolicy for NullPolicy {
  fn on_insert(&mut self, _key: &AssetKey, _order: u64) {}

  fn on_access(&mut self, _key: &AssetKey, _order: u64) {}

  fn on_remove(&mut self, _key: &AssetKey) {}

  fn select_victim(&self, _evictable: &dyn Fn(&AssetKey) -> bool) -> Option<AssetKey> {
    None
  }

  fn clear(&mut self) {}
}
