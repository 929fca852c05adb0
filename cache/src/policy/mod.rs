pub mod lru;
pub mod null;

use crate::key::AssetKey;

/// A trait for implementing cache eviction policies.
///
/// The policy tracks which `Ready` keys exist and how recently each was used.
/// The cache decides *when* to evict (its Ready count is above capacity); the
/// policy decides *which* key goes.
pub trait EvictionPolicy: Send {
  /// Called when a key becomes `Ready`, with its access stamp.
  fn on_insert(&mut self, key: &AssetKey, order: u64);

  /// Called when a `Ready` key is handed out again.
  fn on_access(&mut self, key: &AssetKey, order: u64);

  /// Called when a key leaves the `Ready` set for any reason.
  fn on_remove(&mut self, key: &AssetKey);

  /// Picks the next victim among the keys for which `evictable` returns
  /// `true`, or `None` if there is no acceptable candidate.
  fn select_victim(&self, evictable: &dyn Fn(&AssetKey) -> bool) -> Option<AssetKey>;

  /// Clears all state from the policy.
  fn clear(&mut self);
}
