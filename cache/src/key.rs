use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// An opaque name for one logical asset slot, e.g. a font slot, a sound key
/// or a video source path.
///
/// Keys are cheap to clone and hash exactly like the `str` they wrap, so maps
/// keyed by `AssetKey` can be queried with a plain `&str`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetKey(Arc<str>);

impl AssetKey {
  pub fn new(key: impl AsRef<str>) -> Self {
    Self(Arc::from(key.as_ref()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Debug for AssetKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "AssetKey({:?})", &*self.0)
  }
}

impl fmt::Display for AssetKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl Borrow<str> for AssetKey {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl AsRef<str> for AssetKey {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

impl From<&str> for AssetKey {
  fn from(value: &str) -> Self {
    Self::new(value)
  }
}

impl From<String> for AssetKey {
  fn from(value: String) -> Self {
    Self(Arc::from(value))
  }
}

impl From<&String> for AssetKey {
  fn from(value: &String) -> Self {
    Self::new(value)
  }
}

/// Identity of a consumer (a label, a player, a panel) used to deduplicate
/// waiter registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

impl From<u64> for ConsumerId {
  fn from(value: u64) -> Self {
    Self(value)
  }
}

impl fmt::Display for ConsumerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use ahash::HashMap;

  #[test]
  fn keys_are_queryable_by_str() {
    let mut map = HashMap::default();
    map.insert(AssetKey::from("font2"), 7);
    assert_eq!(map.get("font2"), Some(&7));
    assert_eq!(map.get("font3"), None);
  }
}
