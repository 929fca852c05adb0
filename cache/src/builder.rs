use crate::error::{AssetError, BuildError};
use crate::fetch::{AsyncLoader, Fetch, SpawnFetcher, ThreadFetcher};
use crate::handle::Asset;
use crate::key::AssetKey;
use crate::listener::ReleaseListener;
use crate::policy::lru::LruPolicy;
use crate::policy::null::NullPolicy;
use crate::policy::EvictionPolicy;
use crate::resource::ResourceCache;
use crate::runtime::TaskSpawner;

use core::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

/// A builder for creating `ResourceCache` instances.
pub struct CacheBuilder<T: Asset> {
  name: Arc<str>,
  capacity: Option<usize>,
  policy: Option<Box<dyn EvictionPolicy>>,
  fetcher: Option<Arc<dyn Fetch<T>>>,
  async_loader: Option<AsyncLoader<T>>,
  spawner: Option<Arc<dyn TaskSpawner>>,
  listener: Option<Arc<dyn ReleaseListener<T>>>,
}

impl<T: Asset> fmt::Debug for CacheBuilder<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("name", &self.name)
      .field("capacity", &self.capacity)
      .field("has_policy", &self.policy.is_some())
      .field("has_fetcher", &(self.fetcher.is_some() || self.async_loader.is_some()))
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}

impl<T: Asset> Default for CacheBuilder<T> {
  fn default() -> Self {
    Self::new("assets")
  }
}

impl<T: Asset> CacheBuilder<T> {
  /// Creates a builder for an unbounded cache called `name`. The name only
  /// shows up in logs.
  pub fn new(name: impl Into<Arc<str>>) -> Self {
    Self {
      name: name.into(),
      capacity: None,
      policy: None,
      fetcher: None,
      async_loader: None,
      spawner: None,
      listener: None,
    }
  }

  pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
    self.name = name.into();
    self
  }

  /// Bounds the number of `Ready` records. Unless another policy is set, the
  /// least recently used record is evicted first.
  pub fn capacity(mut self, capacity: usize) -> Self {
    self.capacity = Some(capacity);
    self
  }

  /// Removes the capacity bound. Nothing is ever evicted.
  pub fn unbounded(mut self) -> Self {
    self.capacity = None;
    self
  }

  /// Sets a custom eviction policy for the cache.
  ///
  /// By default a bounded cache uses `LruPolicy` and an unbounded one
  /// `NullPolicy`.
  pub fn eviction_policy<P>(mut self, policy: P) -> Self
  where
    P: EvictionPolicy + 'static,
  {
    self.policy = Some(Box::new(policy));
    self
  }

  /// Sets the fetch strategy used to start loads.
  pub fn fetcher<F>(mut self, fetcher: F) -> Self
  where
    F: Fetch<T>,
  {
    self.fetcher = Some(Arc::new(fetcher));
    self.async_loader = None;
    self
  }

  /// Sets a blocking loader. Each load runs on its own background thread.
  pub fn loader(self, f: impl Fn(&AssetKey) -> Result<T, AssetError> + Send + Sync + 'static) -> Self {
    self.fetcher(ThreadFetcher::new(f))
  }

  /// Sets an asynchronous loader. Loads are spawned on the configured
  /// `spawner`, or on the ambient Tokio runtime when the `tokio` feature is on.
  pub fn async_loader<F, Fut>(mut self, f: F) -> Self
  where
    F: Fn(AssetKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, AssetError>> + Send + 'static,
  {
    let loader_fn = move |key| Box::pin(f(key)) as BoxFuture<'static, Result<T, AssetError>>;
    self.async_loader = Some(Arc::new(loader_fn));
    self.fetcher = None;
    self
  }

  pub fn spawner(mut self, spawner: Arc<dyn TaskSpawner>) -> Self {
    self.spawner = Some(spawner);
    self
  }

  /// Sets a listener that observes every native-handle release.
  pub fn release_listener<L>(mut self, listener: L) -> Self
  where
    L: ReleaseListener<T> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  /// Builds the cache.
  pub fn build(self) -> Result<ResourceCache<T>, BuildError> {
    if self.capacity == Some(0) {
      return Err(BuildError::ZeroCapacity);
    }

    let fetcher: Arc<dyn Fetch<T>> = match (self.fetcher, self.async_loader) {
      (Some(fetcher), _) => fetcher,
      (None, Some(load)) => {
        let spawner = match self.spawner {
          Some(spawner) => spawner,
          None => default_spawner().ok_or(BuildError::SpawnerRequired)?,
        };
        Arc::new(SpawnFetcher::from_parts(spawner, load))
      }
      (None, None) => return Err(BuildError::FetcherRequired),
    };

    let policy = match self.policy {
      Some(policy) => policy,
      None if self.capacity.is_some() => Box::new(LruPolicy::new()) as Box<dyn EvictionPolicy>,
      None => Box::new(NullPolicy),
    };

    Ok(ResourceCache::from_parts(
      self.name,
      self.capacity,
      policy,
      fetcher,
      self.listener,
    ))
  }
}

#[cfg(feature = "tokio")]
fn default_spawner() -> Option<Arc<dyn TaskSpawner>> {
  crate::runtime::TokioSpawner::try_current().map(|s| Arc::new(s) as Arc<dyn TaskSpawner>)
}

#[cfg(not(feature = "tokio"))]
fn default_spawner() -> Option<Arc<dyn TaskSpawner>> {
  None
}
