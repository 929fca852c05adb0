use crate::error::AssetError;
use crate::handle::Asset;
use crate::key::AssetKey;
use crate::runtime::TaskSpawner;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::thread;

use fibre::mpmc;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;

/// Open while the owning cache accepts completions.
///
/// Senders hold the read side while they enqueue; the cache takes the write
/// side to close it, after which nothing more can land in the channel.
#[derive(Debug)]
pub(crate) struct DeliveryGate(RwLock<bool>);

impl DeliveryGate {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self(RwLock::new(true)))
  }

  pub(crate) fn close(&self) {
    *self.0.write() = false;
  }
}

/// A finished load attempt, delivered to the cache on its next tick.
pub struct LoadOutcome<T> {
  pub(crate) key: AssetKey,
  pub(crate) generation: u64,
  pub(crate) result: Result<T, AssetError>,
}

impl<T> LoadOutcome<T> {
  pub fn key(&self) -> &AssetKey {
    &self.key
  }
}

impl<T> fmt::Debug for LoadOutcome<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoadOutcome")
      .field("key", &self.key)
      .field("generation", &self.generation)
      .field("ok", &self.result.is_ok())
      .finish()
  }
}

/// The single-use reply slot of one load attempt.
///
/// A fetcher may complete it from any thread. The outcome is queued and only
/// applied to the cache when the owner calls `tick()` on the main thread.
/// Dropping a `Completion` without completing it reports the load as
/// abandoned, so every attempt resolves exactly once.
pub struct Completion<T: Asset> {
  key: AssetKey,
  generation: u64,
  sender: Option<mpmc::Sender<LoadOutcome<T>>>,
  gate: Arc<DeliveryGate>,
}

impl<T: Asset> Completion<T> {
  pub(crate) fn new(
    key: AssetKey,
    generation: u64,
    sender: mpmc::Sender<LoadOutcome<T>>,
    gate: Arc<DeliveryGate>,
  ) -> Self {
    Self {
      key,
      generation,
      sender: Some(sender),
      gate,
    }
  }

  pub fn key(&self) -> &AssetKey {
    &self.key
  }

  pub fn complete(mut self, result: Result<T, AssetError>) {
    self.deliver(result);
  }

  fn deliver(&mut self, result: Result<T, AssetError>) {
    let Some(sender) = self.sender.take() else {
      return;
    };

    let open = self.gate.0.read();
    // Nobody will ever release a payload that arrives after its cache is gone.
    if !*open {
      if let Ok(payload) = &result {
        payload.release();
      }
      tracing::debug!(key = %self.key, "load finished after its cache was dropped");
      return;
    }

    let outcome = LoadOutcome {
      key: self.key.clone(),
      generation: self.generation,
      result,
    };
    if sender.send(outcome).is_err() {
      tracing::debug!(key = %self.key, "completion channel closed before delivery");
    }
    drop(open);
  }
}

impl<T: Asset> Drop for Completion<T> {
  fn drop(&mut self) {
    if self.sender.is_some() {
      let error = AssetError::transient(format!("load of `{}` was abandoned", self.key));
      self.deliver(Err(error));
    }
  }
}

impl<T: Asset> fmt::Debug for Completion<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Completion")
      .field("key", &self.key)
      .field("generation", &self.generation)
      .field("pending", &self.sender.is_some())
      .finish()
  }
}

/// Starts the asynchronous fetch of one asset.
///
/// `fetch` is called on the main thread and must not block; it hands the
/// `Completion` to whatever background machinery produces the payload.
pub trait Fetch<T: Asset>: Send + Sync + 'static {
  fn fetch(&self, key: &AssetKey, completion: Completion<T>);
}

impl<T, F> Fetch<T> for F
where
  T: Asset,
  F: Fn(&AssetKey, Completion<T>) + Send + Sync + 'static,
{
  fn fetch(&self, key: &AssetKey, completion: Completion<T>) {
    self(key, completion)
  }
}

type BlockingLoad<T> = dyn Fn(&AssetKey) -> Result<T, AssetError> + Send + Sync;

/// Runs a blocking loader on a dedicated background thread per load.
pub struct ThreadFetcher<T> {
  load: Arc<BlockingLoad<T>>,
}

impl<T: Asset> ThreadFetcher<T> {
  pub fn new(load: impl Fn(&AssetKey) -> Result<T, AssetError> + Send + Sync + 'static) -> Self {
    Self {
      load: Arc::new(load),
    }
  }
}

impl<T: Asset> Fetch<T> for ThreadFetcher<T> {
  fn fetch(&self, key: &AssetKey, completion: Completion<T>) {
    let load = Arc::clone(&self.load);
    let key = key.clone();
    let spawned = thread::Builder::new()
      .name(format!("asset-load:{}", key))
      .spawn(move || {
        let result = load(&key);
        completion.complete(result);
      });

    // A failed spawn drops the closure, and with it the completion, which
    // reports the load as abandoned.
    if let Err(e) = spawned {
      tracing::warn!(error = %e, "could not spawn asset loader thread");
    }
  }
}

type AsyncLoad<T> = dyn Fn(AssetKey) -> BoxFuture<'static, Result<T, AssetError>> + Send + Sync;

/// Runs an async loader on a `TaskSpawner`.
pub struct SpawnFetcher<T> {
  load: Arc<AsyncLoad<T>>,
  spawner: Arc<dyn TaskSpawner>,
}

impl<T: Asset> SpawnFetcher<T> {
  pub fn new<F, Fut>(spawner: Arc<dyn TaskSpawner>, load: F) -> Self
  where
    F: Fn(AssetKey) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, AssetError>> + Send + 'static,
  {
    let load = move |key| Box::pin(load(key)) as BoxFuture<'static, Result<T, AssetError>>;
    Self {
      load: Arc::new(load),
      spawner,
    }
  }

  pub(crate) fn from_parts(spawner: Arc<dyn TaskSpawner>, load: Arc<AsyncLoad<T>>) -> Self {
    Self { load, spawner }
  }
}

impl<T: Asset> Fetch<T> for SpawnFetcher<T> {
  fn fetch(&self, key: &AssetKey, completion: Completion<T>) {
    let future = (self.load)(key.clone());
    self.spawner.spawn(Box::pin(async move {
      let result = future.await;
      completion.complete(result);
    }));
  }
}

pub(crate) type AsyncLoader<T> = Arc<AsyncLoad<T>>;
