#![allow(dead_code)]

use kiosk_cache::{
  Asset, AssetError, AssetKey, CacheBuilder, Completion, ConsumerId, ErrorKind, Fetch, HandleLedger,
  NativeHandle, ReleaseListener, ReleaseReason, ResourceCache, Waiter,
};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A payload backed by one tracked native handle.
#[derive(Debug)]
pub struct TestAsset {
  pub name: String,
  pub handle: NativeHandle,
}

impl TestAsset {
  pub fn new(name: impl Into<String>, ledger: &Arc<HandleLedger>) -> Self {
    Self {
      name: name.into(),
      handle: ledger.allocate(),
    }
  }
}

impl Asset for TestAsset {
  fn release(&self) {
    self.handle.release();
  }
}

/// A fetcher that parks every completion until the test resolves it by hand.
#[derive(Clone, Default)]
pub struct ManualFetcher {
  parked: Arc<Mutex<Vec<Completion<TestAsset>>>>,
  started: Arc<AtomicUsize>,
}

impl Fetch<TestAsset> for ManualFetcher {
  fn fetch(&self, _key: &AssetKey, completion: Completion<TestAsset>) {
    self.started.fetch_add(1, Ordering::SeqCst);
    self.parked.lock().push(completion);
  }
}

impl ManualFetcher {
  /// Number of fetches ever started.
  pub fn started(&self) -> usize {
    self.started.load(Ordering::SeqCst)
  }

  pub fn parked_keys(&self) -> Vec<String> {
    self.parked.lock().iter().map(|c| c.key().to_string()).collect()
  }

  fn take(&self, key: &str) -> Option<Completion<TestAsset>> {
    let mut parked = self.parked.lock();
    let index = parked.iter().position(|c| c.key().as_str() == key)?;
    Some(parked.remove(index))
  }

  /// Completes the oldest parked load of `key` with a fresh payload.
  pub fn succeed(&self, key: &str, ledger: &Arc<HandleLedger>) -> bool {
    match self.take(key) {
      Some(completion) => {
        completion.complete(Ok(TestAsset::new(format!("payload:{}", key), ledger)));
        true
      }
      None => false,
    }
  }

  pub fn fail(&self, key: &str, error: AssetError) -> bool {
    match self.take(key) {
      Some(completion) => {
        completion.complete(Err(error));
        true
      }
      None => false,
    }
  }

  /// Drops the parked completion without completing it.
  pub fn abandon(&self, key: &str) -> bool {
    self.take(key).is_some()
  }
}

pub type Notifications = Arc<Mutex<Vec<(u64, Result<String, ErrorKind>)>>>;

/// A waiter that records `(consumer, payload name or error kind)`.
pub fn recording_waiter(consumer: u64, log: &Notifications) -> Waiter<TestAsset> {
  let log = Arc::clone(log);
  Waiter::<TestAsset>::new(ConsumerId::new(consumer), move |_key, resolution| {
    let entry = resolution.map(|asset| asset.name.clone()).map_err(|e| e.kind());
    log.lock().push((consumer, entry));
  })
}

/// A listener that records every release.
#[derive(Clone, Default)]
pub struct RecordingListener {
  pub releases: Arc<Mutex<Vec<(String, ReleaseReason)>>>,
}

impl ReleaseListener<TestAsset> for RecordingListener {
  fn on_release(&self, key: &AssetKey, payload: &Arc<TestAsset>, reason: ReleaseReason) {
    assert!(payload.handle.is_released());
    self.releases.lock().push((key.to_string(), reason));
  }
}

impl RecordingListener {
  pub fn reasons_for(&self, key: &str) -> Vec<ReleaseReason> {
    self
      .releases
      .lock()
      .iter()
      .filter(|(k, _)| k == key)
      .map(|(_, reason)| *reason)
      .collect()
  }
}

pub fn key(name: &str) -> AssetKey {
  AssetKey::from(name)
}

pub fn build_manual_cache(fetcher: &ManualFetcher) -> ResourceCache<TestAsset> {
  CacheBuilder::<TestAsset>::new("test").fetcher(fetcher.clone()).build().unwrap()
}

pub fn build_bounded_cache(
  fetcher: &ManualFetcher,
  capacity: usize,
  listener: &RecordingListener,
) -> ResourceCache<TestAsset> {
  CacheBuilder::<TestAsset>::new("bounded")
    .capacity(capacity)
    .fetcher(fetcher.clone())
    .release_listener(listener.clone())
    .build()
    .unwrap()
}

/// Loads `name` to `Ready` through the manual fetcher.
pub fn load_ready(
  cache: &mut ResourceCache<TestAsset>,
  fetcher: &ManualFetcher,
  ledger: &Arc<HandleLedger>,
  name: &str,
) {
  cache.request(&key(name));
  assert!(fetcher.succeed(name, ledger), "no parked load for {}", name);
  cache.tick();
}

/// The log entry a waiter records for a successful delivery of `name`.
pub fn delivered(consumer: u64, name: &str) -> (u64, Result<String, ErrorKind>) {
  (consumer, Ok(format!("payload:{}", name)))
}

pub fn failed(consumer: u64, kind: ErrorKind) -> (u64, Result<String, ErrorKind>) {
  (consumer, Err(kind))
}
