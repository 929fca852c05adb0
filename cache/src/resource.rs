use crate::error::{AssetError, RegisterError};
use crate::fetch::{Completion, DeliveryGate, Fetch, LoadOutcome};
use crate::handle::Asset;
use crate::key::AssetKey;
use crate::listener::{ReleaseListener, ReleaseReason};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::policy::EvictionPolicy;
use crate::record::{AssetRecord, LoadState, Slot};
use crate::waiter::{PendingWaiterRegistry, Waiter};

use std::fmt;
use std::sync::Arc;

use ahash::HashMap;
use fibre::mpmc;

/// The answer to a plain `request`.
#[derive(Debug, Clone)]
pub enum Lookup<T> {
  /// The payload is resident.
  Ready(Arc<T>),
  /// A load is in flight (possibly started by this call).
  Pending,
  /// The last load failed. Call `begin_load` to retry.
  Failed(AssetError),
}

impl<T> Lookup<T> {
  pub fn ready(self) -> Option<Arc<T>> {
    match self {
      Lookup::Ready(payload) => Some(payload),
      _ => None,
    }
  }

  pub fn is_pending(&self) -> bool {
    matches!(self, Lookup::Pending)
  }
}

/// The answer to `acquire`, the waiter-based consumer path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
  /// The payload was ready and the waiter ran synchronously.
  Delivered,
  /// The waiter is parked until the load completes.
  Waiting,
  /// The consumer was already waiting on this key. The waiter is not added
  /// again, but a load is started if none was running.
  Duplicate,
  /// The last load failed. The waiter was dropped without being called.
  Failed(AssetError),
}

/// A lazily loading, request-coalescing cache of shared assets.
///
/// All state is owned by one thread, the one that calls `tick()`. Fetchers may
/// finish on any thread; their results are queued and only applied, and
/// waiters only notified, from inside `tick()`.
pub struct ResourceCache<T: Asset> {
  name: Arc<str>,
  records: HashMap<AssetKey, AssetRecord<T>>,
  waiters: PendingWaiterRegistry<T>,
  policy: Box<dyn EvictionPolicy>,
  capacity: Option<usize>,
  ready_count: usize,
  access_clock: u64,
  next_generation: u64,
  fetcher: Arc<dyn Fetch<T>>,
  listener: Option<Arc<dyn ReleaseListener<T>>>,
  metrics: Arc<Metrics>,
  completions_tx: mpmc::Sender<LoadOutcome<T>>,
  completions_rx: mpmc::Receiver<LoadOutcome<T>>,
  gate: Arc<DeliveryGate>,
}

impl<T: Asset> ResourceCache<T> {
  pub(crate) fn from_parts(
    name: Arc<str>,
    capacity: Option<usize>,
    policy: Box<dyn EvictionPolicy>,
    fetcher: Arc<dyn Fetch<T>>,
    listener: Option<Arc<dyn ReleaseListener<T>>>,
  ) -> Self {
    let (completions_tx, completions_rx) = mpmc::unbounded();
    Self {
      name,
      records: HashMap::default(),
      waiters: PendingWaiterRegistry::new(),
      policy,
      capacity,
      ready_count: 0,
      access_clock: 0,
      next_generation: 0,
      fetcher,
      listener,
      metrics: Arc::new(Metrics::new()),
      completions_tx,
      completions_rx,
      gate: DeliveryGate::new(),
    }
  }

  /// Returns the payload for `key` if it is ready, starting a load if the key
  /// has never been requested.
  pub fn request(&mut self, key: &AssetKey) -> Lookup<T> {
    match self.state(key) {
      LoadState::Ready => {
        Metrics::bump(&self.metrics.hits);
        match self.touch(key) {
          Some(payload) => Lookup::Ready(payload),
          None => Lookup::Pending,
        }
      }
      LoadState::Loading => {
        Metrics::bump(&self.metrics.misses);
        Metrics::bump(&self.metrics.coalesced);
        tracing::debug!(cache = %self.name, %key, "request joined in-flight load");
        Lookup::Pending
      }
      LoadState::Absent => {
        Metrics::bump(&self.metrics.misses);
        self.begin_load(key);
        Lookup::Pending
      }
      LoadState::Failed => {
        Metrics::bump(&self.metrics.misses);
        match self.records.get(key).and_then(AssetRecord::error) {
          Some(error) => Lookup::Failed(error.clone()),
          None => Lookup::Pending,
        }
      }
    }
  }

  /// Starts loading `key` unless a load is already in flight or the payload is
  /// resident. A `Failed` record is replaced by a fresh attempt.
  ///
  /// Returns `true` if a fetch was started by this call.
  pub fn begin_load(&mut self, key: &AssetKey) -> bool {
    match self.state(key) {
      LoadState::Loading | LoadState::Ready => return false,
      LoadState::Absent | LoadState::Failed => {}
    }

    self.next_generation += 1;
    let generation = self.next_generation;
    let order = self.next_order();
    self.records.insert(key.clone(), AssetRecord::loading(generation, order));
    Metrics::bump(&self.metrics.loads_started);
    tracing::debug!(cache = %self.name, %key, generation, "starting load");

    let completion = Completion::new(
      key.clone(),
      generation,
      self.completions_tx.clone(),
      Arc::clone(&self.gate),
    );
    self.fetcher.fetch(key, completion);
    true
  }

  /// Parks `waiter` on `key`. Only valid while the key is `Absent` or
  /// `Loading`; registering does not itself start a load.
  pub fn register_waiter(&mut self, key: &AssetKey, waiter: Waiter<T>) -> Result<(), RegisterError> {
    match self.state(key) {
      LoadState::Absent | LoadState::Loading => self.waiters.register(key, waiter),
      state => Err(RegisterError::NotPending {
        key: key.clone(),
        state,
      }),
    }
  }

  /// Hands the payload for `key` to `waiter`, now if it is ready or on the
  /// tick that completes its load otherwise.
  pub fn acquire(&mut self, key: &AssetKey, waiter: Waiter<T>) -> Acquire {
    match self.state(key) {
      LoadState::Ready => {
        Metrics::bump(&self.metrics.hits);
        match self.touch(key) {
          Some(payload) => {
            Metrics::bump(&self.metrics.waiters_notified);
            waiter.resolve(key, Ok(payload));
            Acquire::Delivered
          }
          None => Acquire::Waiting,
        }
      }
      LoadState::Failed => {
        Metrics::bump(&self.metrics.misses);
        let error = self
          .records
          .get(key)
          .and_then(AssetRecord::error)
          .cloned()
          .unwrap_or_else(|| AssetError::transient(format!("`{}` failed to load", key)));
        Acquire::Failed(error)
      }
      state @ (LoadState::Absent | LoadState::Loading) => {
        let consumer = waiter.consumer();
        if self.waiters.register(key, waiter).is_err() {
          tracing::debug!(cache = %self.name, %key, %consumer, "consumer already waiting");
          // A waiter registered up front still needs a load behind it.
          if state == LoadState::Absent {
            self.begin_load(key);
          }
          return Acquire::Duplicate;
        }
        Metrics::bump(&self.metrics.misses);
        if state == LoadState::Absent {
          self.begin_load(key);
        } else {
          Metrics::bump(&self.metrics.coalesced);
        }
        Acquire::Waiting
      }
    }
  }

  /// Applies every completion delivered since the last call. Returns how many
  /// were processed.
  pub fn tick(&mut self) -> usize {
    let mut processed = 0;
    while let Ok(outcome) = self.completions_rx.try_recv() {
      self.on_load_complete(outcome);
      processed += 1;
    }
    processed
  }

  fn on_load_complete(&mut self, outcome: LoadOutcome<T>) {
    let LoadOutcome {
      key,
      generation,
      result,
    } = outcome;

    let current = matches!(
      self.records.get(&key),
      Some(record) if record.generation == generation && matches!(record.slot, Slot::Loading)
    );
    if !current {
      Metrics::bump(&self.metrics.stale_completions);
      tracing::debug!(cache = %self.name, %key, generation, "ignoring stale completion");
      if let Ok(payload) = result {
        self.release_payload(&key, &Arc::new(payload), ReleaseReason::Orphaned);
      }
      return;
    }

    match result {
      Ok(payload) => {
        let payload = Arc::new(payload);
        let order = self.next_order();
        if let Some(record) = self.records.get_mut(&key) {
          record.slot = Slot::Ready(Arc::clone(&payload));
          record.last_access = order;
        }
        self.ready_count += 1;
        self.policy.on_insert(&key, order);
        Metrics::bump(&self.metrics.loads_completed);

        self.evict_if_needed();

        for waiter in self.waiters.take(&key) {
          Metrics::bump(&self.metrics.waiters_notified);
          waiter.resolve(&key, Ok(Arc::clone(&payload)));
        }
      }
      Err(error) => {
        Metrics::bump(&self.metrics.loads_failed);
        let waiting = self.waiters.waiter_count(&key);
        tracing::warn!(cache = %self.name, %key, %error, waiting, "load failed");
        if let Some(record) = self.records.get_mut(&key) {
          record.slot = Slot::Failed(error.clone());
        }

        for waiter in self.waiters.take(&key) {
          Metrics::bump(&self.metrics.waiters_notified);
          waiter.resolve(&key, Err(error.clone()));
        }
      }
    }
  }

  /// Evicts least-recently-used `Ready` records until the cache is within
  /// capacity. Keys with pending waiters are never chosen; if no candidate
  /// remains, eviction is skipped for this cycle.
  pub fn evict_if_needed(&mut self) -> usize {
    let Some(capacity) = self.capacity else {
      return 0;
    };

    let mut evicted = 0;
    while self.ready_count > capacity {
      let waiters = &self.waiters;
      let victim = self
        .policy
        .select_victim(&|key: &AssetKey| !waiters.has_waiters(key));
      let Some(victim) = victim else {
        tracing::debug!(
          cache = %self.name,
          ready = self.ready_count,
          capacity,
          "no evictable record, skipping eviction"
        );
        break;
      };

      match self.remove_ready(&victim) {
        Some(payload) => {
          Metrics::bump(&self.metrics.evicted_by_capacity);
          tracing::debug!(cache = %self.name, key = %victim, "evicted");
          self.release_payload(&victim, &payload, ReleaseReason::Capacity);
          evicted += 1;
        }
        // The policy named a key that is not ready; forget it and move on.
        None => self.policy.on_remove(&victim),
      }
    }
    evicted
  }

  /// Removes a `Ready` or `Failed` record. In-flight loads are left alone.
  ///
  /// Returns `true` if a record was removed.
  pub fn invalidate(&mut self, key: &AssetKey) -> bool {
    match self.state(key) {
      LoadState::Ready => {
        if let Some(payload) = self.remove_ready(key) {
          self.release_payload(key, &payload, ReleaseReason::Invalidated);
        }
        true
      }
      LoadState::Failed => {
        self.records.remove(key);
        true
      }
      LoadState::Absent | LoadState::Loading => false,
    }
  }

  /// Releases every resident payload and forgets every record and waiter.
  ///
  /// Waiters are dropped without a notification. Loads still in flight will
  /// complete as stale and have their payload released on arrival.
  pub fn release_all(&mut self) -> usize {
    let mut released = 0;
    let records: Vec<_> = self.records.drain().collect();
    for (key, record) in records {
      if let Slot::Ready(payload) = record.slot {
        self.release_payload(&key, &payload, ReleaseReason::Teardown);
        released += 1;
      }
    }
    self.ready_count = 0;
    self.policy.clear();

    let dropped = self.waiters.clear();
    Metrics::add(&self.metrics.waiters_dropped, dropped as u64);

    tracing::info!(cache = %self.name, released, dropped_waiters = dropped, "released all assets");
    released
  }

  /// Returns the resident payload without counting an access.
  pub fn peek(&self, key: &AssetKey) -> Option<Arc<T>> {
    self.records.get(key).and_then(AssetRecord::payload).cloned()
  }

  pub fn state(&self, key: &AssetKey) -> LoadState {
    self.records.get(key).map_or(LoadState::Absent, AssetRecord::state)
  }

  pub fn error(&self, key: &AssetKey) -> Option<AssetError> {
    self.records.get(key).and_then(AssetRecord::error).cloned()
  }

  pub fn last_access(&self, key: &AssetKey) -> Option<u64> {
    self.records.get(key).map(AssetRecord::last_access)
  }

  pub fn waiter_count(&self, key: &AssetKey) -> usize {
    self.waiters.waiter_count(key)
  }

  /// Number of records in any state.
  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn ready_len(&self) -> usize {
    self.ready_count
  }

  pub fn capacity(&self) -> Option<usize> {
    self.capacity
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  fn next_order(&mut self) -> u64 {
    self.access_clock += 1;
    self.access_clock
  }

  /// Stamps a fresh access on a ready record and returns its payload.
  fn touch(&mut self, key: &AssetKey) -> Option<Arc<T>> {
    let order = self.next_order();
    let record = self.records.get_mut(key)?;
    let payload = record.payload().cloned()?;
    record.last_access = order;
    self.policy.on_access(key, order);
    Some(payload)
  }

  fn remove_ready(&mut self, key: &AssetKey) -> Option<Arc<T>> {
    if self.state(key) != LoadState::Ready {
      return None;
    }
    let record = self.records.remove(key)?;
    let Slot::Ready(payload) = record.slot else {
      return None;
    };
    self.ready_count -= 1;
    self.policy.on_remove(key);
    Some(payload)
  }

  fn release_payload(&self, key: &AssetKey, payload: &Arc<T>, reason: ReleaseReason) {
    payload.release();
    Metrics::bump(&self.metrics.released);
    if let Some(listener) = &self.listener {
      listener.on_release(key, payload, reason);
    }
  }
}

impl<T: Asset> Drop for ResourceCache<T> {
  fn drop(&mut self) {
    self.gate.close();
    // Anything queued before the gate closed is ours to release.
    while let Ok(outcome) = self.completions_rx.try_recv() {
      if let Ok(payload) = outcome.result {
        self.release_payload(&outcome.key, &Arc::new(payload), ReleaseReason::Orphaned);
      }
    }
    if !self.records.is_empty() || !self.waiters.is_empty() {
      self.release_all();
    }
  }
}

impl<T: Asset> fmt::Debug for ResourceCache<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ResourceCache")
      .field("name", &self.name)
      .field("records", &self.records.len())
      .field("ready", &self.ready_count)
      .field("capacity", &self.capacity)
      .field("waiters", &self.waiters)
      .finish_non_exhaustive()
  }
}
