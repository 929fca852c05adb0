//! An asynchronous, request-coalescing resource cache for media assets.
//!
//! # Features
//! - **Coalescing**: concurrent requests for one key share a single load.
//! - **Main-tick resolution**: loads finish on any thread, but records change
//!   and waiters run only inside `ResourceCache::tick`.
//! - **Bounded memory**: optional capacity with least-recently-used eviction
//!   that never evicts a key someone is still waiting on.
//! - **Explicit release**: every native handle is released exactly once, on
//!   eviction, invalidation, teardown, or when a late load finds no record.
//! - **Observability**: a `MetricsSnapshot` and an optional `ReleaseListener`.

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod fetch;
pub mod handle;
pub mod key;
pub mod listener;
pub mod metrics;
pub mod policy;
pub mod record;
pub mod resource;
pub mod runtime;
pub mod waiter;

// Re-export the primary user-facing types for convenience
pub use builder::CacheBuilder;
pub use error::{AssetError, BuildError, ErrorKind, RegisterError};
pub use fetch::{Completion, Fetch, LoadOutcome, SpawnFetcher, ThreadFetcher};
pub use handle::{Asset, HandleLedger, NativeHandle};
pub use key::{AssetKey, ConsumerId};
pub use listener::{ReleaseListener, ReleaseReason};
pub use metrics::MetricsSnapshot;
pub use policy::{lru::LruPolicy, null::NullPolicy, EvictionPolicy};
pub use record::{AssetRecord, LoadState};
pub use resource::{Acquire, Lookup, ResourceCache};
pub use runtime::TaskSpawner;
pub use waiter::{PendingWaiterRegistry, Resolution, Waiter};

#[cfg(feature = "tokio")]
pub use runtime::TokioSpawner;
