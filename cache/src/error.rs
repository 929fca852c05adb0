use crate::key::{AssetKey, ConsumerId};
use crate::record::LoadState;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// The failure taxonomy shared by every asset kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
  /// The asset path or key does not exist.
  NotFound,
  /// Bytes were present but could not be read as the expected media type.
  DecodeFailed,
  /// A bounded wait ran out before the resource became ready.
  Timeout,
  /// The caller passed a missing target or an unconfigured key.
  InvalidRequest,
  /// An expected, retryable I/O hiccup.
  Transient,
}

impl fmt::Display for ErrorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ErrorKind::NotFound => write!(f, "not found"),
      ErrorKind::DecodeFailed => write!(f, "decode failed"),
      ErrorKind::Timeout => write!(f, "timed out"),
      ErrorKind::InvalidRequest => write!(f, "invalid request"),
      ErrorKind::Transient => write!(f, "transient I/O error"),
    }
  }
}

/// A terminal failure for one asset request.
///
/// Cloning is cheap; the same error is handed to every waiter of a key.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct AssetError {
  kind: ErrorKind,
  message: String,
  #[source]
  cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl AssetError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
      cause: None,
    }
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::NotFound, message)
  }

  pub fn decode_failed(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::DecodeFailed, message)
  }

  pub fn timeout(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Timeout, message)
  }

  pub fn invalid_request(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::InvalidRequest, message)
  }

  pub fn transient(message: impl Into<String>) -> Self {
    Self::new(ErrorKind::Transient, message)
  }

  /// Attaches the underlying error that caused this failure.
  pub fn with_cause<E>(mut self, cause: E) -> Self
  where
    E: StdError + Send + Sync + 'static,
  {
    self.cause = Some(Arc::new(cause));
    self
  }

  pub fn kind(&self) -> ErrorKind {
    self.kind
  }

  pub fn message(&self) -> &str {
    &self.message
  }

  pub fn is_transient(&self) -> bool {
    self.kind == ErrorKind::Transient
  }
}

impl PartialEq for AssetError {
  fn eq(&self, other: &Self) -> bool {
    self.kind == other.kind && self.message == other.message
  }
}

impl Eq for AssetError {}

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// A bounded cache was configured with a capacity of zero. Use
  /// `unbounded()` for a cache that never evicts.
  ZeroCapacity,
  /// No fetch strategy was configured.
  FetcherRequired,
  /// An `async_loader` was provided, but no `TaskSpawner` was configured
  /// and no Tokio runtime was reachable.
  SpawnerRequired,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::ZeroCapacity => write!(f, "bounded cache capacity cannot be zero"),
      BuildError::FetcherRequired => write!(f, "a cache needs a fetcher or loader"),
      BuildError::SpawnerRequired => write!(
        f,
        "an async loader requires a task spawner or a running Tokio runtime"
      ),
    }
  }
}

impl StdError for BuildError {}

/// Why a waiter could not be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
  /// The same consumer is already waiting on this key.
  Duplicate { key: AssetKey, consumer: ConsumerId },
  /// The key is already `Ready` or `Failed`; there is nothing left to wait for.
  NotPending { key: AssetKey, state: LoadState },
}

impl fmt::Display for RegisterError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RegisterError::Duplicate { key, consumer } => {
        write!(f, "consumer {} is already waiting on `{}`", consumer, key)
      }
      RegisterError::NotPending { key, state } => {
        write!(f, "`{}` is {:?}, waiters can only join a pending load", key, state)
      }
    }
  }
}

impl StdError for RegisterError {}
