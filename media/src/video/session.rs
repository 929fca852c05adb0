use super::path::{resolve_playable_path, Platform};
use super::render_target::{DisplayRect, RenderTarget, RenderTargetPool};
use super::PlayerId;
use crate::settings::VideoSetting;
use crate::store::AssetStore;

use kiosk_cache::{AssetError, HandleLedger};

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::HashMap;
use parking_lot::Mutex;

/// Called with the message of a playback error event.
pub type ErrorHandler = Box<dyn FnMut(&str) + Send>;

/// Identifies one error-event subscription on a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

/// The engine-side video player a session drives.
pub trait VideoPlayer {
  fn id(&self) -> PlayerId;
  fn set_render_target(&mut self, target: Arc<RenderTarget>);
  fn set_source(&mut self, path: &Path);
  /// Routes the audio track directly to the output at `volume` (0..=1).
  fn route_audio(&mut self, volume: f32);
  fn subscribe_errors(&mut self, handler: ErrorHandler) -> SubscriptionId;
  fn unsubscribe_errors(&mut self, subscription: SubscriptionId);
  /// Starts preparing the current source. Completion is observed by polling.
  fn prepare(&mut self);
  fn is_prepared(&self) -> bool;
  fn play(&mut self);
}

/// The on-screen node a video is shown on.
pub trait DisplaySurface {
  fn show(&mut self, target: Arc<RenderTarget>, rect: DisplayRect);
}

#[derive(Debug, Clone, PartialEq)]
pub enum PrepareStatus {
  Preparing,
  Playing,
  Failed(AssetError),
}

impl PrepareStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, PrepareStatus::Preparing)
  }
}

/// Error subscription of a session, shared with the presenter that started
/// it so a later `present` on the same player can tear it down.
#[derive(Debug, Default)]
struct Wiring {
  subscription: Option<SubscriptionId>,
  superseded: bool,
}

/// One prepare handshake: waits, one poll per tick, until the player is
/// prepared, reports an error, or the timeout passes.
#[must_use = "a prepare session does nothing unless polled"]
pub struct VideoPrepareSession {
  player: PlayerId,
  path: PathBuf,
  started_at: Instant,
  timeout: Duration,
  wiring: Arc<Mutex<Wiring>>,
  error: Arc<Mutex<Option<String>>>,
  status: PrepareStatus,
}

impl VideoPrepareSession {
  pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

  /// Points `player` at `path` and starts preparing it.
  pub fn begin<P: VideoPlayer + ?Sized>(
    player: &mut P,
    path: PathBuf,
    volume: f32,
    timeout: Duration,
    now: Instant,
  ) -> Self {
    let error = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&error);
    let subscription = player.subscribe_errors(Box::new(move |message: &str| {
      sink.lock().get_or_insert_with(|| message.to_string());
    }));

    player.set_source(&path);
    player.route_audio(if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 });
    player.prepare();
    tracing::debug!(player = %player.id(), path = %path.display(), "preparing video");

    Self {
      player: player.id(),
      path,
      started_at: now,
      timeout,
      wiring: Arc::new(Mutex::new(Wiring {
        subscription: Some(subscription),
        superseded: false,
      })),
      error,
      status: PrepareStatus::Preparing,
    }
  }

  /// Advances the handshake. Once a terminal status is reached it is
  /// returned unchanged by every later poll.
  pub fn poll<P: VideoPlayer + ?Sized>(&mut self, player: &mut P, now: Instant) -> PrepareStatus {
    if self.status.is_terminal() {
      return self.status.clone();
    }

    if self.wiring.lock().superseded {
      tracing::debug!(player = %self.player, path = %self.path.display(), "video prepare superseded");
      let error = AssetError::invalid_request(format!("prepare of {} was superseded", self.path.display()));
      return self.finish(player, PrepareStatus::Failed(error));
    }

    let reported = self.error.lock().take();
    if let Some(message) = reported {
      tracing::error!(player = %self.player, path = %self.path.display(), %message, "video prepare failed");
      let error = AssetError::decode_failed(format!("{}: {}", self.path.display(), message));
      return self.finish(player, PrepareStatus::Failed(error));
    }

    if player.is_prepared() {
      player.play();
      tracing::info!(player = %self.player, path = %self.path.display(), "video playing");
      return self.finish(player, PrepareStatus::Playing);
    }

    let waited = now.saturating_duration_since(self.started_at);
    if waited >= self.timeout {
      tracing::error!(
        player = %self.player,
        path = %self.path.display(),
        waited_secs = waited.as_secs_f32(),
        "video prepare timed out"
      );
      let error = AssetError::timeout(format!(
        "{} was not prepared within {:?}",
        self.path.display(),
        self.timeout
      ));
      return self.finish(player, PrepareStatus::Failed(error));
    }

    PrepareStatus::Preparing
  }

  /// Abandons the handshake without playing.
  pub fn cancel<P: VideoPlayer + ?Sized>(&mut self, player: &mut P) {
    if !self.status.is_terminal() {
      let error = AssetError::invalid_request(format!("prepare of {} was cancelled", self.path.display()));
      self.finish(player, PrepareStatus::Failed(error));
    }
  }

  pub fn status(&self) -> &PrepareStatus {
    &self.status
  }

  pub fn player(&self) -> PlayerId {
    self.player
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn is_subscribed(&self) -> bool {
    self.wiring.lock().subscription.is_some()
  }

  fn finish<P: VideoPlayer + ?Sized>(&mut self, player: &mut P, status: PrepareStatus) -> PrepareStatus {
    let subscription = self.wiring.lock().subscription.take();
    if let Some(subscription) = subscription {
      player.unsubscribe_errors(subscription);
    }
    self.status = status.clone();
    status
  }
}

impl fmt::Debug for VideoPrepareSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VideoPrepareSession")
      .field("player", &self.player)
      .field("path", &self.path)
      .field("status", &self.status)
      .field("subscribed", &self.is_subscribed())
      .finish()
  }
}

/// Starts prepare sessions from video settings, owning the render targets.
pub struct VideoPresenter {
  store: AssetStore,
  platform: Platform,
  pool: RenderTargetPool,
  timeout: Duration,
  // Wiring of the most recent session per player.
  live: HashMap<PlayerId, Arc<Mutex<Wiring>>>,
}

impl VideoPresenter {
  pub fn new(store: AssetStore, ledger: Arc<HandleLedger>) -> Self {
    Self {
      store,
      platform: Platform::current(),
      pool: RenderTargetPool::new(ledger),
      timeout: VideoPrepareSession::DEFAULT_TIMEOUT,
      live: HashMap::default(),
    }
  }

  pub fn with_platform(mut self, platform: Platform) -> Self {
    self.platform = platform;
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Wires a fresh render target to `player` and `surface`, then starts
  /// preparing the configured file.
  ///
  /// Invalid input (no surface, no file name, an address outside the store)
  /// is rejected before anything is allocated. A session still running on
  /// the same player is unsubscribed and reports `Failed` on its next poll.
  pub fn present<P: VideoPlayer + ?Sized>(
    &mut self,
    setting: &VideoSetting,
    player: &mut P,
    surface: Option<&mut dyn DisplaySurface>,
    now: Instant,
  ) -> Result<VideoPrepareSession, AssetError> {
    let Some(surface) = surface else {
      tracing::debug!(player = %player.id(), "no display surface, video not presented");
      return Err(AssetError::invalid_request("video needs a display surface"));
    };
    if setting.file_name.trim().is_empty() {
      tracing::debug!(player = %player.id(), widget = %setting.transform.name, "video has no file name");
      return Err(AssetError::invalid_request("video has no file name"));
    }
    let path = resolve_playable_path(&self.store, &setting.file_name, self.platform).map_err(|error| {
      tracing::debug!(player = %player.id(), %error, "video path rejected");
      error
    })?;

    self.supersede(player);

    let rect = DisplayRect::from(&setting.transform);
    let (width, height) = rect.pixel_size();
    let target = self.pool.allocate(player.id(), width, height);
    player.set_render_target(Arc::clone(&target));
    surface.show(target, rect);

    let session = VideoPrepareSession::begin(player, path, setting.volume, self.timeout, now);
    self.live.insert(player.id(), Arc::clone(&session.wiring));
    Ok(session)
  }

  fn supersede<P: VideoPlayer + ?Sized>(&mut self, player: &mut P) {
    let Some(previous) = self.live.remove(&player.id()) else {
      return;
    };
    let mut wiring = previous.lock();
    if let Some(subscription) = wiring.subscription.take() {
      tracing::debug!(player = %player.id(), subscription = subscription.get(), "dropping previous error subscription");
      player.unsubscribe_errors(subscription);
    }
    wiring.superseded = true;
  }

  pub fn render_targets(&self) -> &RenderTargetPool {
    &self.pool
  }

  /// Releases the render target wired to `player`.
  pub fn release(&mut self, player: PlayerId) -> bool {
    self.pool.release(player)
  }

  pub fn release_all(&mut self) -> usize {
    self.pool.release_all()
  }

  pub fn platform(&self) -> Platform {
    self.platform
  }

  pub fn timeout(&self) -> Duration {
    self.timeout
  }
}

impl fmt::Debug for VideoPresenter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("VideoPresenter")
      .field("root", &self.store.root())
      .field("platform", &self.platform)
      .field("pool", &self.pool)
      .field("timeout", &self.timeout)
      .finish()
  }
}
