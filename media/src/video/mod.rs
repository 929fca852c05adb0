//! Video: a prepare-with-timeout handshake per playback request, plus the
//! render targets it wires up.

pub mod path;
pub mod render_target;
pub mod session;

pub use path::{resolve_playable_path, Platform};
pub use render_target::{
  DisplayRect, RenderTarget, RenderTargetPool, MIN_RENDER_TARGET_DIMENSION, RENDER_TARGET_DEPTH_BITS,
};
pub use session::{
  DisplaySurface, ErrorHandler, PrepareStatus, SubscriptionId, VideoPlayer, VideoPrepareSession, VideoPresenter,
};

use std::fmt;

/// Identity of one playback target (a video widget's player).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(u64);

impl PlayerId {
  pub const fn new(id: u64) -> Self {
    Self(id)
  }

  pub const fn get(self) -> u64 {
    self.0
  }
}

impl fmt::Display for PlayerId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "player#{}", self.0)
  }
}
