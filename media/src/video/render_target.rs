use super::PlayerId;
use crate::settings::WidgetTransform;

use kiosk_cache::{Asset, HandleLedger, NativeHandle};

use std::fmt;
use std::sync::Arc;

use ahash::HashMap;

/// Smallest width or height a render target is created with.
pub const MIN_RENDER_TARGET_DIMENSION: u32 = 2;
pub const RENDER_TARGET_DEPTH_BITS: u32 = 24;

/// Where a video is drawn on screen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
  pub rotation: f32,
  pub scale_x: f32,
  pub scale_y: f32,
}

impl DisplayRect {
  /// Integer pixel size of the rect, clamped to the minimum target size.
  pub fn pixel_size(&self) -> (u32, u32) {
    (clamp_dimension(self.width), clamp_dimension(self.height))
  }
}

impl From<&WidgetTransform> for DisplayRect {
  fn from(transform: &WidgetTransform) -> Self {
    Self {
      x: transform.position.x,
      y: transform.position.y,
      width: transform.size.x,
      height: transform.size.y,
      rotation: transform.rotation.z,
      scale_x: transform.scale.x,
      scale_y: transform.scale.y,
    }
  }
}

fn clamp_dimension(value: f32) -> u32 {
  if value.is_finite() && value > MIN_RENDER_TARGET_DIMENSION as f32 {
    value.round() as u32
  } else {
    MIN_RENDER_TARGET_DIMENSION
  }
}

/// An off-screen surface a player decodes into.
pub struct RenderTarget {
  width: u32,
  height: u32,
  depth_bits: u32,
  handle: NativeHandle,
}

impl RenderTarget {
  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn depth_bits(&self) -> u32 {
    self.depth_bits
  }

  pub fn handle_id(&self) -> u64 {
    self.handle.id()
  }

  pub fn is_released(&self) -> bool {
    self.handle.is_released()
  }
}

impl Asset for RenderTarget {
  fn release(&self) {
    self.handle.release();
  }
}

impl fmt::Debug for RenderTarget {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "RenderTarget({}x{}, depth {}, {:?})",
      self.width, self.height, self.depth_bits, self.handle
    )
  }
}

/// One render target per player. A player that is re-targeted releases its
/// previous surface before the new one is created.
pub struct RenderTargetPool {
  ledger: Arc<HandleLedger>,
  targets: HashMap<PlayerId, Arc<RenderTarget>>,
}

impl RenderTargetPool {
  pub fn new(ledger: Arc<HandleLedger>) -> Self {
    Self {
      ledger,
      targets: HashMap::default(),
    }
  }

  pub fn allocate(&mut self, player: PlayerId, width: u32, height: u32) -> Arc<RenderTarget> {
    self.release(player);

    let target = Arc::new(RenderTarget {
      width: width.max(MIN_RENDER_TARGET_DIMENSION),
      height: height.max(MIN_RENDER_TARGET_DIMENSION),
      depth_bits: RENDER_TARGET_DEPTH_BITS,
      handle: self.ledger.allocate(),
    });
    tracing::debug!(%player, width = target.width, height = target.height, "render target allocated");
    self.targets.insert(player, Arc::clone(&target));
    target
  }

  /// Releases the target of `player`, if it has one.
  pub fn release(&mut self, player: PlayerId) -> bool {
    match self.targets.remove(&player) {
      Some(target) => {
        target.release();
        true
      }
      None => false,
    }
  }

  pub fn release_all(&mut self) -> usize {
    let count = self.targets.len();
    for (_, target) in self.targets.drain() {
      target.release();
    }
    count
  }

  pub fn target(&self, player: PlayerId) -> Option<Arc<RenderTarget>> {
    self.targets.get(&player).cloned()
  }

  pub fn len(&self) -> usize {
    self.targets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.targets.is_empty()
  }
}

impl Drop for RenderTargetPool {
  fn drop(&mut self) {
    self.release_all();
  }
}

impl fmt::Debug for RenderTargetPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RenderTargetPool").field("targets", &self.targets.len()).finish()
  }
}
