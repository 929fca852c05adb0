#![allow(dead_code)]

use kiosk_cache::{AssetKey, ConsumerId};
use kiosk_media::font::{FontConsumer, FontFace};
use kiosk_media::video::{DisplayRect, DisplaySurface, ErrorHandler, PlayerId, RenderTarget, SubscriptionId, VideoPlayer};
use kiosk_media::AssetStore;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tempfile::TempDir;

/// A minimal TrueType header; enough for signature sniffing.
pub const TTF_BYTES: &[u8] = &[0x00, 0x01, 0x00, 0x00, 0x00, 0x0a, 0x00, 0x80, 0x00, 0x03, 0x00, 0x20];
pub const OTF_BYTES: &[u8] = b"OTTO\x00\x0a\x00\x80\x00\x03\x00\x20";

/// An asset store rooted in a temporary directory.
pub struct Fixture {
  pub dir: TempDir,
  pub store: AssetStore,
}

impl Fixture {
  pub fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    let store = AssetStore::new(dir.path());
    Self { dir, store }
  }

  pub fn path(&self, relative: &str) -> PathBuf {
    self.dir.path().join(relative)
  }

  pub fn write(&self, relative: &str, bytes: &[u8]) -> PathBuf {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
  }

  /// Writes a mono 16-bit WAV of `frames` samples of a quiet ramp.
  pub fn write_wav(&self, relative: &str, sample_rate: u32, frames: u32) -> PathBuf {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    let spec = hound::WavSpec {
      channels: 1,
      sample_rate,
      bits_per_sample: 16,
      sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..frames {
      writer.write_sample(((i % 200) as i16 - 100) * 50).unwrap();
    }
    writer.finalize().unwrap();
    path
  }
}

/// Steps `target` until `done` holds, failing after five seconds.
pub fn tick_until<C>(target: &mut C, mut step: impl FnMut(&mut C), mut done: impl FnMut(&C) -> bool) {
  let deadline = Instant::now() + Duration::from_secs(5);
  loop {
    step(target);
    if done(target) {
      return;
    }
    assert!(Instant::now() < deadline, "condition not reached within 5s");
    std::thread::sleep(Duration::from_millis(5));
  }
}

/// A label that records every font it is given.
pub struct FakeLabel {
  id: ConsumerId,
  pub applied: Mutex<Vec<(String, String)>>,
}

impl FakeLabel {
  pub fn new(id: u64) -> Arc<Self> {
    Arc::new(Self {
      id: ConsumerId::new(id),
      applied: Mutex::new(Vec::new()),
    })
  }

  /// `(slot, font address)` pairs, in order.
  pub fn fonts(&self) -> Vec<(String, String)> {
    self.applied.lock().clone()
  }
}

impl FontConsumer for FakeLabel {
  fn consumer_id(&self) -> ConsumerId {
    self.id
  }

  fn apply_font(&self, slot: &AssetKey, font: Arc<FontFace>) {
    self.applied.lock().push((slot.to_string(), font.address().to_string()));
  }
}

/// A scripted video player.
#[derive(Default)]
pub struct FakePlayer {
  pub id: u64,
  pub source: Option<PathBuf>,
  pub volume: Option<f32>,
  pub target: Option<Arc<RenderTarget>>,
  pub prepared: bool,
  pub prepare_calls: usize,
  pub playing: bool,
  pub handlers: Vec<(SubscriptionId, ErrorHandler)>,
  pub next_subscription: u64,
  pub unsubscribed: Vec<SubscriptionId>,
}

impl FakePlayer {
  pub fn new(id: u64) -> Self {
    Self {
      id,
      ..Default::default()
    }
  }

  /// Fires an error event at every subscriber.
  pub fn raise_error(&mut self, message: &str) {
    for (_, handler) in self.handlers.iter_mut() {
      handler(message);
    }
  }

  pub fn source(&self) -> Option<&Path> {
    self.source.as_deref()
  }
}

impl VideoPlayer for FakePlayer {
  fn id(&self) -> PlayerId {
    PlayerId::new(self.id)
  }

  fn set_render_target(&mut self, target: Arc<RenderTarget>) {
    self.target = Some(target);
  }

  fn set_source(&mut self, path: &Path) {
    self.source = Some(path.to_path_buf());
  }

  fn route_audio(&mut self, volume: f32) {
    self.volume = Some(volume);
  }

  fn subscribe_errors(&mut self, handler: ErrorHandler) -> SubscriptionId {
    self.next_subscription += 1;
    let id = SubscriptionId::new(self.next_subscription);
    self.handlers.push((id, handler));
    id
  }

  fn unsubscribe_errors(&mut self, subscription: SubscriptionId) {
    self.handlers.retain(|(id, _)| *id != subscription);
    self.unsubscribed.push(subscription);
  }

  fn prepare(&mut self) {
    self.prepare_calls += 1;
  }

  fn is_prepared(&self) -> bool {
    self.prepared
  }

  fn play(&mut self) {
    self.playing = true;
  }
}

/// A display node that remembers what it was last shown.
#[derive(Default)]
pub struct FakeSurface {
  pub shown: Vec<(u64, DisplayRect)>,
}

impl DisplaySurface for FakeSurface {
  fn show(&mut self, target: Arc<RenderTarget>, rect: DisplayRect) {
    self.shown.push((target.handle_id(), rect));
  }
}
