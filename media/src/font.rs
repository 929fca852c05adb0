//! Fonts: a small, fixed set of configured slots, loaded once and never
//! evicted. Labels that ask before a slot is ready wait for it.

use crate::settings::FontMap;
use crate::store::{io_error, AssetStore};

use kiosk_cache::{
  Acquire, Asset, AssetError, AssetKey, BuildError, CacheBuilder, ConsumerId, Fetch, HandleLedger, LoadState,
  MetricsSnapshot, NativeHandle, ResourceCache, Waiter,
};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extensions tried, in order, for an address that has none.
pub const FONT_EXTENSIONS: [&str; 5] = ["ttf", "otf", "ttc", "woff", "woff2"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFormat {
  TrueType,
  OpenType,
  Collection,
  Woff,
  Woff2,
}

impl FontFormat {
  /// Identifies a font file by its leading signature.
  pub fn sniff(bytes: &[u8]) -> Option<Self> {
    match bytes.get(..4)? {
      [0x00, 0x01, 0x00, 0x00] | b"true" => Some(FontFormat::TrueType),
      b"OTTO" => Some(FontFormat::OpenType),
      b"ttcf" => Some(FontFormat::Collection),
      b"wOFF" => Some(FontFormat::Woff),
      b"wOF2" => Some(FontFormat::Woff2),
      _ => None,
    }
  }
}

/// A loaded font file.
pub struct FontFace {
  address: String,
  path: PathBuf,
  format: FontFormat,
  data: Arc<[u8]>,
  handle: NativeHandle,
}

impl FontFace {
  /// Reads and validates the font at `address` under `store`.
  pub fn load(store: &AssetStore, address: &str, ledger: &Arc<HandleLedger>) -> Result<Self, AssetError> {
    let path = locate(store, address)?;
    let data = fs::read(&path).map_err(|e| io_error(&path, e))?;
    let format = FontFormat::sniff(&data)
      .ok_or_else(|| AssetError::decode_failed(format!("{} is not a font file", path.display())))?;

    Ok(Self {
      address: address.to_string(),
      path,
      format,
      data: data.into(),
      handle: ledger.allocate(),
    })
  }

  pub fn address(&self) -> &str {
    &self.address
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn format(&self) -> FontFormat {
    self.format
  }

  pub fn bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn handle_id(&self) -> u64 {
    self.handle.id()
  }

  pub fn is_released(&self) -> bool {
    self.handle.is_released()
  }
}

impl Asset for FontFace {
  fn release(&self) {
    self.handle.release();
  }
}

impl fmt::Debug for FontFace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FontFace")
      .field("address", &self.address)
      .field("format", &self.format)
      .field("len", &self.data.len())
      .field("handle", &self.handle)
      .finish()
  }
}

fn locate(store: &AssetStore, address: &str) -> Result<PathBuf, AssetError> {
  let base = store.resolve(address)?;
  if base.extension().is_some() {
    return Ok(base);
  }
  FONT_EXTENSIONS
    .iter()
    .map(|ext| base.with_extension(ext))
    .find(|candidate| candidate.is_file())
    .ok_or_else(|| AssetError::not_found(format!("no font file for `{}`", address)))
}

/// A label (or anything else) that displays a font.
pub trait FontConsumer: Send + Sync + 'static {
  fn consumer_id(&self) -> ConsumerId;

  /// Called once with the loaded font, on the thread that ticks the cache.
  fn apply_font(&self, slot: &AssetKey, font: Arc<FontFace>);
}

/// What `FontResourceCache::assign` did with a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontAssignment {
  /// The font was ready and has been applied.
  Applied,
  /// The label will get the font when its load completes.
  Waiting,
  /// The label was already waiting on this slot.
  AlreadyWaiting,
  /// The slot is not configured. Nothing was queued.
  Rejected,
  /// The slot failed to load. The label keeps its current font.
  Failed(AssetError),
}

pub struct FontResourceCache {
  cache: ResourceCache<FontFace>,
  font_map: FontMap,
}

impl FontResourceCache {
  /// Loads fonts from `store` on background threads.
  pub fn new(store: AssetStore, font_map: FontMap, ledger: Arc<HandleLedger>) -> Result<Self, BuildError> {
    let addresses = font_map.clone();
    let loader = move |slot: &AssetKey| match addresses.address(slot.as_str()) {
      Some(address) => FontFace::load(&store, address, &ledger),
      None => Err(AssetError::invalid_request(format!("font slot `{}` is not configured", slot))),
    };
    let cache = CacheBuilder::new("fonts").unbounded().loader(loader).build()?;
    Ok(Self { cache, font_map })
  }

  /// Uses a custom fetch strategy, e.g. an engine-provided asynchronous loader.
  pub fn with_fetcher<F>(font_map: FontMap, fetcher: F) -> Result<Self, BuildError>
  where
    F: Fetch<FontFace>,
  {
    let cache = CacheBuilder::new("fonts").unbounded().fetcher(fetcher).build()?;
    Ok(Self { cache, font_map })
  }

  /// Gives `label` the font of `slot`, now or once it has loaded.
  pub fn assign<L: FontConsumer>(&mut self, slot: &str, label: Arc<L>) -> FontAssignment {
    let consumer = label.consumer_id();
    if !self.font_map.contains(slot) {
      tracing::warn!(%slot, %consumer, "font slot is not configured, label not queued");
      return FontAssignment::Rejected;
    }

    let waiter = Waiter::<FontFace>::new(consumer, move |key: &AssetKey, resolution| match resolution {
      Ok(font) => label.apply_font(key, font),
      Err(error) => tracing::warn!(slot = %key, %consumer, %error, "font unavailable, label left unchanged"),
    });

    match self.cache.acquire(&AssetKey::from(slot), waiter) {
      Acquire::Delivered => FontAssignment::Applied,
      Acquire::Waiting => FontAssignment::Waiting,
      Acquire::Duplicate => FontAssignment::AlreadyWaiting,
      Acquire::Failed(error) => FontAssignment::Failed(error),
    }
  }

  /// Starts loading every configured slot. Returns how many loads started.
  pub fn preload(&mut self) -> usize {
    let slots: Vec<AssetKey> = self.font_map.slots().map(AssetKey::from).collect();
    slots.iter().filter(|slot| self.cache.begin_load(slot)).count()
  }

  /// Applies finished loads and hands fonts to waiting labels.
  pub fn tick(&mut self) -> usize {
    self.cache.tick()
  }

  pub fn is_configured(&self, slot: &str) -> bool {
    self.font_map.contains(slot)
  }

  pub fn font_map(&self) -> &FontMap {
    &self.font_map
  }

  pub fn state(&self, slot: &str) -> LoadState {
    self.cache.state(&AssetKey::from(slot))
  }

  pub fn font(&self, slot: &str) -> Option<Arc<FontFace>> {
    self.cache.peek(&AssetKey::from(slot))
  }

  /// Labels still waiting on `slot`.
  pub fn pending_count(&self, slot: &str) -> usize {
    self.cache.waiter_count(&AssetKey::from(slot))
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.cache.metrics()
  }

  pub fn release_all(&mut self) -> usize {
    self.cache.release_all()
  }
}

impl fmt::Debug for FontResourceCache {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("FontResourceCache")
      .field("slots", &self.font_map.len())
      .field("cache", &self.cache)
      .finish()
  }
}
