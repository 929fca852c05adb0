//! Audio: an LRU-bounded clip cache shared by a looping background slot and
//! fire-and-forget effects.
//!
//! Playback requests for clips that are not resident yet are queued and
//! started from `tick`, once the decode has finished.

pub mod clip;

pub use clip::AudioClip;

use crate::settings::{Settings, SoundSetting};
use crate::store::AssetStore;

use kiosk_cache::{
  AssetError, AssetKey, BuildError, CacheBuilder, Fetch, HandleLedger, LoadState, Lookup, MetricsSnapshot,
  ResourceCache,
};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use ahash::HashMap;

/// Shortest fade; shorter or non-positive durations are clamped to this.
pub const MIN_FADE: Duration = Duration::from_millis(10);

/// The device-side half of playback.
pub trait AudioOutput: Send {
  /// Starts `clip` looping on the background slot, replacing whatever played.
  fn play_background(&mut self, clip: Arc<AudioClip>, volume: f32);
  fn set_background_volume(&mut self, volume: f32);
  fn background_volume(&self) -> f32;
  fn stop_background(&mut self);
  fn is_background_playing(&self) -> bool;
  /// Plays `clip` once, overlapping anything already playing.
  fn play_effect(&mut self, clip: Arc<AudioClip>, volume: f32);
  fn stop_effects(&mut self);
}

/// An `AudioOutput` that only tracks state. Useful headless and in tests.
#[derive(Debug, Default)]
pub struct SilentOutput {
  background: Option<Arc<AudioClip>>,
  background_volume: f32,
  playing: bool,
  background_starts: usize,
  effects: Vec<(Arc<AudioClip>, f32)>,
}

impl SilentOutput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn background(&self) -> Option<&Arc<AudioClip>> {
    self.background.as_ref()
  }

  /// How many times background playback was (re)started.
  pub fn background_starts(&self) -> usize {
    self.background_starts
  }

  /// Every effect played so far, with its volume.
  pub fn effects(&self) -> &[(Arc<AudioClip>, f32)] {
    &self.effects
  }
}

impl AudioOutput for SilentOutput {
  fn play_background(&mut self, clip: Arc<AudioClip>, volume: f32) {
    self.background = Some(clip);
    self.background_volume = volume;
    self.playing = true;
    self.background_starts += 1;
  }

  fn set_background_volume(&mut self, volume: f32) {
    self.background_volume = volume;
  }

  fn background_volume(&self) -> f32 {
    self.background_volume
  }

  fn stop_background(&mut self) {
    self.playing = false;
  }

  fn is_background_playing(&self) -> bool {
    self.playing
  }

  fn play_effect(&mut self, clip: Arc<AudioClip>, volume: f32) {
    self.effects.push((clip, volume));
  }

  fn stop_effects(&mut self) {
    self.effects.clear();
  }
}

/// What happened to a play request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayRequest {
  /// Playback started right away.
  Started,
  /// The clip was already the playing background track; only its volume
  /// was restored.
  Restored,
  /// The clip is loading; playback starts on the tick that finishes it.
  Queued,
}

#[derive(Debug, Clone, Copy)]
struct Fade {
  start_volume: f32,
  elapsed: Duration,
  duration: Duration,
}

pub struct AudioResourceCache<O: AudioOutput> {
  cache: ResourceCache<AudioClip>,
  sounds: HashMap<String, SoundSetting>,
  output: O,
  active_background: Option<Arc<AudioClip>>,
  queued_background: Option<AssetKey>,
  queued_effects: Vec<AssetKey>,
  fade: Option<Fade>,
}

impl<O: AudioOutput> AudioResourceCache<O> {
  /// Decodes clips from `store` on background threads, keeping at most
  /// `capacity` of them resident.
  pub fn new(
    store: AssetStore,
    sounds: &[SoundSetting],
    capacity: usize,
    ledger: Arc<HandleLedger>,
    output: O,
  ) -> Result<Self, BuildError> {
    let paths: HashMap<String, String> = sounds
      .iter()
      .map(|s| (s.key.clone(), s.clip_path.clone()))
      .collect();
    let loader = move |key: &AssetKey| {
      let clip_path = paths
        .get(key.as_str())
        .ok_or_else(|| AssetError::invalid_request(format!("unknown sound key `{}`", key)))?;
      let path = store.resolve(clip_path)?;
      AudioClip::decode(&path, &ledger)
    };
    let cache = CacheBuilder::new("audio").capacity(capacity).loader(loader).build()?;
    Ok(Self::from_cache(cache, sounds, output))
  }

  pub fn from_settings(
    store: AssetStore,
    settings: &Settings,
    ledger: Arc<HandleLedger>,
    output: O,
  ) -> Result<Self, BuildError> {
    Self::new(store, &settings.sounds, settings.audio_cache_capacity, ledger, output)
  }

  /// Uses a custom fetch strategy for clips.
  pub fn with_fetcher<F>(sounds: &[SoundSetting], capacity: usize, fetcher: F, output: O) -> Result<Self, BuildError>
  where
    F: Fetch<AudioClip>,
  {
    let cache = CacheBuilder::new("audio").capacity(capacity).fetcher(fetcher).build()?;
    Ok(Self::from_cache(cache, sounds, output))
  }

  fn from_cache(cache: ResourceCache<AudioClip>, sounds: &[SoundSetting], output: O) -> Self {
    let mut by_key = HashMap::default();
    for sound in sounds {
      by_key.entry(sound.key.clone()).or_insert_with(|| sound.clone());
    }
    Self {
      cache,
      sounds: by_key,
      output,
      active_background: None,
      queued_background: None,
      queued_effects: Vec::new(),
      fade: None,
    }
  }

  /// Plays `key` as the looping background track.
  ///
  /// Any fade-out in progress is cancelled. If `key` is already playing, only
  /// its configured volume is restored.
  pub fn play_background(&mut self, key: &str) -> Result<PlayRequest, AssetError> {
    let key = self.configured(key)?;
    self.fade = None;
    self.queued_background = None;

    match self.cache.request(&key) {
      Lookup::Ready(clip) => Ok(self.start_background(&key, clip)),
      Lookup::Pending => {
        self.queued_background = Some(key);
        Ok(PlayRequest::Queued)
      }
      Lookup::Failed(error) => {
        tracing::debug!(%key, %error, "retrying failed background clip");
        self.cache.begin_load(&key);
        self.queued_background = Some(key);
        Ok(PlayRequest::Queued)
      }
    }
  }

  /// Plays `key` once. Concurrent plays of the same clip overlap.
  pub fn play_effect(&mut self, key: &str) -> Result<PlayRequest, AssetError> {
    let key = self.configured(key)?;

    match self.cache.request(&key) {
      Lookup::Ready(clip) => {
        let volume = self.volume_of(&key);
        self.output.play_effect(clip, volume);
        Ok(PlayRequest::Started)
      }
      Lookup::Pending => {
        self.queued_effects.push(key);
        Ok(PlayRequest::Queued)
      }
      Lookup::Failed(error) => {
        tracing::debug!(%key, %error, "retrying failed effect clip");
        self.cache.begin_load(&key);
        self.queued_effects.push(key);
        Ok(PlayRequest::Queued)
      }
    }
  }

  /// Stops the background track, cancelling any fade and any queued request.
  pub fn stop_background(&mut self) {
    self.fade = None;
    self.queued_background = None;
    self.output.stop_background();
  }

  pub fn stop_effects(&mut self) {
    self.queued_effects.clear();
    self.output.stop_effects();
  }

  /// Ramps the background volume linearly to zero over `duration`, then stops
  /// it. A fade already running restarts from the current volume.
  ///
  /// Returns `false` if nothing is playing.
  pub fn fade_out_background(&mut self, duration: Duration) -> bool {
    if !self.output.is_background_playing() {
      return false;
    }
    self.fade = Some(Fade {
      start_volume: self.output.background_volume(),
      elapsed: Duration::ZERO,
      duration: duration.max(MIN_FADE),
    });
    true
  }

  /// Applies finished decodes, starts queued playback and advances the fade
  /// by `delta`.
  pub fn tick(&mut self, delta: Duration) -> usize {
    let processed = self.cache.tick();
    self.resolve_queued_background();
    self.resolve_queued_effects();
    self.advance_fade(delta);
    processed
  }

  /// Releases every resident clip. Playback stops because the buffers go away.
  pub fn clear_cache(&mut self) -> usize {
    self.stop_background();
    self.stop_effects();
    self.active_background = None;
    let released = self.cache.release_all();
    tracing::info!(released, "audio cache cleared");
    released
  }

  pub fn is_configured(&self, key: &str) -> bool {
    self.sounds.contains_key(key)
  }

  pub fn state(&self, key: &str) -> LoadState {
    self.cache.state(&AssetKey::from(key))
  }

  pub fn ready_len(&self) -> usize {
    self.cache.ready_len()
  }

  pub fn capacity(&self) -> Option<usize> {
    self.cache.capacity()
  }

  pub fn is_fading(&self) -> bool {
    self.fade.is_some()
  }

  pub fn queued_background(&self) -> Option<&str> {
    self.queued_background.as_ref().map(AssetKey::as_str)
  }

  pub fn queued_effects(&self) -> usize {
    self.queued_effects.len()
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.cache.metrics()
  }

  pub fn output(&self) -> &O {
    &self.output
  }

  pub fn output_mut(&mut self) -> &mut O {
    &mut self.output
  }

  fn configured(&self, key: &str) -> Result<AssetKey, AssetError> {
    if self.sounds.contains_key(key) {
      Ok(AssetKey::from(key))
    } else {
      tracing::warn!(%key, "unknown sound key");
      Err(AssetError::invalid_request(format!("unknown sound key `{}`", key)))
    }
  }

  fn volume_of(&self, key: &AssetKey) -> f32 {
    self.sounds.get(key.as_str()).map_or(1.0, |s| s.volume)
  }

  fn start_background(&mut self, key: &AssetKey, clip: Arc<AudioClip>) -> PlayRequest {
    let volume = self.volume_of(key);
    let same_clip = self
      .active_background
      .as_ref()
      .map_or(false, |active| Arc::ptr_eq(active, &clip));

    if same_clip && self.output.is_background_playing() {
      self.output.set_background_volume(volume);
      return PlayRequest::Restored;
    }

    tracing::info!(%key, volume, "starting background track");
    self.output.play_background(Arc::clone(&clip), volume);
    self.active_background = Some(clip);
    PlayRequest::Started
  }

  fn resolve_queued_background(&mut self) {
    let Some(key) = self.queued_background.take() else {
      return;
    };
    match self.cache.state(&key) {
      LoadState::Loading => self.queued_background = Some(key),
      LoadState::Ready => {
        if let Lookup::Ready(clip) = self.cache.request(&key) {
          self.start_background(&key, clip);
        }
      }
      LoadState::Failed => {
        let error = self.cache.error(&key);
        tracing::error!(%key, error = ?error, "background track failed to load");
      }
      // Evicted before it could start; load it again.
      LoadState::Absent => {
        self.cache.begin_load(&key);
        self.queued_background = Some(key);
      }
    }
  }

  fn resolve_queued_effects(&mut self) {
    let queued = std::mem::take(&mut self.queued_effects);
    for key in queued {
      match self.cache.state(&key) {
        LoadState::Loading => self.queued_effects.push(key),
        LoadState::Ready => {
          if let Lookup::Ready(clip) = self.cache.request(&key) {
            let volume = self.volume_of(&key);
            self.output.play_effect(clip, volume);
          }
        }
        LoadState::Failed => {
          let error = self.cache.error(&key);
          tracing::warn!(%key, error = ?error, "effect clip failed to load");
        }
        LoadState::Absent => {
          self.cache.begin_load(&key);
          self.queued_effects.push(key);
        }
      }
    }
  }

  fn advance_fade(&mut self, delta: Duration) {
    let Some(mut fade) = self.fade.take() else {
      return;
    };
    fade.elapsed += delta;
    if fade.elapsed >= fade.duration {
      self.output.set_background_volume(0.0);
      self.output.stop_background();
      return;
    }
    let t = fade.elapsed.as_secs_f32() / fade.duration.as_secs_f32();
    self.output.set_background_volume(fade.start_volume * (1.0 - t));
    self.fade = Some(fade);
  }
}

impl<O: AudioOutput + fmt::Debug> fmt::Debug for AudioResourceCache<O> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AudioResourceCache")
      .field("sounds", &self.sounds.len())
      .field("cache", &self.cache)
      .field("output", &self.output)
      .field("queued_background", &self.queued_background)
      .field("queued_effects", &self.queued_effects.len())
      .field("fading", &self.fade.is_some())
      .finish()
  }
}
