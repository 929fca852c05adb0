//! The declarative settings document that drives the kiosk front-end.
//!
//! Parsing is lenient. Only an unreadable file or a document that is not
//! JSON at all is an error; a malformed section or list entry falls back to
//! its default and is reported with a warning.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Resident clip count used when the document does not set one.
pub const DEFAULT_AUDIO_CACHE_CAPACITY: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
  #[error("could not read settings file {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("settings document is not valid JSON: {0}")]
  Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec2 {
  pub x: f32,
  pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec3 {
  pub x: f32,
  pub y: f32,
  pub z: f32,
}

impl Vec3 {
  pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };
}

/// Placement of one on-screen widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WidgetTransform {
  pub name: String,
  pub position: Vec2,
  pub size: Vec2,
  pub rotation: Vec3,
  pub scale: Vec3,
}

impl Default for WidgetTransform {
  fn default() -> Self {
    Self {
      name: String::new(),
      position: Vec2::default(),
      size: Vec2::default(),
      rotation: Vec3::default(),
      scale: Vec3::ONE,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SerialSetting {
  pub port_name: String,
  pub baud_rate: u32,
  pub auto_connect: bool,
}

impl Default for SerialSetting {
  fn default() -> Self {
    Self {
      port_name: "COM3".to_string(),
      baud_rate: 9600,
      auto_connect: true,
    }
  }
}

/// The hidden multi-tap close button.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloseSetting {
  pub position: Vec2,
  pub num_to_close: u32,
  pub reset_click_time: f32,
  pub image_alpha: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SoundSetting {
  pub key: String,
  pub clip_path: String,
  pub volume: f32,
}

impl Default for SoundSetting {
  fn default() -> Self {
    Self {
      key: String::new(),
      clip_path: String::new(),
      volume: 1.0,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoSetting {
  #[serde(flatten)]
  pub transform: WidgetTransform,
  pub file_name: String,
  pub volume: f32,
}

/// Font slot name (`font1`..`fontN`) to asset address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FontMap(BTreeMap<String, String>);

impl FontMap {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, slot: impl Into<String>, address: impl Into<String>) {
    self.0.insert(slot.into(), address.into());
  }

  pub fn address(&self, slot: &str) -> Option<&str> {
    self.0.get(slot).map(String::as_str)
  }

  pub fn contains(&self, slot: &str) -> bool {
    self.0.contains_key(slot)
  }

  pub fn slots(&self) -> impl Iterator<Item = &str> {
    self.0.keys().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
    self.0.iter().map(|(slot, address)| (slot.as_str(), address.as_str()))
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl<S: Into<String>, A: Into<String>> FromIterator<(S, A)> for FontMap {
  fn from_iter<I: IntoIterator<Item = (S, A)>>(iter: I) -> Self {
    let mut map = FontMap::new();
    for (slot, address) in iter {
      map.insert(slot, address);
    }
    map
  }
}

impl<'de> Deserialize<'de> for FontMap {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut map = FontMap::new();
    for (slot, value) in raw {
      match value {
        Value::String(address) if !address.trim().is_empty() => map.insert(slot, address),
        // An unset slot is simply not configured.
        Value::Null => {}
        Value::String(_) => tracing::warn!(%slot, "font slot has an empty address, ignoring"),
        other => tracing::warn!(%slot, value = %other, "font address is not a string, ignoring"),
      }
    }
    Ok(map)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
  #[serde(deserialize_with = "lenient")]
  pub inactivity_time: f32,
  #[serde(deserialize_with = "lenient")]
  pub fade_time: f32,
  #[serde(deserialize_with = "lenient")]
  pub serial: SerialSetting,
  #[serde(deserialize_with = "lenient")]
  pub close_setting: CloseSetting,
  #[serde(deserialize_with = "lenient")]
  pub font_map: FontMap,
  #[serde(deserialize_with = "lenient_sounds")]
  pub sounds: Vec<SoundSetting>,
  #[serde(deserialize_with = "lenient_videos")]
  pub videos: Vec<VideoSetting>,
  #[serde(deserialize_with = "lenient_capacity")]
  pub audio_cache_capacity: usize,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      inactivity_time: 0.0,
      fade_time: 0.0,
      serial: SerialSetting::default(),
      close_setting: CloseSetting::default(),
      font_map: FontMap::default(),
      sounds: Vec::new(),
      videos: Vec::new(),
      audio_cache_capacity: DEFAULT_AUDIO_CACHE_CAPACITY,
    }
  }
}

impl Settings {
  pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
    Ok(serde_json::from_str(json)?)
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| SettingsError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_json_str(&json)
  }

  /// Loads the document, falling back to defaults if it cannot be read.
  pub fn load_or_default(path: impl AsRef<Path>) -> Self {
    match Self::load(path) {
      Ok(settings) => settings,
      Err(error) => {
        tracing::warn!(%error, "using default settings");
        Self::default()
      }
    }
  }

  /// Sound settings by key. The first entry for a key wins.
  pub fn sound(&self, key: &str) -> Option<&SoundSetting> {
    self.sounds.iter().find(|s| s.key == key)
  }

  pub fn video(&self, name: &str) -> Option<&VideoSetting> {
    self.videos.iter().find(|v| v.transform.name == name)
  }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned + Default,
{
  let value = Value::deserialize(deserializer)?;
  if value.is_null() {
    return Ok(T::default());
  }
  Ok(serde_json::from_value(value).unwrap_or_else(|error| {
    tracing::warn!(%error, "malformed settings section, using defaults");
    T::default()
  }))
}

fn lenient_capacity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
  let value = Value::deserialize(deserializer)?;
  match value.as_u64() {
    Some(capacity) if capacity > 0 => Ok(capacity as usize),
    _ => {
      if !value.is_null() {
        tracing::warn!(value = %value, "invalid audioCacheCapacity, using default");
      }
      Ok(DEFAULT_AUDIO_CACHE_CAPACITY)
    }
  }
}

fn lenient_list<T: DeserializeOwned>(value: Value, what: &'static str) -> Vec<T> {
  let entries = match value {
    Value::Array(entries) => entries,
    Value::Null => return Vec::new(),
    other => {
      tracing::warn!(section = what, value = %other, "expected a list, ignoring");
      return Vec::new();
    }
  };

  entries
    .into_iter()
    .enumerate()
    .filter_map(|(index, entry)| match serde_json::from_value(entry) {
      Ok(parsed) => Some(parsed),
      Err(error) => {
        tracing::warn!(section = what, index, %error, "skipping malformed entry");
        None
      }
    })
    .collect()
}

fn lenient_sounds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<SoundSetting>, D::Error> {
  let parsed: Vec<SoundSetting> = lenient_list(Value::deserialize(deserializer)?, "sounds");
  let mut sounds: Vec<SoundSetting> = Vec::with_capacity(parsed.len());
  for sound in parsed {
    if sound.key.is_empty() || sound.clip_path.is_empty() {
      tracing::warn!(key = %sound.key, "sound entry needs both key and clipPath, skipping");
    } else if sounds.iter().any(|s| s.key == sound.key) {
      tracing::warn!(key = %sound.key, "duplicate sound key, keeping the first entry");
    } else {
      sounds.push(sound);
    }
  }
  Ok(sounds)
}

fn lenient_videos<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<VideoSetting>, D::Error> {
  Ok(lenient_list(Value::deserialize(deserializer)?, "videos"))
}
