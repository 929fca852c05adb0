use crate::settings::Settings;

use kiosk_cache::AssetError;

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Name of the settings document under the store root.
pub const SETTINGS_FILE_NAME: &str = "Settings.json";

/// Local asset files addressed relative to one streaming-assets root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetStore {
  root: PathBuf,
}

impl AssetStore {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Joins `relative` onto the root. Backslashes are treated as separators.
  ///
  /// Empty, absolute and parent-escaping addresses are `InvalidRequest`.
  pub fn resolve(&self, relative: &str) -> Result<PathBuf, AssetError> {
    let normalized = relative.trim().replace('\\', "/");
    if normalized.is_empty() {
      return Err(AssetError::invalid_request("empty asset address"));
    }

    let mut path = self.root.clone();
    for component in Path::new(&normalized).components() {
      match component {
        Component::Normal(part) => path.push(part),
        Component::CurDir => {}
        Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
          return Err(AssetError::invalid_request(format!(
            "asset address `{}` escapes the asset root",
            relative
          )));
        }
      }
    }
    Ok(path)
  }

  pub fn exists(&self, relative: &str) -> bool {
    self.resolve(relative).map_or(false, |path| path.is_file())
  }

  pub fn read(&self, relative: &str) -> Result<Vec<u8>, AssetError> {
    let path = self.resolve(relative)?;
    fs::read(&path).map_err(|e| io_error(&path, e))
  }

  pub fn settings_path(&self) -> PathBuf {
    self.root.join(SETTINGS_FILE_NAME)
  }

  /// Loads `Settings.json` from the root, or defaults if it is unusable.
  pub fn load_settings(&self) -> Settings {
    Settings::load_or_default(self.settings_path())
  }
}

/// Maps an I/O failure on `path` onto the asset error taxonomy.
pub(crate) fn io_error(path: &Path, error: io::Error) -> AssetError {
  let message = format!("{}: {}", path.display(), error);
  match error.kind() {
    io::ErrorKind::NotFound => AssetError::not_found(message).with_cause(error),
    io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => {
      AssetError::transient(message).with_cause(error)
    }
    _ => AssetError::decode_failed(message).with_cause(error),
  }
}
