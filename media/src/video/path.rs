use crate::store::AssetStore;

use kiosk_cache::AssetError;

use std::path::PathBuf;

/// The host platform, as far as video playback cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
  Windows,
  MacOs,
  Linux,
  Other,
}

impl Platform {
  pub fn current() -> Self {
    if cfg!(target_os = "windows") {
      Platform::Windows
    } else if cfg!(target_os = "macos") {
      Platform::MacOs
    } else if cfg!(target_os = "linux") {
      Platform::Linux
    } else {
      Platform::Other
    }
  }
}

/// Resolves a configured video file name to a path the platform can play.
///
/// Windows players cannot decode WebM, so a `.webm` source is swapped for an
/// `.mp4` sibling when one exists. Otherwise the original path is used.
pub fn resolve_playable_path(store: &AssetStore, file_name: &str, platform: Platform) -> Result<PathBuf, AssetError> {
  let path = store.resolve(file_name)?;

  let is_webm = path
    .extension()
    .and_then(|ext| ext.to_str())
    .map_or(false, |ext| ext.eq_ignore_ascii_case("webm"));
  if platform == Platform::Windows && is_webm {
    let mp4 = path.with_extension("mp4");
    if mp4.is_file() {
      tracing::debug!(from = %path.display(), to = %mp4.display(), "using mp4 fallback for webm source");
      return Ok(mp4);
    }
  }
  Ok(path)
}
