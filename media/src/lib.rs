//! Font, audio and video resource caches for the kiosk front-end, built on
//! `kiosk_cache`.
//!
//! Every cache here is driven from one main tick: loads run elsewhere, but
//! labels, players and playback state only change inside `tick`.

pub mod audio;
pub mod font;
pub mod settings;
pub mod store;
pub mod video;

pub use audio::{AudioClip, AudioOutput, AudioResourceCache, PlayRequest, SilentOutput};
pub use font::{FontAssignment, FontConsumer, FontFace, FontFormat, FontResourceCache};
pub use settings::{
  CloseSetting, FontMap, SerialSetting, Settings, SettingsError, SoundSetting, VideoSetting, WidgetTransform,
};
pub use store::{AssetStore, SETTINGS_FILE_NAME};
pub use video::{
  DisplayRect, DisplaySurface, Platform, PlayerId, PrepareStatus, RenderTarget, RenderTargetPool, VideoPlayer,
  VideoPrepareSession, VideoPresenter,
};
