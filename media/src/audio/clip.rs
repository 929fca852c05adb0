use crate::store::io_error;

use kiosk_cache::{Asset, AssetError, HandleLedger, NativeHandle};

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use symphonia::core::{
  audio::SampleBuffer,
  codecs::{DecoderOptions, CODEC_TYPE_NULL},
  errors::Error as SymphoniaError,
  formats::FormatOptions,
  io::MediaSourceStream,
  meta::MetadataOptions,
  probe::Hint,
};

/// A fully decoded clip, interleaved `f32` samples.
///
/// The sample buffer is dropped when the clip is released, even if players
/// still hold the `Arc`.
pub struct AudioClip {
  path: PathBuf,
  channels: u16,
  sample_rate: u32,
  frames: usize,
  samples: RwLock<Option<Arc<[f32]>>>,
  handle: NativeHandle,
}

impl AudioClip {
  /// Decodes the file at `path`, streaming it from disk.
  pub fn decode(path: &Path, ledger: &Arc<HandleLedger>) -> Result<Self, AssetError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
      hint.with_extension(ext);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = symphonia::default::get_probe()
      .format(&hint, mss, &fmt_opts, &meta_opts)
      .map_err(|e| decode_error(path, "unsupported container", e))?;
    let mut format = probed.format;

    let track = format
      .tracks()
      .iter()
      .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
      .ok_or_else(|| AssetError::decode_failed(format!("{}: no audio track", path.display())))?;
    let track_id = track.id;

    let dec_opts: DecoderOptions = Default::default();
    let mut decoder = symphonia::default::get_codecs()
      .make(&track.codec_params, &dec_opts)
      .map_err(|e| decode_error(path, "unsupported codec", e))?;

    let mut samples = Vec::<f32>::new();
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);
    let mut sample_rate = track.codec_params.sample_rate;

    loop {
      let packet = match format.next_packet() {
        Ok(packet) => packet,
        // End of stream.
        Err(SymphoniaError::IoError(_)) => break,
        Err(e) => return Err(decode_error(path, "unreadable packet stream", e)),
      };
      if packet.track_id() != track_id {
        continue;
      }

      match decoder.decode(&packet) {
        Ok(decoded) => {
          let spec = *decoded.spec();
          channels.get_or_insert(spec.channels.count() as u16);
          sample_rate.get_or_insert(spec.rate);

          let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
          buffer.copy_interleaved_ref(decoded);
          samples.extend_from_slice(buffer.samples());
        }
        Err(SymphoniaError::DecodeError(e)) => {
          tracing::debug!(path = %path.display(), error = %e, "skipping corrupt packet");
        }
        Err(e) => return Err(decode_error(path, "decoder failed", e)),
      }
    }

    let (Some(channels), Some(sample_rate)) = (channels, sample_rate) else {
      return Err(AssetError::decode_failed(format!(
        "{}: unknown channel layout or sample rate",
        path.display()
      )));
    };
    if samples.is_empty() || channels == 0 {
      return Err(AssetError::decode_failed(format!("{}: no audio samples", path.display())));
    }

    Ok(Self {
      path: path.to_path_buf(),
      channels,
      sample_rate,
      frames: samples.len() / channels as usize,
      samples: RwLock::new(Some(samples.into())),
      handle: ledger.allocate(),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn channels(&self) -> u16 {
    self.channels
  }

  pub fn sample_rate(&self) -> u32 {
    self.sample_rate
  }

  /// Sample frames (one sample per channel).
  pub fn frames(&self) -> usize {
    self.frames
  }

  pub fn duration(&self) -> Duration {
    Duration::from_secs_f64(self.frames as f64 / self.sample_rate as f64)
  }

  /// The decoded samples, or `None` once the clip has been released.
  pub fn samples(&self) -> Option<Arc<[f32]>> {
    self.samples.read().clone()
  }

  pub fn is_released(&self) -> bool {
    self.handle.is_released()
  }
}

impl Asset for AudioClip {
  fn release(&self) {
    self.samples.write().take();
    self.handle.release();
  }
}

impl fmt::Debug for AudioClip {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AudioClip")
      .field("path", &self.path)
      .field("channels", &self.channels)
      .field("sample_rate", &self.sample_rate)
      .field("frames", &self.frames)
      .field("released", &self.is_released())
      .finish()
  }
}

fn decode_error(path: &Path, what: &str, error: SymphoniaError) -> AssetError {
  AssetError::decode_failed(format!("{}: {}", path.display(), what)).with_cause(error)
}
