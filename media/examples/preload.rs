// examples/preload.rs
//
// Usage: cargo run -p kiosk_media --example preload -- <streaming-assets dir>

use kiosk_cache::HandleLedger;
use kiosk_media::{AssetStore, AudioResourceCache, FontResourceCache, SilentOutput};

use std::env;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

fn main() {
  let config_path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/examples/kiosk_logging.yaml"));
  let _guards = fibre_logging::init::init_from_file(config_path).expect("Failed to initialize logging");

  let root = env::args().nth(1).unwrap_or_else(|| "StreamingAssets".to_string());
  let store = AssetStore::new(&root);
  let settings = store.load_settings();
  let ledger = HandleLedger::new();

  let mut fonts =
    FontResourceCache::new(store.clone(), settings.font_map.clone(), ledger.clone()).expect("font cache");
  let mut audio = AudioResourceCache::from_settings(store.clone(), &settings, ledger.clone(), SilentOutput::new())
    .expect("audio cache");

  println!("Preloading {} font slot(s) from {}", fonts.preload(), root);
  if let Some(first) = settings.sounds.first() {
    println!("Queueing background track `{}`: {:?}", first.key, audio.play_background(&first.key));
  }

  // A stand-in for the engine's frame loop.
  let frame = Duration::from_millis(16);
  let deadline = Instant::now() + Duration::from_secs(5);
  while Instant::now() < deadline {
    fonts.tick();
    audio.tick(frame);
    let font_stats = fonts.metrics();
    let fonts_settled = font_stats.loads_started == font_stats.loads_completed + font_stats.loads_failed;
    if fonts_settled && audio.queued_background().is_none() {
      break;
    }
    thread::sleep(frame);
  }

  for slot in settings.font_map.slots() {
    println!("{:<8} {:?}", slot, fonts.state(slot));
  }
  println!("Fonts: {:?}", fonts.metrics());
  println!("Audio: {:?}", audio.metrics());

  audio.clear_cache();
  fonts.release_all();
  println!("Live native handles after teardown: {}", ledger.live());
}
