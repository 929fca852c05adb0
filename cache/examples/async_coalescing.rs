use kiosk_cache::{Asset, AssetError, AssetKey, CacheBuilder, ConsumerId, HandleLedger, NativeHandle, Waiter};
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use tokio::time::{sleep, Duration};

// A decoded image standing in for any native-backed asset.
struct Texture {
  name: String,
  handle: NativeHandle,
}

impl Asset for Texture {
  fn release(&self) {
    self.handle.release();
  }
}

// A simulated slow decode.
async fn decode_texture(key: AssetKey, ledger: Arc<HandleLedger>, load_count: Arc<AtomicUsize>) -> Texture {
  println!("--- Decoder: loading '{}'...", key);
  load_count.fetch_add(1, Ordering::SeqCst);
  sleep(Duration::from_millis(300)).await;
  Texture {
    name: format!("texture:{}", key),
    handle: ledger.allocate(),
  }
}

#[tokio::main]
async fn main() {
  let ledger = HandleLedger::new();
  let load_counter = Arc::new(AtomicUsize::new(0));

  let mut cache = CacheBuilder::new("textures")
    .capacity(8)
    .async_loader({
      let ledger = ledger.clone();
      let counter = load_counter.clone();
      move |key: AssetKey| {
        let fut = decode_texture(key, ledger.clone(), counter.clone());
        async move { Ok::<_, AssetError>(fut.await) }
      }
    })
    .build()
    .expect("Failed to build cache");

  println!("--- Coalescing Demonstration ---");
  println!("Five panels ask for 'logo' before it is loaded.\n");

  let delivered = Arc::new(AtomicUsize::new(0));
  for panel in 1..=5u64 {
    let delivered = delivered.clone();
    let waiter = Waiter::<Texture>::new(ConsumerId::new(panel), move |key: &AssetKey, resolution| {
      let texture: Arc<Texture> = resolution.expect("load failed");
      println!("[Panel {}] got {} for '{}'", panel, texture.name, key);
      delivered.fetch_add(1, Ordering::SeqCst);
    });
    println!("[Panel {}] {:?}", panel, cache.acquire(&AssetKey::from("logo"), waiter));
  }

  // The frame loop: completions are applied only here.
  while delivered.load(Ordering::SeqCst) < 5 {
    cache.tick();
    sleep(Duration::from_millis(16)).await;
  }

  println!("\n--- Verification ---");
  println!("Decoder ran {} time(s).", load_counter.load(Ordering::SeqCst));
  assert_eq!(load_counter.load(Ordering::SeqCst), 1);
  println!("{:#?}", cache.metrics());

  cache.release_all();
  println!("Live native handles after teardown: {}", ledger.live());
  assert_eq!(ledger.live(), 0);
}
