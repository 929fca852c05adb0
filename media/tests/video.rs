mod common;

use common::*;

use kiosk_cache::{ErrorKind, HandleLedger};
use kiosk_media::settings::{Vec2, VideoSetting, WidgetTransform};
use kiosk_media::video::{resolve_playable_path, Platform, PrepareStatus, VideoPresenter, RENDER_TARGET_DEPTH_BITS};

use std::sync::Arc;
use std::time::{Duration, Instant};

fn setting(file_name: &str, width: f32, height: f32) -> VideoSetting {
  VideoSetting {
    transform: WidgetTransform {
      name: "intro".to_string(),
      size: Vec2 { x: width, y: height },
      ..Default::default()
    },
    file_name: file_name.to_string(),
    volume: 0.7,
  }
}

fn presenter(fixture: &Fixture, ledger: &Arc<HandleLedger>) -> VideoPresenter {
  VideoPresenter::new(fixture.store.clone(), Arc::clone(ledger)).with_platform(Platform::Linux)
}

#[test]
fn test_prepared_stream_starts_playing() {
  let fixture = Fixture::new();
  let ledger = HandleLedger::new();
  let mut presenter = presenter(&fixture, &ledger);
  let mut player = FakePlayer::new(1);
  let mut surface = FakeSurface::default();
  let t0 = Instant::now();

  let mut session = presenter
    .present(&setting("Videos/intro.webm", 1280.0, 720.0), &mut player, Some(&mut surface), t0)
    .unwrap();

  // 1. Target wired to both sides; source and audio routed; prepare started.
  let target = player.target.clone().unwrap();
  assert_eq!((target.width(), target.height()), (1280, 720));
  assert_eq!(target.depth_bits(), RENDER_TARGET_DEPTH_BITS);
  assert_eq!(surface.shown.len(), 1);
  assert_eq!(surface.shown[0].0, target.handle_id());
  assert!(player.source().unwrap().ends_with("Videos/intro.webm"));
  assert_eq!(player.volume, Some(0.7));
  assert_eq!(player.prepare_calls, 1);
  assert!(session.is_subscribed());

  // 2. Not prepared yet.
  assert_eq!(session.poll(&mut player, t0 + Duration::from_secs(1)), PrepareStatus::Preparing);
  assert!(!player.playing);

  // 3. Prepared: play, and the error subscription is gone.
  player.prepared = true;
  assert_eq!(session.poll(&mut player, t0 + Duration::from_secs(2)), PrepareStatus::Playing);
  assert!(player.playing);
  assert!(player.handlers.is_empty());
  assert_eq!(player.unsubscribed.len(), 1);
  assert!(!session.is_subscribed());

  // 4. Terminal status is sticky and does not unsubscribe twice.
  assert_eq!(session.poll(&mut player, t0 + Duration::from_secs(3)), PrepareStatus::Playing);
  assert_eq!(player.unsubscribed.len(), 1);
}

#[test]
fn test_prepare_times_out_after_thirty_seconds() {
  let fixture = Fixture::new();
  let ledger = HandleLedger::new();
  let mut presenter = presenter(&fixture, &ledger);
  let mut player = FakePlayer::new(2);
  let mut surface = FakeSurface::default();
  let t0 = Instant::now();

  let mut session = presenter
    .present(&setting("Videos/slow.mp4", 640.0, 360.0), &mut player, Some(&mut surface), t0)
    .unwrap();

  assert_eq!(
    session.poll(&mut player, t0 + Duration::from_millis(29_999)),
    PrepareStatus::Preparing
  );
  match session.poll(&mut player, t0 + Duration::from_secs(30)) {
    PrepareStatus::Failed(error) => assert_eq!(error.kind(), ErrorKind::Timeout),
    other => panic!("expected timeout, got {:?}", other),
  }
  assert!(!player.playing);
  assert!(player.handlers.is_empty());
  assert_eq!(player.unsubscribed.len(), 1);
}

#[test]
fn test_error_event_wins_over_prepared() {
  let fixture = Fixture::new();
  let ledger = HandleLedger::new();
  let mut presenter = presenter(&fixture, &ledger);
  let mut player = FakePlayer::new(3);
  let mut surface = FakeSurface::default();
  let t0 = Instant::now();

  let mut session = presenter
    .present(&setting("Videos/broken.mp4", 320.0, 240.0), &mut player, Some(&mut surface), t0)
    .unwrap();

  player.raise_error("codec not supported");
  player.prepared = true;

  match session.poll(&mut player, t0) {
    PrepareStatus::Failed(error) => {
      assert_eq!(error.kind(), ErrorKind::DecodeFailed);
      assert!(error.message().contains("codec not supported"));
    }
    other => panic!("expected error, got {:?}", other),
  }
  assert!(!player.playing);
  assert!(player.handlers.is_empty());
}

#[test]
fn test_cancel_unsubscribes() {
  let fixture = Fixture::new();
  let ledger = HandleLedger::new();
  let mut presenter = presenter(&fixture, &ledger);
  let mut player = FakePlayer::new(4);
  let mut surface = FakeSurface::default();

  let mut session = presenter
    .present(&setting("Videos/a.mp4", 320.0, 240.0), &mut player, Some(&mut surface), Instant::now())
    .unwrap();
  session.cancel(&mut player);

  assert!(session.status().is_terminal());
  assert!(player.handlers.is_empty());
  session.cancel(&mut player);
  assert_eq!(player.unsubscribed.len(), 1);
}

#[test]
fn test_reconfiguring_releases_previous_target() {
  let fixture = Fixture::new();
  let ledger = HandleLedger::new();
  let mut presenter = presenter(&fixture, &ledger);
  let mut player = FakePlayer::new(5);
  let mut surface = FakeSurface::default();
  let t0 = Instant::now();

  let _first_session = presenter
    .present(&setting("Videos/a.mp4", 800.0, 600.0), &mut player, Some(&mut surface), t0)
    .unwrap();
  let first = player.target.clone().unwrap();

  // 1. Same widget again with a degenerate size: old target released, new one clamped.
  let _second_session = presenter
    .present(&setting("Videos/a.mp4", 0.0, 1.0), &mut player, Some(&mut surface), t0)
    .unwrap();
  let second = player.target.clone().unwrap();
  assert!(first.is_released());
  assert!(!second.is_released());
  assert_eq!((second.width(), second.height()), (2, 2));
  assert_eq!(presenter.render_targets().len(), 1);
  assert_eq!(ledger.live(), 1);

  // 2. Teardown releases the rest.
  assert_eq!(presenter.release_all(), 1);
  assert_eq!(ledger.live(), 0);
  assert_eq!(ledger.double_releases(), 0);
}

#[test]
fn test_representing_drops_previous_error_subscription() {
  let fixture = Fixture::new();
  let ledger = HandleLedger::new();
  let mut presenter = presenter(&fixture, &ledger);
  let mut player = FakePlayer::new(9);
  let mut surface = FakeSurface::default();
  let t0 = Instant::now();

  let mut first = presenter
    .present(&setting("Videos/a.mp4", 640.0, 360.0), &mut player, Some(&mut surface), t0)
    .unwrap();

  // 1. Settings applied again before the first prepare finished.
  let mut second = presenter
    .present(&setting("Videos/b.mp4", 640.0, 360.0), &mut player, Some(&mut surface), t0)
    .unwrap();
  assert_eq!(player.handlers.len(), 1);
  assert_eq!(player.unsubscribed.len(), 1);
  assert!(!first.is_subscribed());
  assert!(second.is_subscribed());

  // 2. The second session plays and leaves no handler behind.
  player.prepared = true;
  assert_eq!(second.poll(&mut player, t0 + Duration::from_secs(1)), PrepareStatus::Playing);
  assert!(player.handlers.is_empty());
  assert_eq!(player.unsubscribed.len(), 2);

  // 3. The superseded session fails without touching the player again.
  player.playing = false;
  match first.poll(&mut player, t0 + Duration::from_secs(1)) {
    PrepareStatus::Failed(error) => assert_eq!(error.kind(), ErrorKind::InvalidRequest),
    other => panic!("expected superseded failure, got {:?}", other),
  }
  assert!(!player.playing);
  assert_eq!(player.unsubscribed.len(), 2);
}

#[test]
fn test_invalid_input_allocates_nothing() {
  let fixture = Fixture::new();
  let ledger = HandleLedger::new();
  let mut presenter = presenter(&fixture, &ledger);
  let mut player = FakePlayer::new(6);
  let mut surface = FakeSurface::default();
  let t0 = Instant::now();

  let no_surface = presenter.present(&setting("Videos/a.mp4", 10.0, 10.0), &mut player, None, t0);
  assert_eq!(no_surface.unwrap_err().kind(), ErrorKind::InvalidRequest);

  let no_file = presenter.present(&setting("  ", 10.0, 10.0), &mut player, Some(&mut surface), t0);
  assert_eq!(no_file.unwrap_err().kind(), ErrorKind::InvalidRequest);

  let escaping = presenter.present(&setting("../outside.mp4", 10.0, 10.0), &mut player, Some(&mut surface), t0);
  assert_eq!(escaping.unwrap_err().kind(), ErrorKind::InvalidRequest);

  assert_eq!(ledger.allocated(), 0);
  assert!(player.target.is_none());
  assert!(player.handlers.is_empty());
  assert_eq!(player.prepare_calls, 0);
  assert!(surface.shown.is_empty());
}

#[test]
fn test_webm_falls_back_to_mp4_on_windows() {
  let fixture = Fixture::new();
  fixture.write("Videos/loop.webm", b"webm");

  // 1. No mp4 sibling: the webm path is kept everywhere.
  let path = resolve_playable_path(&fixture.store, "Videos/loop.webm", Platform::Windows).unwrap();
  assert!(path.ends_with("Videos/loop.webm"));

  // 2. With a sibling, only Windows switches.
  fixture.write("Videos/loop.mp4", b"mp4");
  let path = resolve_playable_path(&fixture.store, "Videos/loop.webm", Platform::Windows).unwrap();
  assert!(path.ends_with("Videos/loop.mp4"));
  let path = resolve_playable_path(&fixture.store, "Videos/loop.webm", Platform::MacOs).unwrap();
  assert!(path.ends_with("Videos/loop.webm"));
}
