#![allow(dead_code)]

use kiosk_serial::{LineSource, SerialBridge};

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// One scripted read result.
pub enum Step {
  Line(&'static str),
  Fail(io::ErrorKind),
  End,
}

/// A device that replays a script, then idles with read timeouts.
pub struct ScriptedSource {
  steps: VecDeque<Step>,
  dropped: Arc<AtomicBool>,
}

impl ScriptedSource {
  pub fn new(steps: Vec<Step>) -> (Self, Arc<AtomicBool>) {
    let dropped = Arc::new(AtomicBool::new(false));
    let source = Self {
      steps: steps.into(),
      dropped: Arc::clone(&dropped),
    };
    (source, dropped)
  }
}

impl LineSource for ScriptedSource {
  fn read_line(&mut self) -> io::Result<Option<String>> {
    match self.steps.pop_front() {
      Some(Step::Line(line)) => Ok(Some(line.to_string())),
      Some(Step::Fail(kind)) => Err(io::Error::from(kind)),
      Some(Step::End) => Ok(None),
      None => {
        thread::sleep(Duration::from_millis(2));
        Err(io::Error::from(io::ErrorKind::TimedOut))
      }
    }
  }
}

impl Drop for ScriptedSource {
  fn drop(&mut self) {
    self.dropped.store(true, Ordering::SeqCst);
  }
}

/// A sink whose bytes stay readable after the bridge takes ownership.
#[derive(Clone, Default)]
pub struct SharedSink(pub Arc<Mutex<Vec<u8>>>);

impl SharedSink {
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.0.lock()).into_owned()
  }
}

impl Write for SharedSink {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

pub type Received = Arc<Mutex<Vec<String>>>;

pub fn connect(steps: Vec<Step>) -> (SerialBridge, Received, SharedSink, Arc<AtomicBool>) {
  let (source, dropped) = ScriptedSource::new(steps);
  let sink = SharedSink::default();
  let mut bridge = SerialBridge::connect("COM3", source, sink.clone()).unwrap();
  let received: Received = Arc::default();
  let log = Arc::clone(&received);
  bridge.subscribe(move |line: &str| log.lock().push(line.to_string()));
  (bridge, received, sink, dropped)
}

/// Ticks `bridge` until `done` holds, failing after five seconds.
pub fn tick_until(bridge: &mut SerialBridge, mut done: impl FnMut(&SerialBridge) -> bool) {
  let deadline = Instant::now() + Duration::from_secs(5);
  loop {
    bridge.tick();
    if done(bridge) {
      return;
    }
    assert!(Instant::now() < deadline, "condition not reached within 5s");
    thread::sleep(Duration::from_millis(2));
  }
}
