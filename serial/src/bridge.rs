use crate::error::BridgeError;
use crate::line::{BufLineSource, LineSink, LineSource};

use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, BufReader};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use fibre::mpsc;
use fibre::TrySendError;
use parking_lot::Mutex;

/// Lines buffered between the reader thread and the main tick.
pub const LINE_QUEUE_CAPACITY: usize = 256;

/// How long `disconnect` waits for the reader thread to finish.
pub const JOIN_TIMEOUT: Duration = Duration::from_millis(600);

type Subscriber = Box<dyn FnMut(&str) + Send>;

/// State shared with the reader thread.
#[derive(Debug, Default)]
struct Flags {
  connected: AtomicBool,
  stop: AtomicBool,
  dropped: AtomicU64,
}

/// What a read error means for the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadErrorClass {
  /// No data yet; read again.
  Transient,
  /// The device is gone.
  Fatal,
  /// Logged, then reading continues.
  Other,
}

fn classify(error: &io::Error) -> ReadErrorClass {
  match error.kind() {
    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => ReadErrorClass::Transient,
    io::ErrorKind::BrokenPipe
    | io::ErrorKind::NotConnected
    | io::ErrorKind::ConnectionAborted
    | io::ErrorKind::ConnectionReset
    | io::ErrorKind::UnexpectedEof => ReadErrorClass::Fatal,
    _ => ReadErrorClass::Other,
  }
}

/// A line-oriented link to an external device.
///
/// A background thread reads lines into a bounded queue; `tick` drains it on
/// the caller's thread and hands each line to the subscribers in arrival
/// order. Subscribers never run on the reader thread.
pub struct SerialBridge {
  port: String,
  receiver: mpsc::BoundedReceiver<String>,
  sink: Mutex<Box<dyn LineSink>>,
  flags: Arc<Flags>,
  reader: Option<JoinHandle<()>>,
  subscribers: Vec<Subscriber>,
}

impl SerialBridge {
  /// Starts reading `source` on a background thread named after `port`.
  pub fn connect<S, W>(port: impl Into<String>, source: S, sink: W) -> Result<Self, BridgeError>
  where
    S: LineSource,
    W: LineSink + 'static,
  {
    let port = port.into();
    let (sender, receiver) = mpsc::bounded(LINE_QUEUE_CAPACITY);
    let flags = Arc::new(Flags::default());
    flags.connected.store(true, Ordering::Release);

    let reader_flags = Arc::clone(&flags);
    let reader_port = port.clone();
    let reader = thread::Builder::new()
      .name(format!("serial-read:{}", port))
      .spawn(move || read_loop(&reader_port, source, sender, &reader_flags))
      .map_err(|source| BridgeError::Spawn {
        port: port.clone(),
        source,
      })?;

    tracing::info!(%port, "serial bridge connected");
    Ok(Self {
      port,
      receiver,
      sink: Mutex::new(Box::new(sink)),
      flags,
      reader: Some(reader),
      subscribers: Vec::new(),
    })
  }

  /// Opens a serial device node for reading and writing.
  ///
  /// Line settings such as the baud rate are left as the OS has them.
  pub fn open_device(port: &str) -> Result<Self, BridgeError> {
    let open_error = |source: io::Error| BridgeError::Open {
      port: port.to_string(),
      source,
    };
    let device = OpenOptions::new().read(true).write(true).open(port).map_err(open_error)?;
    let reader = device.try_clone().map_err(open_error)?;
    Self::connect(port, BufLineSource::new(BufReader::new(reader)), device)
  }

  pub fn port(&self) -> &str {
    &self.port
  }

  pub fn is_connected(&self) -> bool {
    self.flags.connected.load(Ordering::Acquire)
  }

  /// Lines discarded because the queue was full.
  pub fn dropped_lines(&self) -> u64 {
    self.flags.dropped.load(Ordering::Relaxed)
  }

  /// Registers a handler for every received line.
  pub fn subscribe<F>(&mut self, handler: F)
  where
    F: FnMut(&str) + Send + 'static,
  {
    self.subscribers.push(Box::new(handler));
  }

  /// Writes `line` followed by a newline.
  pub fn send(&self, line: &str) -> Result<(), BridgeError> {
    if !self.is_connected() {
      return Err(BridgeError::NotConnected {
        port: self.port.clone(),
      });
    }
    self.sink.lock().write_line(line).map_err(|source| {
      tracing::warn!(port = %self.port, error = %source, "serial write failed");
      BridgeError::Write {
        port: self.port.clone(),
        source,
      }
    })
  }

  /// Dispatches every queued line. Returns how many were dispatched.
  pub fn tick(&mut self) -> usize {
    let mut dispatched = 0;
    while let Ok(line) = self.receiver.try_recv() {
      for subscriber in self.subscribers.iter_mut() {
        subscriber(&line);
      }
      dispatched += 1;
    }
    dispatched
  }

  /// Stops the reader and waits briefly for it to exit.
  ///
  /// A reader stuck in a blocking read is detached; it exits on its next
  /// read once it sees the stop flag.
  pub fn disconnect(&mut self) {
    self.flags.stop.store(true, Ordering::Release);
    self.flags.connected.store(false, Ordering::Release);

    let Some(reader) = self.reader.take() else {
      return;
    };
    let deadline = Instant::now() + JOIN_TIMEOUT;
    while !reader.is_finished() && Instant::now() < deadline {
      thread::sleep(Duration::from_millis(5));
    }
    if reader.is_finished() {
      if reader.join().is_err() {
        tracing::error!(port = %self.port, "serial reader thread panicked");
      }
      tracing::info!(port = %self.port, "serial bridge disconnected");
    } else {
      tracing::warn!(port = %self.port, "serial reader did not stop in time, detaching");
    }
  }
}

impl Drop for SerialBridge {
  fn drop(&mut self) {
    if self.reader.is_some() {
      self.disconnect();
    }
  }
}

impl fmt::Debug for SerialBridge {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SerialBridge")
      .field("port", &self.port)
      .field("connected", &self.is_connected())
      .field("subscribers", &self.subscribers.len())
      .field("dropped_lines", &self.dropped_lines())
      .finish()
  }
}

fn read_loop<S: LineSource>(port: &str, mut source: S, sender: mpsc::BoundedSender<String>, flags: &Flags) {
  while !flags.stop.load(Ordering::Acquire) {
    match source.read_line() {
      Ok(Some(line)) => {
        if line.trim().is_empty() {
          continue;
        }
        match sender.try_send(line) {
          Ok(()) => {}
          Err(TrySendError::Full(line)) => {
            flags.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(%port, %line, "serial queue full, dropping line");
          }
          // The bridge is gone.
          Err(TrySendError::Closed(_) | TrySendError::Sent(_)) => break,
        }
      }
      Ok(None) => {
        tracing::info!(%port, "serial stream ended");
        break;
      }
      Err(error) => match classify(&error) {
        ReadErrorClass::Transient => thread::yield_now(),
        ReadErrorClass::Fatal => {
          tracing::warn!(%port, %error, "serial device lost");
          break;
        }
        ReadErrorClass::Other => {
          tracing::error!(%port, %error, "serial read failed");
          thread::sleep(Duration::from_millis(10));
        }
      },
    }
  }
  flags.connected.store(false, Ordering::Release);
}
