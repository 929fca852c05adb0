//! A line-oriented bridge to an external serial device.
//!
//! Reading happens on a dedicated thread; received lines are queued and only
//! dispatched to subscribers from `SerialBridge::tick`, so handlers run on the
//! same thread as the rest of the front-end.

pub mod bridge;
pub mod error;
pub mod line;

pub use bridge::{SerialBridge, JOIN_TIMEOUT, LINE_QUEUE_CAPACITY};
pub use error::BridgeError;
pub use line::{BufLineSource, LineSink, LineSource};
