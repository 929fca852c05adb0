use std::io;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
  #[error("failed to open serial device {port}: {source}")]
  Open {
    port: String,
    #[source]
    source: io::Error,
  },
  #[error("failed to spawn reader thread for {port}: {source}")]
  Spawn {
    port: String,
    #[source]
    source: io::Error,
  },
  #[error("serial bridge {port} is not connected")]
  NotConnected { port: String },
  #[error("failed to write to {port}: {source}")]
  Write {
    port: String,
    #[source]
    source: io::Error,
  },
}
