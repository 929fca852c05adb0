use std::io::{self, BufRead, Write};

/// A blocking source of text lines, read on the bridge's reader thread.
pub trait LineSource: Send + 'static {
  /// Reads the next line without its terminator. `Ok(None)` is end of stream.
  ///
  /// Implementations with a read timeout report it as `TimedOut` or
  /// `WouldBlock`; the bridge treats those as "no data yet".
  fn read_line(&mut self) -> io::Result<Option<String>>;
}

/// Splits any `BufRead` into lines. A partial line interrupted by a timeout
/// is kept and completed by the next read.
pub struct BufLineSource<R> {
  reader: R,
  pending: String,
}

impl<R: BufRead + Send + 'static> BufLineSource<R> {
  pub fn new(reader: R) -> Self {
    Self {
      reader,
      pending: String::new(),
    }
  }

  pub fn into_inner(self) -> R {
    self.reader
  }
}

impl<R: BufRead + Send + 'static> LineSource for BufLineSource<R> {
  fn read_line(&mut self) -> io::Result<Option<String>> {
    let read = self.reader.read_line(&mut self.pending)?;
    if read == 0 && self.pending.is_empty() {
      return Ok(None);
    }
    let mut line = std::mem::take(&mut self.pending);
    while line.ends_with('\n') || line.ends_with('\r') {
      line.pop();
    }
    Ok(Some(line))
  }
}

/// Where outgoing lines are written.
pub trait LineSink: Send {
  fn write_line(&mut self, line: &str) -> io::Result<()>;
}

impl<W: Write + Send> LineSink for W {
  fn write_line(&mut self, line: &str) -> io::Result<()> {
    self.write_all(line.as_bytes())?;
    self.write_all(b"\n")?;
    self.flush()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Cursor;

  #[test]
  fn lines_are_split_and_trimmed() {
    let mut source = BufLineSource::new(Cursor::new("hello\r\n\nworld"));
    assert_eq!(source.read_line().unwrap().as_deref(), Some("hello"));
    assert_eq!(source.read_line().unwrap().as_deref(), Some(""));
    assert_eq!(source.read_line().unwrap().as_deref(), Some("world"));
    assert_eq!(source.read_line().unwrap(), None);
  }

  #[test]
  fn sink_appends_newline() {
    let mut out = Vec::new();
    out.write_line("LED:ON").unwrap();
    assert_eq!(out, b"LED:ON\n");
  }
}
