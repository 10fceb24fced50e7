use std::{
  io::{self, IsTerminal, Write},
  sync::atomic::{AtomicBool, Ordering},
  time::Duration,
};

use crossterm::{
  event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
  terminal::{disable_raw_mode, enable_raw_mode},
};

use crate::error::Result;

use super::{KeyPress, KeySource};

static RAW_MODE: AtomicBool = AtomicBool::new(false);

/// Whether a [`TerminalKeys`] currently holds the terminal in raw mode.
pub fn raw_mode_enabled() -> bool {
  RAW_MODE.load(Ordering::Relaxed)
}

/// Single key presses from the controlling terminal.
///
/// The terminal is switched to raw mode while this value lives so keys
/// arrive without waiting for Enter. When stdin is not a terminal no keys
/// are ever reported.
pub struct TerminalKeys {
  raw: bool,
}

impl TerminalKeys {
  pub fn new() -> Result<Self> {
    if !io::stdin().is_terminal() {
      tracing::debug!("stdin is not a terminal, key presses are not read");
      return Ok(Self { raw: false });
    }
    enable_raw_mode()?;
    RAW_MODE.store(true, Ordering::Relaxed);
    Ok(Self { raw: true })
  }
}

impl KeySource for TerminalKeys {
  fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyPress>> {
    if !self.raw {
      return Ok(None);
    }
    while event::poll(timeout)? {
      let Event::Key(key) = event::read()? else {
        continue;
      };
      if key.kind == KeyEventKind::Release {
        continue;
      }
      return Ok(match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
          Some(KeyPress::Interrupt)
        }
        KeyCode::Char(c) => Some(KeyPress::Char(c)),
        _ => None,
      });
    }
    Ok(None)
  }
}

impl Drop for TerminalKeys {
  fn drop(&mut self) {
    if self.raw {
      disable_raw_mode().ok();
      RAW_MODE.store(false, Ordering::Relaxed);
    }
  }
}

/// Stderr for log output. Raw mode stops `\n` from returning the cursor to
/// the first column, so line ends become `\r\n` while it is on.
///
/// `tracing_subscriber::fmt().with_writer(TerminalStderr::new)`
pub struct TerminalStderr(io::Stderr);

impl TerminalStderr {
  pub fn new() -> Self {
    Self(io::stderr())
  }
}

impl Default for TerminalStderr {
  fn default() -> Self {
    Self::new()
  }
}

impl Write for TerminalStderr {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    write_lines(&mut self.0.lock(), buf, raw_mode_enabled())?;
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    self.0.flush()
  }
}

fn write_lines<W: Write>(out: &mut W, buf: &[u8], crlf: bool) -> io::Result<()> {
  if !crlf {
    return out.write_all(buf);
  }
  for chunk in buf.split_inclusive(|&b| b == b'\n') {
    match chunk.strip_suffix(b"\n") {
      Some(line) => {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        out.write_all(line)?;
        out.write_all(b"\r\n")?;
      }
      None => out.write_all(chunk)?,
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn written(buf: &[u8], crlf: bool) -> Vec<u8> {
    let mut out = Vec::new();
    write_lines(&mut out, buf, crlf).unwrap();
    out
  }

  #[test]
  fn test_line_ends_in_raw_mode() {
    assert_eq!(
      written(b"WARN ffmpeg: late frame\nERROR ffmpeg: gone\n", true),
      b"WARN ffmpeg: late frame\r\nERROR ffmpeg: gone\r\n"
    );
    assert_eq!(written(b"already\r\npartial", true), b"already\r\npartial");
  }

  #[test]
  fn test_line_ends_untouched_outside_raw_mode() {
    assert_eq!(written(b"a\nb\n", false), b"a\nb\n");
  }
}
