use std::{
  io::{self, Write},
  process::{Child, ChildStderr, ChildStdin, ChildStdout, ExitStatus},
};

use crate::{error::Result, iter::FfmpegIterator};

/// A wrapper around [`std::process::Child`] containing a spawned FFmpeg
/// command. Provides parsed log events and piped output frames through
/// [`iter`](Self::iter).
///
/// The process is killed when dropped without having been waited on.
pub struct FfmpegChild {
  inner: Child,
  reaped: bool,
}

impl FfmpegChild {
  pub(crate) fn from_inner(inner: Child) -> Self {
    Self {
      inner,
      reaped: false,
    }
  }

  /// Creates an iterator over parsed events from stderr and, once the
  /// output streams are known, raw frames from stdout.
  ///
  /// Takes ownership of stderr and stdout.
  pub fn iter(&mut self) -> Result<FfmpegIterator> {
    FfmpegIterator::new(self).map_err(Into::into)
  }

  pub fn take_stdout(&mut self) -> Option<ChildStdout> {
    self.inner.stdout.take()
  }

  pub fn take_stderr(&mut self) -> Option<ChildStderr> {
    self.inner.stderr.take()
  }

  pub fn take_stdin(&mut self) -> Option<ChildStdin> {
    self.inner.stdin.take()
  }

  /// Send `q` on stdin, which makes FFmpeg stop reading input and finalize
  /// its outputs. Has no effect if stdin was already taken.
  pub fn quit(&mut self) -> io::Result<()> {
    if let Some(stdin) = self.inner.stdin.as_mut() {
      stdin.write_all(b"q")?;
      stdin.flush()?;
    }
    Ok(())
  }

  /// Close stdin, which FFmpeg treats as the end of a piped input.
  pub fn close_stdin(&mut self) {
    self.inner.stdin.take();
  }

  pub fn kill(&mut self) -> io::Result<()> {
    self.inner.kill()
  }

  pub fn wait(&mut self) -> io::Result<ExitStatus> {
    let status = self.inner.wait()?;
    self.reaped = true;
    Ok(status)
  }

  /// Non-blocking check for exit.
  pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
    let status = self.inner.try_wait()?;
    if status.is_some() {
      self.reaped = true;
    }
    Ok(status)
  }
}

impl Drop for FfmpegChild {
  fn drop(&mut self) {
    if !self.reaped {
      self.inner.kill().ok();
      self.inner.wait().ok();
    }
  }
}
