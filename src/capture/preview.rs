use std::{
  ffi::{OsStr, OsString},
  io::{self, Write},
  process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
  error::{Error, Result},
  frame::Frame,
};

use super::FrameDisplay;

/// A live window showing frames, rendered by `ffplay` from raw RGB24 piped
/// to its stdin.
///
/// ffplay quits on its own `q`/Esc keys or when the window is closed; that
/// shows up here as [`is_open`](FrameDisplay::is_open) turning false.
pub struct PreviewWindow {
  child: Child,
  stdin: Option<ChildStdin>,
  width: u32,
  height: u32,
  closed: bool,
}

impl PreviewWindow {
  pub fn open<S: AsRef<OsStr>>(
    ffplay: S,
    title: &str,
    width: u32,
    height: u32,
    fps: f64,
  ) -> Result<Self> {
    let program = ffplay.as_ref().to_string_lossy().into_owned();
    let mut child = Command::new(ffplay.as_ref())
      .args(Self::args(title, width, height, fps))
      .stdin(Stdio::piped())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .spawn()
      .map_err(|e| Error::spawn(&program, e))?;
    let stdin = child.stdin.take().ok_or("ffplay stdin is not piped")?;

    tracing::debug!(title, width, height, "preview window opened");
    Ok(Self {
      child,
      stdin: Some(stdin),
      width,
      height,
      closed: false,
    })
  }

  fn args(title: &str, width: u32, height: u32, fps: f64) -> Vec<OsString> {
    let size = format!("{width}x{height}");
    let fps = fps.to_string();
    [
      "-hide_banner",
      "-loglevel",
      "error",
      "-fflags",
      "nobuffer",
      "-f",
      "rawvideo",
      "-pixel_format",
      "rgb24",
      "-video_size",
      size.as_str(),
      "-framerate",
      fps.as_str(),
      "-window_title",
      title,
      "-autoexit",
      "-i",
      "-",
    ]
    .into_iter()
    .map(OsString::from)
    .collect()
  }
}

impl FrameDisplay for PreviewWindow {
  fn show(&mut self, frame: &Frame) -> Result<()> {
    if frame.dimensions() != (self.width, self.height) {
      return Err(Error::invalid_input(format!(
        "preview expects {}x{} frames, got {}x{}",
        self.width, self.height, frame.width, frame.height
      )));
    }
    if self.closed {
      return Ok(());
    }
    let Some(stdin) = self.stdin.as_mut() else {
      return Ok(());
    };
    match stdin.write_all(&frame.data) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
        self.closed = true;
        Ok(())
      }
      Err(e) => Err(e.into()),
    }
  }

  fn is_open(&mut self) -> bool {
    if !self.closed && !matches!(self.child.try_wait(), Ok(None)) {
      tracing::debug!("preview window closed");
      self.closed = true;
    }
    !self.closed
  }

  fn close(&mut self) -> Result<()> {
    self.stdin.take();
    self.closed = true;
    if self.child.try_wait()?.is_none() {
      self.child.kill()?;
      self.child.wait()?;
    }
    Ok(())
  }
}

impl Drop for PreviewWindow {
  fn drop(&mut self) {
    if let Ok(None) = self.child.try_wait() {
      self.child.kill().ok();
      self.child.wait().ok();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ffplay_arguments() {
    let args: Vec<_> = PreviewWindow::args("Webcam Live", 640, 480, 20.0)
      .into_iter()
      .map(|a| a.into_string().unwrap())
      .collect();
    let joined = args.join(" ");
    assert!(joined.contains("-f rawvideo -pixel_format rgb24 -video_size 640x480 -framerate 20"));
    assert!(args.contains(&"Webcam Live".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("-"));
  }

  #[test]
  fn test_missing_ffplay() {
    let err = PreviewWindow::open("./no-such-ffplay", "t", 640, 480, 20.0)
      .err()
      .unwrap();
    assert!(err.is_tool_not_found());
  }
}
