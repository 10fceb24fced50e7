use std::{
  io::{self, Write},
  path::{Path, PathBuf},
  process::ChildStdin,
  thread::JoinHandle,
};

use crate::{
  child::FfmpegChild,
  command::FfmpegCommand,
  error::{Error, Result},
  frame::Frame,
  iter::{error_message, trace_event},
  log_parser::split_level,
};

use super::{CaptureConfig, FrameSink};

/// An output video file fed raw RGB24 frames through `ffmpeg`'s stdin and
/// encoded with the encoder matching the configured FourCC.
pub struct VideoWriter {
  path: PathBuf,
  width: u32,
  height: u32,
  stdin: Option<ChildStdin>,
  child: FfmpegChild,
  /// Drains ffmpeg's stderr, returning its error lines.
  log_thread: Option<JoinHandle<Vec<String>>>,
  frames_written: u64,
  released: bool,
}

impl VideoWriter {
  pub fn create(config: &CaptureConfig) -> Result<Self> {
    Self::spawn(
      Self::command(config),
      &config.output,
      config.width,
      config.height,
    )
  }

  /// The encoder invocation for `config`: raw frames on stdin, the FourCC's
  /// encoder and tag on the output file.
  pub fn command(config: &CaptureConfig) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new_with_path(&config.ffmpeg);
    cmd.hide_banner();
    if config.overwrite {
      cmd.overwrite();
    }
    cmd
      .rawvideo_stdin(config.width, config.height, config.fps)
      .codec_video(config.fourcc.encoder())
      .video_tag(config.fourcc.as_str())
      .pix_fmt(config.fourcc.encoder_pix_fmt())
      .rate(config.fps)
      .output(&config.output);
    cmd
  }

  /// Start `cmd`, which must read `width`x`height` RGB24 frames from stdin.
  pub fn spawn(mut cmd: FfmpegCommand, path: &Path, width: u32, height: u32) -> Result<Self> {
    let mut child = cmd.spawn()?;
    let stdin = child.take_stdin().ok_or("ffmpeg stdin is not piped")?;
    let iter = child.iter()?;
    let log_thread = std::thread::spawn(move || {
      iter
        .inspect(|event| trace_event("ffmpeg", event))
        .filter_map(|event| error_message(&event))
        .map(|line| split_level(&line).1.to_string())
        .collect()
    });

    tracing::info!(path = %path.display(), width, height, "video writer opened");
    Ok(Self {
      path: path.to_path_buf(),
      width,
      height,
      stdin: Some(stdin),
      child,
      log_thread: Some(log_thread),
      frames_written: 0,
      released: false,
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn frames_written(&self) -> u64 {
    self.frames_written
  }

  /// Close stdin, let ffmpeg finish the file and collect its status.
  fn finish(&mut self) -> Result<()> {
    self.released = true;
    self.stdin.take();
    let errors = self
      .log_thread
      .take()
      .and_then(|handle| handle.join().ok())
      .unwrap_or_default();
    let status = self.child.wait()?;
    if !status.success() {
      return Err(Error::exit_status("ffmpeg (video writer)", status, &errors));
    }
    tracing::info!(
      path = %self.path.display(),
      frames = self.frames_written,
      "video writer released"
    );
    Ok(())
  }
}

impl FrameSink for VideoWriter {
  fn write_frame(&mut self, frame: &Frame) -> Result<()> {
    if frame.dimensions() != (self.width, self.height) || frame.pix_fmt != "rgb24" {
      return Err(Error::invalid_input(format!(
        "writer expects {}x{} rgb24 frames, got {}x{} {}",
        self.width, self.height, frame.width, frame.height, frame.pix_fmt
      )));
    }
    let stdin = self.stdin.as_mut().ok_or("video writer already released")?;
    stdin.write_all(&frame.data).map_err(|e| match e.kind() {
      io::ErrorKind::BrokenPipe => {
        Error::msg("ffmpeg stopped accepting frames for the output file")
      }
      _ => Error::from(e),
    })?;
    self.frames_written += 1;
    Ok(())
  }

  fn release(&mut self) -> Result<()> {
    match self.released {
      true => Ok(()),
      false => self.finish(),
    }
  }
}

impl Drop for VideoWriter {
  fn drop(&mut self) {
    if !self.released {
      if let Err(e) = self.finish() {
        tracing::warn!("video writer: {e}");
      }
    }
  }
}
