use std::ffi::OsStr;

use crate::{
  child::FfmpegChild,
  command::FfmpegCommand,
  error::{Error, Result},
  event::FfmpegEvent,
  frame::Frame,
  iter::{trace_event, FfmpegIterator},
};

use super::FrameSource;

/// The capture device format and input URL for webcam `index` on this
/// platform.
///
/// ```rust
/// let (format, url) = proctor_media::capture::device_input(0);
/// if cfg!(target_os = "linux") {
///   assert_eq!((format, url.as_str()), ("v4l2", "/dev/video0"));
/// }
/// ```
pub fn device_input(index: u32) -> (&'static str, String) {
  if cfg!(target_os = "linux") {
    ("v4l2", format!("/dev/video{index}"))
  } else if cfg!(target_os = "macos") {
    ("avfoundation", index.to_string())
  } else if cfg!(windows) {
    ("vfwcap", index.to_string())
  } else {
    ("v4l2", format!("/dev/video{index}"))
  }
}

/// A webcam opened through `ffmpeg`, which decodes the device stream to raw
/// RGB24 frames at the camera's native resolution.
pub struct Camera {
  // Field order matters: the iterator's channel must close before the
  // child is reaped, or its reader threads could stay blocked.
  iter: FfmpegIterator,
  child: FfmpegChild,
  pub index: u32,
  pub width: u32,
  pub height: u32,
  pub fps: f32,
}

impl Camera {
  pub fn open(index: u32) -> Result<Self> {
    Self::open_with_command(FfmpegCommand::new(), index)
  }

  pub fn open_with_path<S: AsRef<OsStr>>(ffmpeg: S, index: u32) -> Result<Self> {
    Self::open_with_command(FfmpegCommand::new_with_path(ffmpeg), index)
  }

  /// Start capturing with `cmd` and wait until ffmpeg has described its
  /// output. Fails with [`ErrorKind::Device`](crate::error::ErrorKind::Device)
  /// when ffmpeg gives up on the device before that.
  pub fn open_with_command(mut cmd: FfmpegCommand, index: u32) -> Result<Self> {
    let (format, url) = device_input(index);
    cmd.hide_banner().format(format);
    if format == "avfoundation" {
      // avfoundation rejects its own default of 29.97
      cmd.framerate(30.0);
    }
    cmd.input(&url).rawvideo();

    let mut child = cmd.spawn()?;
    let mut iter = child.iter()?;
    let metadata = iter
      .collect_metadata()
      .map_err(|e| Error::device(format!("Could not open camera {index} ({url}): {e:#}")))?;

    let video = metadata
      .stdout_video_stream()
      .and_then(|stream| stream.video_data())
      .ok_or_else(|| Error::device(format!("Camera {index} produced no video stream")))?
      .clone();

    tracing::info!(
      device = %url,
      width = video.width,
      height = video.height,
      fps = video.fps,
      "camera opened"
    );

    Ok(Self {
      iter,
      child,
      index,
      width: video.width,
      height: video.height,
      fps: video.fps,
    })
  }
}

impl FrameSource for Camera {
  fn read_frame(&mut self) -> Result<Option<Frame>> {
    for event in self.iter.by_ref() {
      match event {
        FfmpegEvent::OutputFrame(frame) => return Ok(Some(frame)),
        FfmpegEvent::Error(e) => return Err(Error::device(e)),
        FfmpegEvent::Done => return Ok(None),
        other => trace_event("ffmpeg", &other),
      }
    }
    Ok(None)
  }

  /// The capture process has nothing to finalize, so it is stopped
  /// outright.
  fn release(&mut self) -> Result<()> {
    if self.child.try_wait()?.is_none() {
      self.child.kill()?;
      self.child.wait()?;
    }
    Ok(())
  }
}
