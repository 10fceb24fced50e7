//! Record the webcam to a video file while showing it live.
//!
//! [`record`] wires the FFmpeg-backed [`Camera`], [`VideoWriter`] and
//! [`PreviewWindow`] together with [`TerminalKeys`]; the loop itself,
//! [`run_capture_loop`], only sees the small traits below.

mod camera;
mod keys;
mod preview;
mod writer;

pub use camera::{device_input, Camera};
pub use keys::{raw_mode_enabled, TerminalKeys, TerminalStderr};
pub use preview::PreviewWindow;
pub use writer::VideoWriter;

use std::{ffi::OsString, path::PathBuf, time::Duration};

use crate::{
  error::Result,
  fourcc::FourCC,
  frame::Frame,
  paths::{ffmpeg_path, ffplay_path},
};

/// How long each iteration waits for a key press, the equivalent of
/// `waitKey(1)`.
pub const KEY_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub const DEFAULT_OUTPUT: &str = "Recording.avi";
pub const DEFAULT_WINDOW_TITLE: &str = "Webcam Live";

/// A device handle producing frames one at a time.
pub trait FrameSource {
  /// Blocks for the next frame. `Ok(None)` means the source ended.
  fn read_frame(&mut self) -> Result<Option<Frame>>;

  fn release(&mut self) -> Result<()> {
    Ok(())
  }
}

/// An output stream accepting frames of a fixed size.
pub trait FrameSink {
  fn write_frame(&mut self, frame: &Frame) -> Result<()>;

  /// Finish the stream. Called exactly once, after the last write.
  fn release(&mut self) -> Result<()>;
}

/// Somewhere to show frames live.
pub trait FrameDisplay {
  fn show(&mut self, frame: &Frame) -> Result<()>;

  /// `false` once the user has closed the window.
  fn is_open(&mut self) -> bool;

  fn close(&mut self) -> Result<()>;
}

/// A key read from the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPress {
  Char(char),
  /// Ctrl+C, which raw terminal mode delivers as a key instead of a signal.
  Interrupt,
}

pub trait KeySource {
  /// Wait at most `timeout` for a key press.
  fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyPress>>;
}

impl<D: FrameDisplay> FrameDisplay for Option<D> {
  fn show(&mut self, frame: &Frame) -> Result<()> {
    match self {
      Some(display) => display.show(frame),
      None => Ok(()),
    }
  }

  fn is_open(&mut self) -> bool {
    self.as_mut().map_or(true, |display| display.is_open())
  }

  fn close(&mut self) -> Result<()> {
    match self {
      Some(display) => display.close(),
      None => Ok(()),
    }
  }
}

/// Settings for one recording. The defaults reproduce the fixed behavior:
/// camera 0, `Recording.avi`, XVID at 20 fps, 640x480, stop on `q`.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
  pub device_index: u32,
  pub output: PathBuf,
  pub fourcc: FourCC,
  pub fps: f64,
  pub width: u32,
  pub height: u32,
  pub window_title: String,
  /// Compared case-sensitively
  pub quit_key: char,
  pub preview: bool,
  /// Replace an existing output file instead of failing
  pub overwrite: bool,
  pub ffmpeg: OsString,
  pub ffplay: OsString,
}

impl Default for CaptureConfig {
  fn default() -> Self {
    Self {
      device_index: 0,
      output: PathBuf::from(DEFAULT_OUTPUT),
      fourcc: FourCC::XVID,
      fps: 20.0,
      width: 640,
      height: 480,
      window_title: DEFAULT_WINDOW_TITLE.to_string(),
      quit_key: 'q',
      preview: true,
      overwrite: true,
      ffmpeg: ffmpeg_path().into_os_string(),
      ffplay: ffplay_path().into_os_string(),
    }
  }
}

/// Why the capture loop stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
  QuitKey,
  Interrupted,
  WindowClosed,
  /// The source ended without an error
  EndOfStream,
  /// Reading from the source failed
  ReadFailed(String),
}

impl StopReason {
  /// Whether the loop ended because no frame could be grabbed.
  pub fn is_grab_failure(&self) -> bool {
    matches!(self, StopReason::EndOfStream | StopReason::ReadFailed(_))
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSummary {
  pub frames_written: u64,
  pub stop: StopReason,
}

/// Read, resize, write, show and check for the quit key until one of them
/// says stop.
///
/// Every frame is resized to `config.width`x`config.height` before it
/// reaches `sink` or `display`. Afterwards the source is released, the sink
/// finalized and the display closed, in that order, whatever ended the
/// loop.
pub fn run_capture_loop<S, W, D, K>(
  source: &mut S,
  sink: &mut W,
  display: &mut D,
  keys: &mut K,
  config: &CaptureConfig,
) -> Result<CaptureSummary>
where
  S: FrameSource,
  W: FrameSink,
  D: FrameDisplay,
  K: KeySource,
{
  let mut frames_written = 0;
  let outcome = capture_frames(source, sink, display, keys, config, &mut frames_written);

  let released = [source.release(), sink.release(), display.close()];
  let stop = outcome?;
  for result in released {
    result?;
  }

  tracing::info!(frames_written, ?stop, "capture finished");
  Ok(CaptureSummary {
    frames_written,
    stop,
  })
}

fn capture_frames<S, W, D, K>(
  source: &mut S,
  sink: &mut W,
  display: &mut D,
  keys: &mut K,
  config: &CaptureConfig,
  frames_written: &mut u64,
) -> Result<StopReason>
where
  S: FrameSource,
  W: FrameSink,
  D: FrameDisplay,
  K: KeySource,
{
  loop {
    let frame = match source.read_frame() {
      Ok(Some(frame)) => frame,
      Ok(None) => {
        tracing::warn!("camera stream ended");
        return Ok(StopReason::EndOfStream);
      }
      Err(e) => {
        tracing::warn!("failed to read frame: {e}");
        return Ok(StopReason::ReadFailed(e.to_string()));
      }
    };

    let frame = frame.resize(config.width, config.height)?;
    sink.write_frame(&frame)?;
    *frames_written += 1;

    display.show(&frame)?;
    if !display.is_open() {
      return Ok(StopReason::WindowClosed);
    }

    match keys.poll_key(KEY_POLL_INTERVAL)? {
      Some(KeyPress::Char(c)) if c == config.quit_key => return Ok(StopReason::QuitKey),
      Some(KeyPress::Interrupt) => return Ok(StopReason::Interrupted),
      _ => {}
    }
  }
}

/// Record from the configured camera until the quit key is pressed or a
/// frame can't be read.
///
/// If the camera can't be opened, prints `Error: Could not open webcam.` and
/// returns the error before any output file or window is created. The
/// output file is only touched once the camera, preview and terminal are
/// all ready.
pub fn record(config: &CaptureConfig) -> Result<CaptureSummary> {
  let mut camera = match Camera::open_with_path(&config.ffmpeg, config.device_index) {
    Ok(camera) => camera,
    Err(e) => {
      tracing::error!(device = config.device_index, "{e}");
      println!("Error: Could not open webcam.");
      return Err(e);
    }
  };

  // The writer truncates the output on start and must be opened last.
  let mut preview = match config.preview {
    true => Some(PreviewWindow::open(
      &config.ffplay,
      &config.window_title,
      config.width,
      config.height,
      config.fps,
    )?),
    false => None,
  };
  let mut keys = TerminalKeys::new()?;
  let mut writer = VideoWriter::create(config)?;

  let summary = run_capture_loop(&mut camera, &mut writer, &mut preview, &mut keys, config);
  drop(keys);

  if let Ok(summary) = &summary {
    if summary.stop.is_grab_failure() {
      println!("Failed to grab frame.");
    }
  }
  summary
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use std::{cell::RefCell, collections::VecDeque, rc::Rc};

  type Journal = Rc<RefCell<Vec<String>>>;

  fn frame(width: u32, height: u32) -> Frame {
    Frame::rgb24(width, height, vec![128; (width * height * 3) as usize]).unwrap()
  }

  struct ScriptedSource {
    reads: VecDeque<Result<Option<Frame>>>,
    journal: Journal,
  }

  impl FrameSource for ScriptedSource {
    fn read_frame(&mut self) -> Result<Option<Frame>> {
      self.reads.pop_front().unwrap_or(Ok(None))
    }

    fn release(&mut self) -> Result<()> {
      self.journal.borrow_mut().push("source released".into());
      Ok(())
    }
  }

  struct RecordingSink {
    written: Vec<(u32, u32)>,
    journal: Journal,
  }

  impl FrameSink for RecordingSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
      self.written.push(frame.dimensions());
      self.journal.borrow_mut().push("write".into());
      Ok(())
    }

    fn release(&mut self) -> Result<()> {
      self.journal.borrow_mut().push("sink released".into());
      Ok(())
    }
  }

  struct RecordingDisplay {
    shown: Vec<(u32, u32)>,
    close_after: Option<usize>,
    journal: Journal,
  }

  impl FrameDisplay for RecordingDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()> {
      self.shown.push(frame.dimensions());
      Ok(())
    }

    fn is_open(&mut self) -> bool {
      self.close_after.map_or(true, |n| self.shown.len() < n)
    }

    fn close(&mut self) -> Result<()> {
      self.journal.borrow_mut().push("display closed".into());
      Ok(())
    }
  }

  struct ScriptedKeys(VecDeque<Option<KeyPress>>);

  impl KeySource for ScriptedKeys {
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyPress>> {
      assert_eq!(timeout, KEY_POLL_INTERVAL);
      Ok(self.0.pop_front().flatten())
    }
  }

  struct Rig {
    source: ScriptedSource,
    sink: RecordingSink,
    display: RecordingDisplay,
    keys: ScriptedKeys,
    journal: Journal,
  }

  impl Rig {
    fn new(reads: Vec<Result<Option<Frame>>>, keys: Vec<Option<KeyPress>>) -> Self {
      let journal = Journal::default();
      Self {
        source: ScriptedSource {
          reads: reads.into(),
          journal: journal.clone(),
        },
        sink: RecordingSink {
          written: Vec::new(),
          journal: journal.clone(),
        },
        display: RecordingDisplay {
          shown: Vec::new(),
          close_after: None,
          journal: journal.clone(),
        },
        keys: ScriptedKeys(keys.into()),
        journal,
      }
    }

    fn run(&mut self) -> Result<CaptureSummary> {
      run_capture_loop(
        &mut self.source,
        &mut self.sink,
        &mut self.display,
        &mut self.keys,
        &CaptureConfig::default(),
      )
    }
  }

  fn endless_frames(n: usize) -> Vec<Result<Option<Frame>>> {
    (0..n).map(|_| Ok(Some(frame(1280, 720)))).collect()
  }

  #[test]
  fn test_quit_key_stops_within_one_frame() {
    let mut rig = Rig::new(
      endless_frames(10),
      vec![None, None, Some(KeyPress::Char('q'))],
    );
    let summary = rig.run().unwrap();
    assert_eq!(summary.stop, StopReason::QuitKey);
    assert_eq!(summary.frames_written, 3);
    assert_eq!(rig.sink.written.len(), 3);
    assert_eq!(rig.source.reads.len(), 7);
  }

  #[test]
  fn test_other_keys_are_ignored() {
    let mut rig = Rig::new(
      endless_frames(4),
      vec![
        Some(KeyPress::Char('Q')),
        Some(KeyPress::Char('x')),
        Some(KeyPress::Char('q')),
      ],
    );
    let summary = rig.run().unwrap();
    assert_eq!(summary.stop, StopReason::QuitKey);
    assert_eq!(summary.frames_written, 3);
  }

  #[test]
  fn test_ctrl_c_interrupts() {
    let mut rig = Rig::new(endless_frames(4), vec![Some(KeyPress::Interrupt)]);
    let summary = rig.run().unwrap();
    assert_eq!(summary.stop, StopReason::Interrupted);
    assert_eq!(summary.frames_written, 1);
  }

  #[test]
  fn test_every_frame_is_resized_before_write_and_show() {
    let reads = vec![
      Ok(Some(frame(1920, 1080))),
      Ok(Some(frame(320, 240))),
      Ok(Some(frame(640, 480))),
      Ok(Some(frame(800, 600))),
    ];
    let mut rig = Rig::new(reads, vec![]);
    let summary = rig.run().unwrap();
    assert_eq!(summary.stop, StopReason::EndOfStream);
    assert_eq!(rig.sink.written, vec![(640, 480); 4]);
    assert_eq!(rig.display.shown, vec![(640, 480); 4]);
  }

  #[test]
  fn test_failed_read_breaks_and_releases_in_order() {
    let reads = vec![
      Ok(Some(frame(640, 480))),
      Ok(Some(frame(640, 480))),
      Err(Error::device("camera unplugged")),
      Ok(Some(frame(640, 480))),
    ];
    let mut rig = Rig::new(reads, vec![]);
    let summary = rig.run().unwrap();
    assert_eq!(
      summary.stop,
      StopReason::ReadFailed("camera unplugged".into())
    );
    assert!(summary.stop.is_grab_failure());
    assert_eq!(summary.frames_written, 2);
    assert_eq!(
      *rig.journal.borrow(),
      vec![
        "write",
        "write",
        "source released",
        "sink released",
        "display closed"
      ]
    );
  }

  #[test]
  fn test_closing_window_stops() {
    let mut rig = Rig::new(endless_frames(10), vec![]);
    rig.display.close_after = Some(2);
    let summary = rig.run().unwrap();
    assert_eq!(summary.stop, StopReason::WindowClosed);
    assert_eq!(summary.frames_written, 2);
  }

  #[test]
  fn test_missing_display_is_always_open() {
    let mut display: Option<RecordingDisplay> = None;
    assert!(display.is_open());
    display.show(&frame(2, 2)).unwrap();
    display.close().unwrap();
  }

  /// Stand-in ffmpeg: as a camera it describes a 64x48 rawvideo output and
  /// idles; as a writer (`-i -`) it replaces its output file.
  #[cfg(unix)]
  fn fake_ffmpeg(dir: &std::path::Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let log = "[info] Input #0, video4linux2,v4l2, from '/dev/video0':\n\
      [info]   Duration: N/A, start: 0.000000, bitrate: 147456 kb/s\n\
      [info]   Stream #0:0: Video: rawvideo (YUY2 / 0x32595559), yuyv422, 64x48, 10 fps, 10 tbr, 1000k tbn\n\
      [info] Stream mapping:\n\
      [info]   Stream #0:0 -> #0:0 (rawvideo (native) -> rawvideo (native))\n\
      [info] Output #0, rawvideo, to 'pipe:':\n\
      [info]   Stream #0:0: Video: rawvideo (RGB[24] / 0x18424752), rgb24, 64x48, q=2-31, 10 fps, 10 tbn\n";
    std::fs::write(dir.join("camera.log"), log).unwrap();

    let script = dir.join("ffmpeg");
    std::fs::write(
      &script,
      "#!/bin/sh\n\
       for last; do :; done\n\
       case \" $* \" in\n\
       *\" -i - \"*) printf replaced > \"$last\"; exit 0 ;;\n\
       esac\n\
       cat \"$(dirname \"$0\")/camera.log\" >&2\n\
       exec sleep 30\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
  }

  #[cfg(unix)]
  #[test]
  fn test_missing_ffplay_leaves_existing_recording() {
    let dir = std::env::temp_dir().join("proctor-media-missing-ffplay");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let output = dir.join("Recording.avi");
    std::fs::write(&output, "yesterday's recording").unwrap();

    let config = CaptureConfig {
      output: output.clone(),
      ffmpeg: fake_ffmpeg(&dir).into_os_string(),
      ffplay: "./no-such-ffplay".into(),
      ..CaptureConfig::default()
    };
    let err = record(&config).unwrap_err();
    assert!(err.is_tool_not_found());
    assert_eq!(
      std::fs::read_to_string(&output).unwrap(),
      "yesterday's recording"
    );
    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn test_record_without_camera_creates_nothing() {
    let output = std::env::temp_dir().join("proctor-media-no-camera.avi");
    let _ = std::fs::remove_file(&output);
    let config = CaptureConfig {
      output: output.clone(),
      ffmpeg: "./no-such-ffmpeg".into(),
      ffplay: "./no-such-ffplay".into(),
      ..CaptureConfig::default()
    };
    let err = record(&config).unwrap_err();
    assert!(err.is_tool_not_found());
    assert!(!output.exists());
  }
}
