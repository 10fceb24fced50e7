//! Re-encode a video file through the external `ffmpeg` executable.

use std::{
  ffi::OsString,
  path::{Path, PathBuf},
};

use crate::{
  command::FfmpegCommand,
  error::{Error, ErrorKind, Result},
  event::FfmpegEvent,
  iter::{error_message, trace_event},
  log_parser::split_level,
  paths::ffmpeg_path,
};

pub const DEFAULT_INPUT: &str = "objects1.mp4";
pub const DEFAULT_OUTPUT: &str = "objects.mp4";

/// One `ffmpeg -i <input> -vcodec ... -acodec ... -strict ... <output>`
/// invocation.
#[derive(Debug, Clone)]
pub struct Conversion {
  pub input: PathBuf,
  pub output: PathBuf,
  /// Passed to `-vcodec`
  pub video_codec: String,
  /// Passed to `-acodec`
  pub audio_codec: String,
  /// Passed to `-strict`; omitted when `None`
  pub strict: Option<String>,
  /// Adds `-y`. Without it ffmpeg refuses to replace an existing output,
  /// which surfaces as a non-zero exit.
  pub overwrite: bool,
  pub ffmpeg: OsString,
}

/// What a successful conversion produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
  pub output: PathBuf,
  /// Frames written according to the last progress line, if any was seen
  pub frames: Option<u32>,
  /// Input duration in seconds as announced by ffmpeg
  pub duration: Option<f64>,
}

impl Conversion {
  /// H.264 video and AAC audio, with experimental encoders allowed.
  pub fn new<I: AsRef<Path>, O: AsRef<Path>>(input: I, output: O) -> Self {
    Self {
      input: input.as_ref().to_path_buf(),
      output: output.as_ref().to_path_buf(),
      video_codec: "libx264".to_string(),
      audio_codec: "aac".to_string(),
      strict: Some("experimental".to_string()),
      overwrite: false,
      ffmpeg: ffmpeg_path().into_os_string(),
    }
  }

  pub fn with_ffmpeg_path<S: Into<OsString>>(mut self, path: S) -> Self {
    self.ffmpeg = path.into();
    self
  }

  pub fn overwrite(mut self, overwrite: bool) -> Self {
    self.overwrite = overwrite;
    self
  }

  pub fn command(&self) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new_with_path(&self.ffmpeg);
    if self.overwrite {
      cmd.overwrite();
    }
    cmd
      .input(&self.input)
      .codec_video(&self.video_codec)
      .codec_audio(&self.audio_codec);
    if let Some(strict) = &self.strict {
      cmd.strict(strict);
    }
    cmd.output(&self.output);
    cmd
  }

  /// Run ffmpeg to completion.
  ///
  /// Fails with [`ErrorKind::ToolNotFound`] when the executable is missing
  /// and with [`ErrorKind::ExitStatus`] when it exits unsuccessfully; in the
  /// latter case the message carries ffmpeg's own error lines.
  pub fn run(&self) -> Result<ConversionReport> {
    let mut child = self.command().spawn()?;
    child.close_stdin();

    tracing::info!(
      input = %self.input.display(),
      output = %self.output.display(),
      "converting"
    );

    let mut iter = child.iter()?;
    let mut errors = Vec::new();
    let mut frames = None;
    for event in iter.by_ref() {
      trace_event("ffmpeg", &event);
      if let FfmpegEvent::Progress(progress) = &event {
        frames = Some(progress.frame);
      }
      if let Some(message) = error_message(&event) {
        errors.push(split_level(&message).1.to_string());
      }
    }
    let duration = iter.metadata().duration();

    let status = child.wait()?;
    if !status.success() {
      return Err(Error::exit_status(
        self.ffmpeg.to_string_lossy(),
        status,
        &errors,
      ));
    }

    Ok(ConversionReport {
      output: self.output.clone(),
      frames,
      duration,
    })
  }

  /// Run the conversion and print the outcome. Returns whether it
  /// succeeded; failures are never propagated further.
  pub fn run_and_report(&self) -> bool {
    let result = self.run();
    report(&result, &self.output);
    result.is_ok()
  }
}

/// Converts a video to MP4 with the H.264 codec, using the default
/// settings of [`Conversion::new`].
pub fn convert_video_to_h264<I: AsRef<Path>, O: AsRef<Path>>(
  input: I,
  output: O,
) -> Result<ConversionReport> {
  Conversion::new(input, output).run()
}

/// Print the user-facing message for a finished conversion.
pub fn report(result: &Result<ConversionReport>, output: &Path) {
  match result {
    Ok(_) => println!("Video converted successfully: {}", output.display()),
    Err(e) if e.kind == ErrorKind::ToolNotFound => {
      eprintln!("ffmpeg not found. Make sure it is installed and in your PATH.")
    }
    Err(e) => eprintln!("Error during conversion: {e}"),
  }
}
