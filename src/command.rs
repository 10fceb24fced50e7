use std::{
  ffi::OsStr,
  fmt,
  process::{Command, CommandArgs, Stdio},
};

use crate::{
  child::FfmpegChild,
  error::{Error, Result},
  paths::ffmpeg_path,
};

/// A wrapper around [`std::process::Command`] with aliases for the `ffmpeg`
/// arguments this crate relies on.
///
/// The `rustdoc` on each method summarizes the FFmpeg documentation:
/// <https://ffmpeg.org/ffmpeg.html>. Option order matters to FFmpeg: options
/// given before [`input`](Self::input) apply to that input, options given
/// before [`output`](Self::output) apply to that output.
pub struct FfmpegCommand {
  inner: Command,
}

impl FfmpegCommand {
  //// Generic options

  /// Alias for `-hide_banner`: suppress the copyright notice and build
  /// configuration normally printed on startup.
  pub fn hide_banner(&mut self) -> &mut Self {
    self.arg("-hide_banner");
    self
  }

  /// Alias for `-y`: overwrite output files without asking.
  pub fn overwrite(&mut self) -> &mut Self {
    self.arg("-y");
    self
  }

  //// Main options

  /// Alias for `-f`. Before an input, forces the demuxer or capture device
  /// (`v4l2`, `avfoundation`, `rawvideo`...). Before an output, forces the
  /// muxer.
  pub fn format<S: AsRef<str>>(&mut self, format: S) -> &mut Self {
    self.arg("-f");
    self.arg(format.as_ref());
    self
  }

  /// Alias for `-i`, the input file path, URL or device.
  ///
  /// To take input from stdin, use the value `-` or `pipe:0`.
  pub fn input<S: AsRef<OsStr>>(&mut self, path_or_url: S) -> &mut Self {
    self.arg("-i");
    self.arg(path_or_url);
    self
  }

  /// Adds the output file path or URL. Takes no flag; every positional
  /// argument after the options is an output.
  pub fn output<S: AsRef<OsStr>>(&mut self, path_or_url: S) -> &mut Self {
    self.arg(path_or_url);
    self
  }

  /// Alias for `-vcodec` (same as `-c:v`): the video encoder for the next
  /// output, or the decoder for the next input.
  pub fn codec_video<S: AsRef<str>>(&mut self, codec: S) -> &mut Self {
    self.arg("-vcodec");
    self.arg(codec.as_ref());
    self
  }

  /// Alias for `-acodec` (same as `-c:a`): the audio encoder for the next
  /// output.
  pub fn codec_audio<S: AsRef<str>>(&mut self, codec: S) -> &mut Self {
    self.arg("-acodec");
    self.arg(codec.as_ref());
    self
  }

  /// Alias for `-strict`: how strictly to follow the standards. `experimental`
  /// unlocks encoders that are still flagged as experimental.
  pub fn strict<S: AsRef<str>>(&mut self, level: S) -> &mut Self {
    self.arg("-strict");
    self.arg(level.as_ref());
    self
  }

  /// Alias for `-pix_fmt`: pixel layout of raw frames.
  pub fn pix_fmt<S: AsRef<str>>(&mut self, pix_fmt: S) -> &mut Self {
    self.arg("-pix_fmt");
    self.arg(pix_fmt.as_ref());
    self
  }

  /// Alias for `-s WxH`: frame size. Required before a `rawvideo` input,
  /// which carries no header.
  pub fn size(&mut self, width: u32, height: u32) -> &mut Self {
    self.arg("-s");
    self.arg(format!("{width}x{height}"));
    self
  }

  /// Alias for `-framerate`: rate at which an input (raw stream or capture
  /// device) produces frames.
  pub fn framerate(&mut self, fps: f64) -> &mut Self {
    self.arg("-framerate");
    self.arg(fps.to_string());
    self
  }

  /// Alias for `-r` as an output option: the output frame rate.
  pub fn rate(&mut self, fps: f64) -> &mut Self {
    self.arg("-r");
    self.arg(fps.to_string());
    self
  }

  /// Alias for `-vtag`: force the four-character codec tag written into the
  /// container.
  pub fn video_tag<S: AsRef<str>>(&mut self, fourcc: S) -> &mut Self {
    self.arg("-vtag");
    self.arg(fourcc.as_ref());
    self
  }

  /// Alias for `-vf`: simple video filtergraph, e.g. `scale=640:480`.
  pub fn video_filter<S: AsRef<str>>(&mut self, filtergraph: S) -> &mut Self {
    self.arg("-vf");
    self.arg(filtergraph.as_ref());
    self
  }

  /// Alias for `-frames:v`: stop writing to the stream after `framecount`
  /// frames.
  pub fn frames(&mut self, framecount: u32) -> &mut Self {
    self.arg("-frames:v");
    self.arg(framecount.to_string());
    self
  }

  //// Presets

  /// Generate a procedural test video. Equivalent to `-f lavfi -i testsrc`.
  pub fn testsrc(&mut self) -> &mut Self {
    self.args(["-f", "lavfi", "-i", "testsrc"]);
    self
  }

  /// Preset for emitting raw decoded RGB24 frames on stdout.
  /// Equivalent to `-f rawvideo -pix_fmt rgb24 -`.
  pub fn rawvideo(&mut self) -> &mut Self {
    self.args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"]);
    self
  }

  /// Preset for reading raw RGB24 frames of a fixed size from stdin.
  /// Equivalent to `-f rawvideo -pix_fmt rgb24 -s WxH -framerate FPS -i -`.
  pub fn rawvideo_stdin(&mut self, width: u32, height: u32, fps: f64) -> &mut Self {
    self
      .format("rawvideo")
      .pix_fmt("rgb24")
      .size(width, height)
      .framerate(fps)
      .input("-")
  }

  /// Configures logging with the level prefix expected by the log parser.
  /// Applied automatically in the constructor.
  ///
  /// Equivalent to `ffmpeg -loglevel level+info`.
  fn set_expected_loglevel(&mut self) -> &mut Self {
    self.args(["-loglevel", "level+info"]);
    self
  }

  //// `std::process::Command` passthrough methods

  /// Adds an argument to pass to the program.
  pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
    self.inner.arg(arg.as_ref());
    self
  }

  /// Adds multiple arguments to pass to the program.
  pub fn args<I, S>(&mut self, args: I) -> &mut Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
  {
    for arg in args {
      self.arg(arg.as_ref());
    }
    self
  }

  /// Returns an iterator of the arguments that will be passed to the program.
  pub fn get_args(&self) -> CommandArgs<'_> {
    self.inner.get_args()
  }

  pub fn get_program(&self) -> &OsStr {
    self.inner.get_program()
  }

  /// Spawn the ffmpeg command as a child process.
  ///
  /// A missing executable is reported as
  /// [`ErrorKind::ToolNotFound`](crate::error::ErrorKind::ToolNotFound).
  pub fn spawn(&mut self) -> Result<FfmpegChild> {
    tracing::debug!(command = ?self.inner, "spawning ffmpeg");
    self
      .inner
      .spawn()
      .map(FfmpegChild::from_inner)
      .map_err(|e| Error::spawn(self.get_program().to_string_lossy(), e))
  }

  //// Constructors

  /// Uses the sidecar or `PATH` ffmpeg, see [`ffmpeg_path`].
  pub fn new() -> Self {
    Self::new_with_path(ffmpeg_path())
  }

  pub fn new_with_path<S: AsRef<OsStr>>(path_to_ffmpeg_binary: S) -> Self {
    let mut inner = Command::new(&path_to_ffmpeg_binary);
    // stdin stays piped so ffmpeg never waits on an interactive prompt from
    // the terminal, and so `FfmpegChild::quit` can send `q`.
    inner.stdin(Stdio::piped());
    inner.stderr(Stdio::piped());
    inner.stdout(Stdio::piped());

    let mut ffmpeg_command = Self { inner };
    ffmpeg_command.set_expected_loglevel();
    ffmpeg_command
  }
}

impl Default for FfmpegCommand {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for FfmpegCommand {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.inner.fmt(f)
  }
}

impl From<Command> for FfmpegCommand {
  /// Convert a `Command` into a `FfmpegCommand` as-is. The expected log
  /// level is not applied, so log parsing loses level information.
  fn from(inner: Command) -> Self {
    Self { inner }
  }
}

impl From<FfmpegCommand> for Command {
  fn from(command: FfmpegCommand) -> Self {
    command.inner
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args_of(cmd: &FfmpegCommand) -> Vec<String> {
    cmd
      .get_args()
      .map(|a| a.to_string_lossy().into_owned())
      .collect()
  }

  #[test]
  fn test_loglevel_is_first() {
    let cmd = FfmpegCommand::new();
    assert_eq!(args_of(&cmd), vec!["-loglevel", "level+info"]);
  }

  #[test]
  fn test_rawvideo_stdin_preset() {
    let mut cmd = FfmpegCommand::new_with_path("ffmpeg");
    cmd.rawvideo_stdin(640, 480, 20.0);
    assert_eq!(
      args_of(&cmd)[2..],
      [
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
        "640x480",
        "-framerate",
        "20",
        "-i",
        "-"
      ]
    );
  }

  #[test]
  fn test_testsrc_clip_arguments() {
    let mut cmd = FfmpegCommand::new_with_path("ffmpeg");
    cmd
      .testsrc()
      .video_filter("scale=160:120")
      .frames(25)
      .output("clip.avi");
    assert_eq!(
      args_of(&cmd)[2..],
      [
        "-f",
        "lavfi",
        "-i",
        "testsrc",
        "-vf",
        "scale=160:120",
        "-frames:v",
        "25",
        "clip.avi"
      ]
    );
  }

  #[test]
  fn test_spawn_missing_binary() {
    let err = FfmpegCommand::new_with_path("./no-such-ffmpeg-binary")
      .spawn()
      .err()
      .unwrap();
    assert!(err.is_tool_not_found());
  }
}
