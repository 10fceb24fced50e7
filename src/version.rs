use crate::{
  error::{Error, Result},
  event::FfmpegEvent,
  log_parser::FfmpegLogParser,
  paths::{ffmpeg_path, ffplay_path},
};
use std::ffi::OsStr;
use std::process::{Command, Stdio};

/// Alias for `ffmpeg -version`, parsing the version number and returning it.
pub fn ffmpeg_version() -> Result<String> {
  tool_version_with_path(ffmpeg_path())
}

/// Alias for `ffplay -version`.
pub fn ffplay_version() -> Result<String> {
  tool_version_with_path(ffplay_path())
}

/// Runs `<path> -version` and parses the version from its first line. Works
/// for every tool of the FFmpeg family.
pub fn tool_version_with_path<S: AsRef<OsStr>>(path: S) -> Result<String> {
  let program = path.as_ref().to_string_lossy().into_owned();
  let mut cmd = Command::new(&path)
    .arg("-version")
    .stdin(Stdio::null())
    .stderr(Stdio::null())
    .stdout(Stdio::piped()) // not stderr when calling `-version`
    .spawn()
    .map_err(|e| Error::spawn(&program, e))?;
  let stdout = cmd.stdout.take().ok_or("No standard output channel")?;
  let mut parser = FfmpegLogParser::new(stdout);

  let mut version: Option<String> = None;
  while let Ok(event) = parser.parse_next_event() {
    match event {
      FfmpegEvent::ParsedVersion(v) if version.is_none() => version = Some(v.version),
      FfmpegEvent::LogEOF => break,
      _ => {}
    }
  }
  let exit_status = cmd.wait()?;
  if !exit_status.success() {
    return Err(Error::exit_status(&program, exit_status, &[]));
  }
  version.ok_or_else(|| Error::msg(format!("Failed to parse {program} version")))
}

/// Verify whether ffmpeg is installed on the system, either on the `PATH` or
/// next to the Rust executable.
pub fn ffmpeg_is_installed() -> bool {
  is_installed(ffmpeg_path())
}

/// Same check as [`ffmpeg_is_installed`] for the preview player.
pub fn ffplay_is_installed() -> bool {
  is_installed(ffplay_path())
}

fn is_installed<S: AsRef<OsStr>>(path: S) -> bool {
  Command::new(path)
    .arg("-version")
    .stdin(Stdio::null())
    .stderr(Stdio::null())
    .stdout(Stdio::null())
    .status()
    .map(|s| s.success())
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_version_of_missing_tool() {
    let err = tool_version_with_path("./no-such-ffplay").unwrap_err();
    assert!(err.is_tool_not_found());
    assert!(!is_installed("./no-such-ffplay"));
  }

  #[test]
  fn test_ffmpeg_version() {
    if !ffmpeg_is_installed() {
      eprintln!("ffmpeg not installed, skipping");
      return;
    }
    let version = ffmpeg_version().unwrap();
    assert!(!version.is_empty());
  }
}
