use crate::error::Result;
use std::{
  env::current_exe,
  path::{Path, PathBuf},
};

/// Returns the path of the FFmpeg executable, to be used as the argument to
/// `Command::new`. A binary placed next to the running executable (for
/// example by [`crate::download`]) wins; otherwise the bare name `ffmpeg` is
/// returned and resolved through `PATH` when the command is run.
pub fn ffmpeg_path() -> PathBuf {
  tool_path("ffmpeg")
}

/// Same lookup as [`ffmpeg_path`], for the `ffplay` preview player.
pub fn ffplay_path() -> PathBuf {
  tool_path("ffplay")
}

/// Sidecar lookup with a fallback to the `PATH` name.
pub fn tool_path(name: &str) -> PathBuf {
  match sidecar_path(name) {
    Ok(path) if path.exists() => path,
    _ => Path::new(name).to_path_buf(),
  }
}

/// The (expected) path to a binary named `name` adjacent to the Rust binary,
/// with `.exe` appended on Windows.
pub fn sidecar_path(name: &str) -> Result<PathBuf> {
  let mut path = sidecar_dir()?.join(name);
  if cfg!(windows) {
    path.set_extension("exe");
  }
  Ok(path)
}

/// The directory holding the running executable, where downloaded tools are
/// placed.
pub fn sidecar_dir() -> Result<PathBuf> {
  Ok(
    current_exe()?
      .parent()
      .ok_or("Can't get parent of current_exe")?
      .to_path_buf(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sidecar_path_is_next_to_exe() {
    let dir = sidecar_dir().unwrap();
    let path = sidecar_path("ffplay").unwrap();
    assert_eq!(path.parent(), Some(dir.as_path()));
    assert_eq!(path.file_stem().unwrap(), "ffplay");
  }

  #[test]
  fn test_missing_sidecar_falls_back_to_name() {
    let path = tool_path("definitely-not-a-real-tool");
    assert_eq!(path, Path::new("definitely-not-a-real-tool"));
  }
}
