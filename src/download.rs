//! Fetch a static FFmpeg release and place its binaries next to the running
//! executable, where [`crate::paths`] looks first.
//!
//! Only available with the `download_ffmpeg` feature (enabled by default).

use std::{
  env::consts::OS,
  fs::{create_dir_all, File},
  path::{Path, PathBuf},
};

use crate::{
  error::{Error, Result},
  paths::sidecar_dir,
  version::ffmpeg_is_installed,
};

pub const LINUX_VERSION: &str = "https://johnvansickle.com/ffmpeg/release-readme.txt";
pub const WINDOWS_VERSION: &str = "https://www.gyan.dev/ffmpeg/builds/release-version";
pub const MACOS_VERSION: &str = "https://evermeet.cx/ffmpeg/info/ffmpeg/release";

pub const LINUX_DOWNLOAD: &[&str] =
  &["https://johnvansickle.com/ffmpeg/releases/ffmpeg-release-amd64-static.tar.xz"];
pub const WINDOWS_DOWNLOAD: &[&str] =
  &["https://www.gyan.dev/ffmpeg/builds/ffmpeg-release-essentials.zip"];
/// evermeet.cx publishes one archive per tool.
pub const MACOS_DOWNLOAD: &[&str] = &[
  "https://evermeet.cx/ffmpeg/getrelease/zip",
  "https://evermeet.cx/ffmpeg/getrelease/ffplay/zip",
];

/// Binaries extracted from the archives. The Linux static build ships no
/// `ffplay`; the system one is used for previews there.
pub const TOOLS: &[&str] = &["ffmpeg", "ffplay", "ffprobe"];

/// Parse the macOS version number from the evermeet.cx JSON manifest.
///
/// ```rust
/// use proctor_media::download::parse_macos_version;
/// let json = r#"{"name":"ffmpeg","type":"release","version":"7.1","size":26}"#;
/// assert_eq!(parse_macos_version(json).as_deref(), Some("7.1"));
/// ```
pub fn parse_macos_version(manifest: &str) -> Option<String> {
  let (_, rest) = manifest.split_once("\"version\":")?;
  rest
    .trim_start()
    .strip_prefix('"')?
    .split('"')
    .next()
    .map(str::to_string)
}

/// Parse the Linux version number from the release readme.
///
/// ```rust
/// use proctor_media::download::parse_linux_version;
/// let readme = "build: ffmpeg-7.0.2-amd64-static.tar.xz\nversion: 7.0.2\n";
/// assert_eq!(parse_linux_version(readme).as_deref(), Some("7.0.2"));
/// ```
pub fn parse_linux_version(readme: &str) -> Option<String> {
  readme
    .lines()
    .find_map(|line| line.trim().strip_prefix("version:"))
    .and_then(|v| v.split_whitespace().next())
    .map(str::to_string)
}

fn get(url: &str) -> Result<reqwest::blocking::Response> {
  reqwest::blocking::get(url)
    .and_then(|response| response.error_for_status())
    .map_err(Error::from_std)
}

/// Check the latest version available online.
pub fn check_latest_version() -> Result<String> {
  let manifest_url = match OS {
    "linux" => LINUX_VERSION,
    "windows" => WINDOWS_VERSION,
    "macos" => MACOS_VERSION,
    _ => return Err(Error::msg(format!("Unsupported platform: {OS}"))),
  };
  tracing::debug!(url = manifest_url, "checking latest ffmpeg release");
  let body = get(manifest_url)?.text().map_err(Error::from_std)?;

  let version = match OS {
    "linux" => parse_linux_version(&body),
    "macos" => parse_macos_version(&body),
    _ => Some(body.trim().to_string()),
  };
  version.ok_or_else(|| Error::msg(format!("Failed to parse the {OS} release version")))
}

pub fn download_urls() -> Result<&'static [&'static str]> {
  match OS {
    "linux" => Ok(LINUX_DOWNLOAD),
    "windows" => Ok(WINDOWS_DOWNLOAD),
    "macos" => Ok(MACOS_DOWNLOAD),
    _ => Err(Error::msg(format!("Unsupported platform: {OS}"))),
  }
}

/// Stream `url` into `dir`, returning the archive path.
pub fn download_archive(url: &str, dir: &Path, index: usize) -> Result<PathBuf> {
  let extension = if url.ends_with(".tar.xz") {
    "tar.xz"
  } else {
    "zip"
  };
  let archive_path = dir.join(format!("ffmpeg-download-{index}.{extension}"));

  tracing::info!(url, path = %archive_path.display(), "downloading ffmpeg");
  let mut response = get(url)?;
  let mut file = File::create(&archive_path)?;
  response.copy_to(&mut file).map_err(Error::from_std)?;
  Ok(archive_path)
}

fn wanted_name(path: &Path) -> Option<String> {
  let name = path.file_name()?.to_str()?;
  let stem = name.strip_suffix(".exe").unwrap_or(name);
  TOOLS.contains(&stem).then(|| name.to_string())
}

/// Extract the FFmpeg tools from `archive` into `dest`, ignoring everything
/// else. Returns the extracted paths.
#[cfg(target_os = "linux")]
pub fn unpack_ffmpeg(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
  let decoder = xz2::read::XzDecoder::new(File::open(archive)?);
  let mut tarball = tar::Archive::new(decoder);
  let mut extracted = Vec::new();
  for entry in tarball.entries()? {
    let mut entry = entry?;
    if !entry.header().entry_type().is_file() {
      continue;
    }
    let Some(name) = wanted_name(&entry.path()?) else {
      continue;
    };
    let target = dest.join(name);
    entry.unpack(&target)?;
    extracted.push(target);
  }
  Ok(extracted)
}

/// Extract the FFmpeg tools from `archive` into `dest`, ignoring everything
/// else. Returns the extracted paths.
#[cfg(not(target_os = "linux"))]
pub fn unpack_ffmpeg(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
  let mut zip = zip::ZipArchive::new(File::open(archive)?).map_err(Error::from_std)?;
  let mut extracted = Vec::new();
  for i in 0..zip.len() {
    let mut file = zip.by_index(i).map_err(Error::from_std)?;
    if file.is_dir() {
      continue;
    }
    let Some(name) = wanted_name(Path::new(file.name())) else {
      continue;
    };
    let target = dest.join(name);
    std::io::copy(&mut file, &mut File::create(&target)?)?;
    #[cfg(unix)]
    {
      use std::os::unix::fs::PermissionsExt;
      std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o755))?;
    }
    extracted.push(target);
  }
  Ok(extracted)
}

/// Download every archive for this platform into `dest` and unpack the
/// tools there, deleting the archives afterwards.
pub fn download_ffmpeg_to(dest: &Path) -> Result<Vec<PathBuf>> {
  create_dir_all(dest)?;
  let mut installed = Vec::new();
  for (index, url) in download_urls()?.iter().enumerate() {
    let archive = download_archive(url, dest, index)?;
    let unpacked = unpack_ffmpeg(&archive, dest);
    if let Err(e) = std::fs::remove_file(&archive) {
      tracing::warn!(path = %archive.display(), "could not remove archive: {e}");
    }
    installed.extend(unpacked?);
  }
  if !installed.iter().any(|p| wanted_name(p).is_some_and(|n| n.starts_with("ffmpeg"))) {
    return Err(Error::msg("The downloaded archive contained no ffmpeg binary"));
  }
  for path in &installed {
    tracing::info!(path = %path.display(), "installed");
  }
  Ok(installed)
}

/// Check if FFmpeg is installed, and if it's not, download and unpack it
/// next to the running executable.
pub fn auto_download() -> Result<()> {
  if ffmpeg_is_installed() {
    tracing::debug!("ffmpeg already installed");
    return Ok(());
  }
  download_ffmpeg_to(&sidecar_dir()?)?;
  Ok(())
}
