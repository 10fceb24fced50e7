use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use proctor_media::{
  capture::{self, CaptureConfig, TerminalStderr, DEFAULT_WINDOW_TITLE},
  convert::{self, Conversion},
  fourcc::FourCC,
  version::ffplay_is_installed,
};

#[derive(Debug, Parser)]
#[clap(version, about, long_about = None)]
struct Opt {
  /// Log more; repeat for debug output. `RUST_LOG` takes precedence.
  #[clap(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[clap(subcommand)]
  command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
  /// Re-encode a video to H.264/AAC
  Convert {
    #[clap(default_value = convert::DEFAULT_INPUT)]
    input: PathBuf,
    #[clap(default_value = convert::DEFAULT_OUTPUT)]
    output: PathBuf,
    #[clap(long, default_value = "libx264")]
    video_codec: String,
    #[clap(long, default_value = "aac")]
    audio_codec: String,
    /// Value for `-strict`; pass an empty string to leave it out
    #[clap(long, default_value = "experimental")]
    strict: String,
    /// Replace the output file if it exists
    #[clap(short = 'y', long)]
    overwrite: bool,
    /// Download ffmpeg first if it isn't installed
    #[clap(long)]
    auto_download: bool,
  },
  /// Record the webcam to a file with a live preview; press `q` to stop
  Capture {
    #[clap(default_value = capture::DEFAULT_OUTPUT)]
    output: PathBuf,
    #[clap(short, long, default_value_t = 0)]
    device: u32,
    #[clap(long, default_value = "XVID")]
    fourcc: FourCC,
    #[clap(long, default_value_t = 20.0)]
    fps: f64,
    #[clap(long, default_value_t = 640)]
    width: u32,
    #[clap(long, default_value_t = 480)]
    height: u32,
    #[clap(long, default_value = DEFAULT_WINDOW_TITLE)]
    title: String,
    /// Record without opening a window
    #[clap(long)]
    no_preview: bool,
    /// Fail instead of replacing an existing output file
    #[clap(long)]
    no_overwrite: bool,
    #[clap(long)]
    auto_download: bool,
  },
  /// Download a static ffmpeg build next to this executable
  Download {
    /// Only print the latest available version
    #[clap(long)]
    check: bool,
  },
}

fn init_logging(verbose: u8) {
  let default = match verbose {
    0 => "warn",
    1 => "info",
    _ => "debug",
  };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_writer(TerminalStderr::new)
    .with_env_filter(filter)
    .init();
}

#[cfg(feature = "download_ffmpeg")]
fn ensure_ffmpeg(auto_download: bool) -> anyhow::Result<()> {
  if auto_download {
    proctor_media::download::auto_download()?;
  }
  Ok(())
}

#[cfg(not(feature = "download_ffmpeg"))]
fn ensure_ffmpeg(auto_download: bool) -> anyhow::Result<()> {
  if auto_download {
    tracing::warn!("built without the download_ffmpeg feature, using the installed ffmpeg");
  }
  Ok(())
}

#[cfg(feature = "download_ffmpeg")]
fn download(check: bool) -> anyhow::Result<()> {
  use proctor_media::{
    download,
    paths::sidecar_dir,
    version::{ffmpeg_version, ffplay_version},
  };

  let latest = download::check_latest_version()?;
  if check {
    println!("Latest available: {latest}");
    return Ok(());
  }
  for path in download::download_ffmpeg_to(&sidecar_dir()?)? {
    println!("Installed {}", path.display());
  }
  println!("ffmpeg version {}", ffmpeg_version()?);
  match ffplay_version() {
    Ok(version) => println!("ffplay version {version}"),
    Err(_) => println!("ffplay not available; install it for the capture preview"),
  }
  Ok(())
}

#[cfg(not(feature = "download_ffmpeg"))]
fn download(_check: bool) -> anyhow::Result<()> {
  anyhow::bail!("built without the download_ffmpeg feature")
}

fn run(command: Command) -> anyhow::Result<bool> {
  match command {
    Command::Convert {
      input,
      output,
      video_codec,
      audio_codec,
      strict,
      overwrite,
      auto_download,
    } => {
      ensure_ffmpeg(auto_download)?;
      let conversion = Conversion {
        video_codec,
        audio_codec,
        strict: (!strict.is_empty()).then_some(strict),
        ..Conversion::new(input, output)
      }
      .overwrite(overwrite);
      Ok(conversion.run_and_report())
    }
    Command::Capture {
      output,
      device,
      fourcc,
      fps,
      width,
      height,
      title,
      no_preview,
      no_overwrite,
      auto_download,
    } => {
      ensure_ffmpeg(auto_download)?;
      anyhow::ensure!(width > 0 && height > 0, "frame size must be non-zero");
      anyhow::ensure!(fps > 0.0, "fps must be positive");
      anyhow::ensure!(
        no_preview || ffplay_is_installed(),
        "ffplay not found. Install it or pass --no-preview."
      );
      let config = CaptureConfig {
        device_index: device,
        output,
        fourcc,
        fps,
        width,
        height,
        window_title: title,
        preview: !no_preview,
        overwrite: !no_overwrite,
        ..CaptureConfig::default()
      };
      match capture::record(&config) {
        Ok(summary) => {
          tracing::info!(
            frames = summary.frames_written,
            path = %config.output.display(),
            "recording saved"
          );
          Ok(true)
        }
        Err(e) => {
          tracing::error!("{e}");
          Ok(false)
        }
      }
    }
    Command::Download { check } => {
      download(check)?;
      Ok(true)
    }
  }
}

fn main() -> ExitCode {
  let opt = Opt::parse();
  init_logging(opt.verbose);

  match run(opt.command) {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      eprintln!("Error: {e:#}");
      ExitCode::FAILURE
    }
  }
}
