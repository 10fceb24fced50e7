//! Convert videos and record the webcam by driving standalone FFmpeg
//! binaries.
//!
//! ## Example
//!
//! ```rust,no_run
//! use proctor_media::{capture, convert::Conversion, error::Result};
//!
//! fn main() -> Result<()> {
//!   // ffmpeg -i objects1.mp4 -vcodec libx264 -acodec aac -strict experimental objects.mp4
//!   let report = Conversion::new("objects1.mp4", "objects.mp4").run()?;
//!   println!("{} frames", report.frames.unwrap_or_default());
//!
//!   // Camera 0 to Recording.avi (XVID, 20 fps, 640x480) until `q` is pressed
//!   let summary = capture::record(&capture::CaptureConfig::default())?;
//!   println!("{} frames recorded", summary.frames_written);
//!   Ok(())
//! }
//! ```
//!
//! The lower layers are usable on their own: [`command::FfmpegCommand`] builds
//! an invocation, and [`child::FfmpegChild::iter`] turns the running process
//! into a stream of parsed [`event::FfmpegEvent`]s, including decoded frames.
//!
//! ```rust
//! use proctor_media::{command::FfmpegCommand, event::FfmpegEvent};
//!
//! # if !proctor_media::version::ffmpeg_is_installed() { return; }
//! let frames = FfmpegCommand::new()
//!   .args(["-f", "lavfi", "-i", "testsrc=duration=1:rate=2:size=64x48"])
//!   .rawvideo()
//!   .spawn()
//!   .unwrap()
//!   .iter()
//!   .unwrap()
//!   .filter(|event| matches!(event, FfmpegEvent::OutputFrame(_)))
//!   .count();
//! assert_eq!(frames, 2);
//! ```

#[cfg(test)]
mod test;

pub mod capture;
pub mod child;
pub mod command;
pub mod convert;
#[cfg(feature = "download_ffmpeg")]
pub mod download;
pub mod error;
pub mod event;
pub mod fourcc;
pub mod frame;
pub mod iter;
pub mod log_parser;
pub mod metadata;
pub mod paths;
pub mod version;
