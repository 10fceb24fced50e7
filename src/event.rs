//! Events parsed from a running FFmpeg process.

use crate::frame::Frame;

#[derive(Debug, Clone, PartialEq)]
pub enum FfmpegEvent {
  ParsedVersion(FfmpegVersion),
  ParsedConfiguration(FfmpegConfiguration),
  ParsedStreamMapping(String),
  ParsedInput(FfmpegInput),
  ParsedOutput(FfmpegOutput),
  ParsedInputStream(Stream),
  ParsedOutputStream(Stream),
  ParsedDuration(FfmpegDuration),
  Log(LogLevel, String),
  LogEOF,
  /// An error that didn't originate from the ffmpeg logs
  Error(String),
  Progress(FfmpegProgress),
  OutputFrame(Frame),
  Done,
}

/// Level prefix emitted by `-loglevel level+info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
  Info,
  Warning,
  Error,
  Fatal,
  Unknown,
}

impl LogLevel {
  pub fn is_error(&self) -> bool {
    matches!(self, LogLevel::Error | LogLevel::Fatal)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
  pub index: u32,
  pub duration: Option<f64>,
  pub raw_log_message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegDuration {
  pub input_index: u32,
  pub duration: f64,
  pub raw_log_message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegOutput {
  pub to: String,
  pub index: u32,
  pub raw_log_message: String,
}

impl FfmpegOutput {
  /// Detects one of several identifiers which indicate output to stdout
  pub fn is_stdout(&self) -> bool {
    ["pipe", "pipe:", "pipe:1", "-"].contains(&self.to.as_str())
  }
}

/// One `Stream #i:j` line from an input or output section.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
  /// Codec or container format, e.g. `rawvideo`, `h264`, `aac`
  pub format: String,
  /// Language tag in parentheses, empty if absent
  pub language: String,
  /// The index of the input or output that this stream belongs to
  pub parent_index: u32,
  /// Index of the stream within its parent
  pub stream_index: u32,
  pub details: StreamDetails,
  /// The stderr line that this stream was parsed from
  pub raw_log_message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamDetails {
  Video(VideoStream),
  Audio(AudioStream),
  Subtitle,
  Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoStream {
  /// Corresponds to stream `-pix_fmt` parameter, e.g. `rgb24`
  pub pix_fmt: String,
  pub width: u32,
  pub height: u32,
  pub fps: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AudioStream {
  pub sample_rate: u32,
  /// e.g. `mono`, `stereo`, `5.1`
  pub channels: String,
}

impl Stream {
  pub fn is_video(&self) -> bool {
    matches!(self.details, StreamDetails::Video(_))
  }

  pub fn video_data(&self) -> Option<&VideoStream> {
    match &self.details {
      StreamDetails::Video(v) => Some(v),
      _ => None,
    }
  }

  pub fn audio_data(&self) -> Option<&AudioStream> {
    match &self.details {
      StreamDetails::Audio(a) => Some(a),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegVersion {
  pub version: String,
  pub raw_log_message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegConfiguration {
  pub configuration: Vec<String>,
  pub raw_log_message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegProgress {
  /// index of the current output frame
  pub frame: u32,

  /// frames per second
  pub fps: f32,

  /// Current total size of the output in kilobytes
  pub size_kb: u32,

  /// The raw time string in a format like `00:03:29.04`
  pub time: String,

  /// Processing speed as a ratio of the input duration; 1x is realtime
  pub speed: f32,

  /// The line that this progress was parsed from
  pub raw_log_message: String,
}
