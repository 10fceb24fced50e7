//! Parsing of FFmpeg's stderr log output into [`FfmpegEvent`]s.

use std::{
  io::{BufRead, BufReader, ErrorKind, Read},
  str::from_utf8,
};

use crate::event::{
  AudioStream, FfmpegConfiguration, FfmpegDuration, FfmpegEvent, FfmpegInput, FfmpegOutput,
  FfmpegProgress, FfmpegVersion, LogLevel, Stream, StreamDetails, VideoStream,
};

/// Which header the most recent lines were printed under. Stream and
/// duration lines mean different things depending on it.
#[derive(Debug, Clone, Copy, PartialEq)]
enum LogSection {
  Input(u32),
  Output(u32),
  StreamMapping,
  Other,
}

pub struct FfmpegLogParser<R: Read> {
  reader: BufReader<R>,
  section: LogSection,
}

impl<R: Read> FfmpegLogParser<R> {
  pub fn new(inner: R) -> Self {
    Self {
      reader: BufReader::new(inner),
      section: LogSection::Other,
    }
  }

  /// Consume one line from the inner reader and classify it.
  ///
  /// Lines may be terminated by `\n`, `\r\n` or a bare `\r` (progress
  /// updates overwrite the previous line that way). Returns
  /// [`FfmpegEvent::LogEOF`] once the reader is exhausted.
  pub fn parse_next_event(&mut self) -> anyhow::Result<FfmpegEvent> {
    let mut buf = Vec::new();
    if read_line_any(&mut self.reader, &mut buf)? == 0 {
      return Ok(FfmpegEvent::LogEOF);
    }
    let line = from_utf8(&buf)?.trim();
    Ok(self.classify(line))
  }

  fn classify(&mut self, line: &str) -> FfmpegEvent {
    let (level, body) = split_level(line);
    let raw_log_message = line.to_string();

    if let Some(index) = try_parse_input(body) {
      self.section = LogSection::Input(index);
      return FfmpegEvent::ParsedInput(FfmpegInput {
        index,
        duration: None,
        raw_log_message,
      });
    }
    if let Some(output) = try_parse_output(line) {
      self.section = LogSection::Output(output.index);
      return FfmpegEvent::ParsedOutput(output);
    }
    if body.starts_with("Stream mapping:") {
      self.section = LogSection::StreamMapping;
      return FfmpegEvent::Log(level, raw_log_message);
    }

    if let Some(version) = try_parse_version(body) {
      return FfmpegEvent::ParsedVersion(FfmpegVersion {
        version,
        raw_log_message,
      });
    }
    if let Some(configuration) = try_parse_configuration(body) {
      return FfmpegEvent::ParsedConfiguration(FfmpegConfiguration {
        configuration,
        raw_log_message,
      });
    }

    match self.section {
      LogSection::Input(input_index) => {
        if let Some(duration) = try_parse_duration(body) {
          return FfmpegEvent::ParsedDuration(FfmpegDuration {
            input_index,
            duration,
            raw_log_message,
          });
        }
        if let Some(stream) = try_parse_stream(line) {
          return FfmpegEvent::ParsedInputStream(stream);
        }
      }
      LogSection::Output(_) => {
        if let Some(stream) = try_parse_stream(line) {
          return FfmpegEvent::ParsedOutputStream(stream);
        }
      }
      LogSection::StreamMapping => {
        if body.starts_with("Stream #") {
          return FfmpegEvent::ParsedStreamMapping(raw_log_message);
        }
      }
      LogSection::Other => {}
    }

    if let Some(progress) = try_parse_progress(line) {
      self.section = LogSection::Other;
      return FfmpegEvent::Progress(progress);
    }

    FfmpegEvent::Log(level, raw_log_message)
  }
}

/// Reads up to and including the next `\r` or `\n`, skipping any line
/// terminators left over at the start so `\r\n` never yields an empty line.
/// Returns the number of bytes consumed, 0 at end of input.
fn read_line_any<R: BufRead + ?Sized>(r: &mut R, buf: &mut Vec<u8>) -> std::io::Result<usize> {
  let is_delim = |b: &u8| *b == b'\r' || *b == b'\n';
  let mut total = 0;
  loop {
    let available = match r.fill_buf() {
      Ok(available) => available,
      Err(e) if e.kind() == ErrorKind::Interrupted => continue,
      Err(e) => return Err(e),
    };
    if available.is_empty() {
      // Only terminators were left; treat as end of input.
      return Ok(if buf.is_empty() { 0 } else { total });
    }

    let skip = if buf.is_empty() {
      available.iter().take_while(|b| is_delim(b)).count()
    } else {
      0
    };
    match available[skip..].iter().position(is_delim) {
      Some(pos) => {
        let end = skip + pos + 1;
        buf.extend_from_slice(&available[skip..end]);
        r.consume(end);
        return Ok(total + end);
      }
      None => {
        let len = available.len();
        buf.extend_from_slice(&available[skip..]);
        r.consume(len);
        total += len;
      }
    }
  }
}

/// Splits the `[level]` prefix added by `-loglevel level+info` from the rest
/// of the line.
///
/// ```rust
/// use proctor_media::{event::LogLevel, log_parser::split_level};
/// assert_eq!(split_level("[error] objects1.mp4: No such file or directory"),
///   (LogLevel::Error, "objects1.mp4: No such file or directory"));
/// assert_eq!(split_level("no prefix"), (LogLevel::Unknown, "no prefix"));
/// ```
pub fn split_level(line: &str) -> (LogLevel, &str) {
  let line = line.trim();
  let Some(rest) = line.strip_prefix('[') else {
    return (LogLevel::Unknown, line);
  };
  let Some((tag, body)) = rest.split_once(']') else {
    return (LogLevel::Unknown, line);
  };
  let level = match tag {
    "info" | "verbose" | "debug" | "trace" => LogLevel::Info,
    "warning" => LogLevel::Warning,
    "error" => LogLevel::Error,
    "fatal" | "panic" => LogLevel::Fatal,
    _ => return (LogLevel::Unknown, line),
  };
  (level, body.trim())
}

fn strip_level(line: &str) -> &str {
  split_level(line).1
}

/// Parses the version from the first line of `ffmpeg`/`ffplay` output.
///
/// ```rust
/// use proctor_media::log_parser::try_parse_version;
/// let line = "[info] ffmpeg version 6.1.1-3ubuntu5 Copyright (c) 2000-2023 the FFmpeg developers";
/// assert_eq!(try_parse_version(line).as_deref(), Some("6.1.1-3ubuntu5"));
/// ```
pub fn try_parse_version(line: &str) -> Option<String> {
  let body = strip_level(line);
  let rest = ["ffmpeg version ", "ffplay version ", "ffprobe version "]
    .iter()
    .find_map(|prefix| body.strip_prefix(prefix))?;
  rest.split_whitespace().next().map(str::to_string)
}

/// Parses the build flags listed on the `configuration:` line.
pub fn try_parse_configuration(line: &str) -> Option<Vec<String>> {
  strip_level(line)
    .strip_prefix("configuration:")
    .map(|flags| flags.split_whitespace().map(str::to_string).collect())
}

/// Index of an `Input #N, ...` section header.
///
/// ```rust
/// use proctor_media::log_parser::try_parse_input;
/// assert_eq!(try_parse_input("[info] Input #0, video4linux2,v4l2, from '/dev/video0':"), Some(0));
/// ```
pub fn try_parse_input(line: &str) -> Option<u32> {
  parse_section_index(strip_level(line).strip_prefix("Input #")?)
}

/// An `Output #N, format, to 'target':` section header.
///
/// ```rust
/// use proctor_media::log_parser::try_parse_output;
/// let output = try_parse_output("[info] Output #0, rawvideo, to 'pipe:':").unwrap();
/// assert_eq!(output.index, 0);
/// assert!(output.is_stdout());
/// ```
pub fn try_parse_output(line: &str) -> Option<FfmpegOutput> {
  let rest = strip_level(line).strip_prefix("Output #")?;
  let index = parse_section_index(rest)?;
  let (_, target) = rest.split_once(" to '")?;
  let to = target.rsplit_once('\'')?.0.to_string();
  Some(FfmpegOutput {
    index,
    to,
    raw_log_message: line.to_string(),
  })
}

fn parse_section_index(rest: &str) -> Option<u32> {
  rest.split(',').next()?.trim().parse().ok()
}

/// Seconds from a `Duration: HH:MM:SS.ss, ...` line. `None` for `N/A`.
pub fn try_parse_duration(line: &str) -> Option<f64> {
  strip_level(line)
    .strip_prefix("Duration:")?
    .split(',')
    .next()
    .and_then(|t| parse_time_str(t.trim()))
}

/// Parses a `Stream #p:s...: Type: format, ...` description line.
///
/// ```rust
/// use proctor_media::log_parser::try_parse_stream;
/// let line = "[info]   Stream #0:0: Video: rawvideo (YUY2 / 0x32595559), yuyv422, 1280x720, 147456 kb/s, 10 fps, 10 tbr, 1000k tbn";
/// let stream = try_parse_stream(line).unwrap();
/// let video = stream.video_data().unwrap();
/// assert_eq!(stream.format, "rawvideo");
/// assert_eq!((video.width, video.height), (1280, 720));
/// assert_eq!(video.pix_fmt, "yuyv422");
/// assert_eq!(video.fps, 10.0);
/// ```
pub fn try_parse_stream(line: &str) -> Option<Stream> {
  let rest = strip_level(line).strip_prefix("Stream #")?;
  let mut parts = CommaSplit::new(rest);

  // `0:1[0x3](eng): Video: h264 (High)`
  let mut head = parts.next()?.splitn(4, ':');
  let parent_index = head.next()?.trim().parse().ok()?;
  let index_and_language = head.next()?;
  let stream_type = head.next()?.trim();
  let format = head
    .next()?
    .trim()
    .split([' ', '('])
    .next()?
    .to_string();

  let without_id: String = index_and_language
    .split(['[', ']'])
    .step_by(2)
    .collect();
  let (index_str, language) = match without_id.split_once('(') {
    Some((index, lang)) => (index.to_string(), lang.trim_end_matches(')').to_string()),
    None => (without_id.clone(), String::new()),
  };
  let stream_index = index_str.trim().parse().ok()?;

  let details = match stream_type {
    "Video" => StreamDetails::Video(parse_video_details(parts)?),
    "Audio" => StreamDetails::Audio(parse_audio_details(parts)?),
    "Subtitle" => StreamDetails::Subtitle,
    _ => StreamDetails::Other,
  };

  Some(Stream {
    format,
    language,
    parent_index,
    stream_index,
    details,
    raw_log_message: line.to_string(),
  })
}

fn parse_video_details(mut parts: CommaSplit) -> Option<VideoStream> {
  let pix_fmt = parts
    .next()?
    .trim()
    .split([' ', '('])
    .next()?
    .to_string();
  let (width, height) = parts.next()?.split_whitespace().next()?.split_once('x')?;
  let width = width.parse().ok()?;
  let height = height.parse().ok()?;
  // Bitrate, SAR and quality sections may come before the frame rate.
  let fps = parts
    .find_map(|part| part.trim().strip_suffix("fps"))
    .and_then(|fps| fps.trim().parse().ok())?;
  Some(VideoStream {
    pix_fmt,
    width,
    height,
    fps,
  })
}

fn parse_audio_details(mut parts: CommaSplit) -> Option<AudioStream> {
  let sample_rate = parts.next()?.split_whitespace().next()?.parse().ok()?;
  let channels = parts.next()?.trim().to_string();
  Some(AudioStream {
    sample_rate,
    channels,
  })
}

/// Parses a `frame=... fps=... size=... time=... speed=...` progress line.
///
/// ```rust
/// use proctor_media::log_parser::try_parse_progress;
/// let line = "[info] frame=  120 fps= 20 q=-0.0 size=    1024KiB time=00:00:06.00 bitrate=1398.1kbits/s speed=1.01x";
/// let progress = try_parse_progress(line).unwrap();
/// assert_eq!(progress.frame, 120);
/// assert_eq!(progress.size_kb, 1024);
/// assert_eq!(progress.time, "00:00:06.00");
/// assert_eq!(progress.speed, 1.01);
/// ```
pub fn try_parse_progress(line: &str) -> Option<FfmpegProgress> {
  let body = strip_level(line);
  let field = |key: &str| -> Option<&str> {
    // `size=` also matches the final `Lsize=` summary line.
    body.split(key).nth(1)?.split_whitespace().next()
  };

  let frame = field("frame=")?.parse().ok()?;
  let fps = field("fps=")?.parse().unwrap_or(0.0);
  let size_kb = field("size=")
    .and_then(|s| s.strip_suffix("KiB").or_else(|| s.strip_suffix("kB")))
    .and_then(|s| s.parse().ok())
    .unwrap_or(0);
  let time = field("time=")?.to_string();
  let speed = field("speed=")
    .and_then(|s| s.strip_suffix('x'))
    .and_then(|s| s.parse().ok())
    .unwrap_or(0.0);

  Some(FfmpegProgress {
    frame,
    fps,
    size_kb,
    time,
    speed,
    raw_log_message: line.to_string(),
  })
}

/// Parse a time string in the format `HOURS:MM:SS.MILLISECONDS` into a number of seconds.
///
/// ```rust
/// use proctor_media::log_parser::parse_time_str;
/// assert_eq!(parse_time_str("00:00:05.00"), Some(5.0));
/// assert_eq!(parse_time_str("1:01:01.5"), Some(3661.5));
/// assert_eq!(parse_time_str("N/A"), None);
/// ```
pub fn parse_time_str(s: &str) -> Option<f64> {
  s.split(':')
    .try_fold(0.0, |acc, part| Some(acc * 60.0 + part.parse::<f64>().ok()?))
}

/// Splits on commas that are not inside parentheses, so
/// `yuv420p(tv, bt709), 1280x720` yields two parts.
struct CommaSplit<'a> {
  rest: &'a str,
}

impl<'a> CommaSplit<'a> {
  fn new(s: &'a str) -> Self {
    Self { rest: s }
  }
}

impl<'a> Iterator for CommaSplit<'a> {
  type Item = &'a str;

  fn next(&mut self) -> Option<&'a str> {
    if self.rest.is_empty() {
      return None;
    }
    let mut depth = 0u32;
    for (i, c) in self.rest.char_indices() {
      match c {
        '(' => depth += 1,
        ')' => depth = depth.saturating_sub(1),
        ',' if depth == 0 => {
          let part = &self.rest[..i];
          self.rest = &self.rest[i + 1..];
          return Some(part);
        }
        _ => {}
      }
    }
    let part = self.rest;
    self.rest = "";
    Some(part)
  }
}
