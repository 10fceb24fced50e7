use std::{
  collections::VecDeque,
  io::{BufReader, ErrorKind, Read},
  process::{ChildStderr, ChildStdout},
  sync::mpsc::{sync_channel, Receiver, SyncSender},
  thread::JoinHandle,
};

use anyhow::Context;

use crate::{
  child::FfmpegChild,
  event::{FfmpegEvent, FfmpegProgress, LogLevel, VideoStream},
  frame::{bytes_per_frame, Frame},
  log_parser::FfmpegLogParser,
  metadata::FfmpegMetadata,
};

/// An iterator over events from an ffmpeg process, including parsed
/// metadata, progress, log lines and raw video frames.
///
/// Both pipes are drained on background threads that hand events over
/// through a rendezvous channel, so ffmpeg advances at the pace the
/// iterator is consumed.
pub struct FfmpegIterator {
  rx: Receiver<FfmpegEvent>,
  tx: Option<SyncSender<FfmpegEvent>>,
  stdout: Option<ChildStdout>,
  metadata: FfmpegMetadata,
  pending: VecDeque<FfmpegEvent>,
}

impl FfmpegIterator {
  pub fn new(child: &mut FfmpegChild) -> anyhow::Result<Self> {
    let stderr = child.take_stderr().context(
      "No stderr channel\n - Did you call `take_stderr` elsewhere?\n - Was stderr left as `Stdio::piped()`?",
    )?;
    let (tx, rx) = sync_channel::<FfmpegEvent>(0);
    spawn_stderr_thread(stderr, tx.clone());
    let stdout = child.take_stdout();

    Ok(Self {
      rx,
      tx: Some(tx),
      stdout,
      metadata: FfmpegMetadata::new(),
      pending: VecDeque::new(),
    })
  }

  /// Called once all output streams are described. Starts slicing stdout
  /// into frames when a rawvideo stream is written there; otherwise stdout
  /// is left unread.
  fn start_stdout(&mut self) -> anyhow::Result<()> {
    let tx = self.tx.take().context("missing channel tx")?;
    let Some(stdout) = self.stdout.take() else {
      return Ok(());
    };
    let Some(stream) = self.metadata.stdout_video_stream() else {
      return Ok(());
    };

    if stream.format != "rawvideo" {
      anyhow::bail!(
        "Only rawvideo output on stdout can be split into frames, got {}",
        stream.format
      );
    }
    let video = stream
      .video_data()
      .context("stdout stream has no video details")?
      .clone();
    let frame_size = bytes_per_frame(&video.pix_fmt, video.width, video.height)
      .with_context(|| format!("Unsupported pixel format on stdout: {}", video.pix_fmt))?;

    spawn_stdout_thread(stdout, tx, video, frame_size);
    Ok(())
  }

  /// Advance the iterator until all metadata has been collected, returning
  /// it. Events consumed along the way are replayed by later calls to
  /// `next`.
  pub fn collect_metadata(&mut self) -> anyhow::Result<FfmpegMetadata> {
    let mut seen = Vec::new();

    while !self.metadata.is_completed() {
      match self.next() {
        Some(event) => seen.push(event),
        None => {
          let errors = seen
            .iter()
            .filter_map(error_message)
            .collect::<Vec<_>>()
            .join("; ");
          anyhow::bail!("ffmpeg exited before describing its outputs: {errors}")
        }
      }
    }

    let rest = std::mem::take(&mut self.pending);
    self.pending = seen.into();
    self.pending.extend(rest);
    Ok(self.metadata.clone())
  }

  pub fn metadata(&self) -> &FfmpegMetadata {
    &self.metadata
  }

  //// Iterator filters

  /// Error messages, from the logs (`[error]`, `[fatal]`) or from reading
  /// the pipes.
  pub fn filter_errors(self) -> impl Iterator<Item = String> {
    self.filter_map(|event| error_message(&event))
  }

  pub fn filter_progress(self) -> impl Iterator<Item = FfmpegProgress> {
    self.filter_map(|event| match event {
      FfmpegEvent::Progress(p) => Some(p),
      _ => None,
    })
  }

  pub fn filter_frames(self) -> impl Iterator<Item = Frame> {
    self.filter_map(|event| match event {
      FfmpegEvent::OutputFrame(frame) => Some(frame),
      _ => None,
    })
  }
}

/// The message carried by an error event, if `event` is one.
pub fn error_message(event: &FfmpegEvent) -> Option<String> {
  match event {
    FfmpegEvent::Error(e) => Some(e.clone()),
    FfmpegEvent::Log(level, line) if level.is_error() => Some(line.clone()),
    _ => None,
  }
}

/// Re-emit an event from the `tool` process through `tracing` at a
/// matching level. Frames and metadata bookkeeping events are skipped.
pub fn trace_event(tool: &str, event: &FfmpegEvent) {
  match event {
    FfmpegEvent::Log(LogLevel::Error | LogLevel::Fatal, line) => {
      tracing::error!(tool, "{line}")
    }
    FfmpegEvent::Log(LogLevel::Warning, line) => tracing::warn!(tool, "{line}"),
    FfmpegEvent::Log(_, line) => tracing::debug!(tool, "{line}"),
    FfmpegEvent::Error(e) => tracing::error!(tool, "{e}"),
    FfmpegEvent::Progress(p) => tracing::debug!(
      tool,
      frame = p.frame,
      fps = p.fps,
      time = %p.time,
      speed = p.speed,
      "progress"
    ),
    FfmpegEvent::ParsedVersion(v) => tracing::debug!(tool, version = %v.version, "version"),
    FfmpegEvent::ParsedInputStream(s) | FfmpegEvent::ParsedOutputStream(s) => {
      tracing::debug!(tool, "{}", s.raw_log_message)
    }
    _ => {}
  }
}

impl Iterator for FfmpegIterator {
  type Item = FfmpegEvent;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(event) = self.pending.pop_front() {
      return Some(event);
    }

    let event = self.rx.recv().ok()?;

    if let FfmpegEvent::LogEOF = event {
      self.tx.take(); // drop the tx so that the receiver can close
    }

    if !self.metadata.is_completed() {
      let started = self
        .metadata
        .handle_event(&event)
        .map_err(anyhow::Error::from)
        .and_then(|()| match self.metadata.is_completed() {
          true => self.start_stdout(),
          false => Ok(()),
        });
      if let Err(e) = started {
        self.pending.push_back(event);
        return Some(FfmpegEvent::Error(format!("{e:#}")));
      }
    }

    Some(event)
  }
}

/// Spawn a thread slicing ffmpeg's stdout into frames of `frame_size`
/// bytes.
pub fn spawn_stdout_thread(
  stdout: ChildStdout,
  tx: SyncSender<FfmpegEvent>,
  video: VideoStream,
  frame_size: usize,
) -> JoinHandle<()> {
  std::thread::spawn(move || {
    let mut reader = BufReader::new(stdout);
    let mut frame_num = 0u32;
    loop {
      let mut data = vec![0u8; frame_size];
      match reader.read_exact(&mut data) {
        Ok(()) => {
          let timestamp = match video.fps > 0.0 {
            true => frame_num as f32 / video.fps,
            false => 0.0,
          };
          let frame = Frame {
            width: video.width,
            height: video.height,
            pix_fmt: video.pix_fmt.clone(),
            data,
            frame_num,
            timestamp,
          };
          if tx.send(FfmpegEvent::OutputFrame(frame)).is_err() {
            return;
          }
          frame_num += 1;
        }
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
        Err(e) => {
          tx.send(FfmpegEvent::Error(e.to_string())).ok();
          break;
        }
      }
    }
    tx.send(FfmpegEvent::Done).ok();
  })
}

/// Spawn a thread which reads and parses lines from ffmpeg's stderr channel.
/// The cadence is controlled by the synchronous `tx` channel, which blocks
/// until a receiver is ready to receive the next event.
pub fn spawn_stderr_thread(stderr: ChildStderr, tx: SyncSender<FfmpegEvent>) -> JoinHandle<()> {
  std::thread::spawn(move || {
    let mut parser = FfmpegLogParser::new(stderr);
    loop {
      match parser.parse_next_event() {
        Ok(FfmpegEvent::LogEOF) => {
          tx.send(FfmpegEvent::LogEOF).ok();
          break;
        }
        Ok(event) => {
          if tx.send(event).is_err() {
            break;
          }
        }
        Err(e) if e.is::<std::io::Error>() => {
          tracing::warn!("Error reading ffmpeg output: {e:#}");
          tx.send(FfmpegEvent::LogEOF).ok();
          break;
        }
        Err(e) => {
          tracing::warn!("Error parsing ffmpeg output: {e:#}");
          tx.send(FfmpegEvent::Log(LogLevel::Unknown, e.to_string()))
            .ok();
        }
      };
    }
  })
}
