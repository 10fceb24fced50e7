use crate::error::Result;
use crate::event::{FfmpegEvent, FfmpegInput, FfmpegOutput, Stream};

/// Inputs, outputs and streams announced by FFmpeg before it starts
/// processing, gathered from the event stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FfmpegMetadata {
  expected_output_streams: usize,
  pub outputs: Vec<FfmpegOutput>,
  pub output_streams: Vec<Stream>,
  pub inputs: Vec<FfmpegInput>,
  pub input_streams: Vec<Stream>,

  /// Whether every mapped output stream has been described
  completed: bool,
}

impl FfmpegMetadata {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_completed(&self) -> bool {
    self.completed
  }

  /// Duration of the first input in seconds, when FFmpeg knows it.
  /// Live sources such as a webcam report none.
  pub fn duration(&self) -> Option<f64> {
    self.inputs.first().and_then(|input| input.duration)
  }

  /// The first video stream written to stdout, which is where raw frames
  /// are read from.
  pub fn stdout_video_stream(&self) -> Option<&Stream> {
    self.output_streams.iter().filter(|s| s.is_video()).find(|s| {
      self
        .outputs
        .iter()
        .any(|o| o.index == s.parent_index && o.is_stdout())
    })
  }

  pub fn handle_event(&mut self, event: &FfmpegEvent) -> Result<()> {
    if self.is_completed() {
      return Err("Metadata is already completed".into());
    }

    match event {
      // One mapping line per output stream; counting them tells us when
      // the last output stream has been described.
      FfmpegEvent::ParsedStreamMapping(_) => self.expected_output_streams += 1,
      FfmpegEvent::ParsedInput(input) => self.inputs.push(input.clone()),
      FfmpegEvent::ParsedOutput(output) => self.outputs.push(output.clone()),
      FfmpegEvent::ParsedDuration(duration) => {
        let input = self
          .inputs
          .iter_mut()
          .find(|i| i.index == duration.input_index)
          .ok_or("Duration reported before its input section")?;
        input.duration = Some(duration.duration);
      }
      FfmpegEvent::ParsedOutputStream(stream) => self.output_streams.push(stream.clone()),
      FfmpegEvent::ParsedInputStream(stream) => self.input_streams.push(stream.clone()),
      _ => (),
    }

    if self.expected_output_streams > 0 && self.output_streams.len() == self.expected_output_streams
    {
      self.completed = true;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::{FfmpegDuration, StreamDetails, VideoStream};

  fn video_stream(parent_index: u32, width: u32, height: u32) -> Stream {
    Stream {
      format: "rawvideo".into(),
      language: String::new(),
      parent_index,
      stream_index: 0,
      details: StreamDetails::Video(VideoStream {
        pix_fmt: "rgb24".into(),
        width,
        height,
        fps: 30.0,
      }),
      raw_log_message: String::new(),
    }
  }

  #[test]
  fn test_completes_after_all_mapped_streams() {
    let mut metadata = FfmpegMetadata::new();
    let events = [
      FfmpegEvent::ParsedInput(FfmpegInput {
        index: 0,
        duration: None,
        raw_log_message: String::new(),
      }),
      FfmpegEvent::ParsedDuration(FfmpegDuration {
        input_index: 0,
        duration: 12.0,
        raw_log_message: String::new(),
      }),
      FfmpegEvent::ParsedInputStream(video_stream(0, 1280, 720)),
      FfmpegEvent::ParsedStreamMapping("Stream #0:0 -> #0:0".into()),
      FfmpegEvent::ParsedOutput(FfmpegOutput {
        to: "pipe:".into(),
        index: 0,
        raw_log_message: String::new(),
      }),
    ];
    for event in &events {
      metadata.handle_event(event).unwrap();
      assert!(!metadata.is_completed());
    }

    metadata
      .handle_event(&FfmpegEvent::ParsedOutputStream(video_stream(0, 1280, 720)))
      .unwrap();
    assert!(metadata.is_completed());
    assert_eq!(metadata.duration(), Some(12.0));
    let stream = metadata.stdout_video_stream().unwrap();
    assert_eq!(stream.video_data().unwrap().width, 1280);

    assert!(metadata.handle_event(&FfmpegEvent::Done).is_err());
  }

  #[test]
  fn test_file_output_is_not_stdout() {
    let mut metadata = FfmpegMetadata::new();
    metadata.outputs.push(FfmpegOutput {
      to: "objects.mp4".into(),
      index: 0,
      raw_log_message: String::new(),
    });
    metadata.output_streams.push(video_stream(0, 640, 480));
    assert!(metadata.stdout_video_stream().is_none());
  }
}
