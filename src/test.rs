//! End-to-end tests against a real `ffmpeg`. Each test returns early when
//! none is installed.

use std::{path::PathBuf, process::Stdio};

use crate::{
  capture::{Camera, CaptureConfig, FrameSink, VideoWriter},
  command::FfmpegCommand,
  convert::Conversion,
  error::ErrorKind,
  event::{FfmpegEvent, FfmpegProgress},
  frame::Frame,
  paths::ffmpeg_path,
  version::ffmpeg_is_installed,
};

fn skip() -> bool {
  let missing = !ffmpeg_is_installed();
  if missing {
    eprintln!("ffmpeg not installed, skipping");
  }
  missing
}

/// Whether the installed ffmpeg lists `name` under `-encoders`.
fn has_encoder(name: &str) -> bool {
  std::process::Command::new(ffmpeg_path())
    .args(["-hide_banner", "-encoders"])
    .stdin(Stdio::null())
    .stderr(Stdio::null())
    .output()
    .map(|out| {
      String::from_utf8_lossy(&out.stdout)
        .lines()
        .any(|line| line.split_whitespace().nth(1) == Some(name))
    })
    .unwrap_or(false)
}

fn temp_path(name: &str) -> PathBuf {
  let path = std::env::temp_dir().join(format!("proctor-media-{name}"));
  let _ = std::fs::remove_file(&path);
  path
}

/// Render one second (25 frames) of `testsrc` at 160x120 for conversions
/// to read.
fn make_clip(name: &str) -> PathBuf {
  let path = temp_path(name);
  let mut child = FfmpegCommand::new()
    .hide_banner()
    .testsrc()
    .video_filter("scale=160:120")
    .frames(25)
    .codec_video("mpeg4")
    .output(&path)
    .spawn()
    .unwrap();
  child.iter().unwrap().for_each(drop);
  assert!(child.wait().unwrap().success());
  path
}

#[test]
fn test_rawvideo_frames() {
  if skip() {
    return;
  }
  let frames: Vec<Frame> = FfmpegCommand::new()
    .testsrc()
    .frames(5)
    .rawvideo()
    .spawn()
    .unwrap()
    .iter()
    .unwrap()
    .filter_frames()
    .collect();

  assert_eq!(frames.len(), 5);
  for (i, frame) in frames.iter().enumerate() {
    assert_eq!(frame.frame_num, i as u32);
    assert_eq!(frame.dimensions(), (320, 240));
    assert_eq!(frame.data.len(), 320 * 240 * 3);
  }
}

#[test]
fn test_progress_reaches_last_frame() {
  if skip() {
    return;
  }
  let input = make_clip("progress-in.avi");
  let output = temp_path("progress-out.avi");
  let progress: Vec<FfmpegProgress> = FfmpegCommand::new()
    .input(&input)
    .codec_video("mpeg4")
    .output(&output)
    .spawn()
    .unwrap()
    .iter()
    .unwrap()
    .filter_progress()
    .collect();

  assert_eq!(progress.last().map(|p| p.frame), Some(25));

  std::fs::remove_file(input).ok();
  std::fs::remove_file(output).ok();
}

#[test]
fn test_default_h264_conversion_or_skip() {
  if skip() {
    return;
  }
  if !has_encoder("libx264") || !has_encoder("aac") {
    eprintln!("ffmpeg lacks libx264 or aac, skipping");
    return;
  }
  let input = make_clip("default-in.avi");
  let output = temp_path("default-out.mp4");

  let conversion = Conversion::new(&input, &output);
  assert!(conversion.run_and_report());
  assert!(output.metadata().unwrap().len() > 0);

  let mut cmd = FfmpegCommand::new();
  cmd.input(&output).rawvideo();
  let mut reader = cmd.spawn().unwrap();
  let codecs: Vec<String> = reader
    .iter()
    .unwrap()
    .filter_map(|e| match e {
      FfmpegEvent::ParsedInputStream(stream) if stream.is_video() => Some(stream.format),
      _ => None,
    })
    .collect();
  reader.wait().unwrap();
  assert_eq!(codecs, vec!["h264"]);

  std::fs::remove_file(input).ok();
  std::fs::remove_file(output).ok();
}

#[test]
fn test_convert_clip() {
  if skip() {
    return;
  }
  let input = make_clip("convert-in.avi");
  let output = temp_path("convert-out.mp4");

  // Not every build has libx264; mpeg4 keeps the pipeline under test.
  let report = Conversion {
    video_codec: "mpeg4".to_string(),
    ..Conversion::new(&input, &output)
  }
  .run()
  .unwrap();

  assert_eq!(report.output, output);
  assert_eq!(report.frames, Some(25));
  assert!(output.metadata().unwrap().len() > 0);
  assert!(report.duration.is_some_and(|d| (d - 1.0).abs() < 0.1));

  std::fs::remove_file(input).ok();
  std::fs::remove_file(output).ok();
}

#[test]
fn test_existing_output_without_overwrite_fails() {
  if skip() {
    return;
  }
  let input = make_clip("no-overwrite-in.avi");
  let output = temp_path("no-overwrite-out.mp4");
  std::fs::write(&output, b"keep me").unwrap();

  let err = Conversion::new(&input, &output).run().unwrap_err();
  assert!(matches!(err.kind, ErrorKind::ExitStatus(Some(code)) if code != 0));
  assert_eq!(std::fs::read(&output).unwrap(), b"keep me");

  std::fs::remove_file(input).ok();
  std::fs::remove_file(output).ok();
}

#[test]
fn test_missing_input_is_reported() {
  if skip() {
    return;
  }
  let output = temp_path("missing-input-out.mp4");
  let conversion = Conversion::new("./definitely-not-here.mp4", &output);
  let err = conversion.run().unwrap_err();
  assert!(matches!(err.kind, ErrorKind::ExitStatus(_)));
  assert!(err.to_string().contains("definitely-not-here.mp4"));
  assert!(!conversion.run_and_report());
  assert!(!output.exists());

  let errors: Vec<String> = conversion
    .command()
    .spawn()
    .unwrap()
    .iter()
    .unwrap()
    .filter_errors()
    .collect();
  assert!(errors.iter().any(|e| e.contains("definitely-not-here.mp4")));
}

#[test]
fn test_quit_finalizes_output() {
  if skip() {
    return;
  }
  let output = temp_path("quit.avi");
  let mut child = FfmpegCommand::new()
    .testsrc()
    .codec_video("mpeg4")
    .output(&output)
    .spawn()
    .unwrap();
  let mut iter = child.iter().unwrap();

  // testsrc never ends on its own
  assert!(iter
    .by_ref()
    .any(|event| matches!(event, FfmpegEvent::Progress(_))));
  child.quit().unwrap();
  iter.for_each(drop);

  assert!(child.wait().unwrap().success());
  assert!(output.metadata().unwrap().len() > 0);
  std::fs::remove_file(output).ok();
}

#[test]
fn test_missing_camera() {
  if skip() {
    return;
  }
  let err = Camera::open(99).err().unwrap();
  assert_eq!(err.kind, ErrorKind::Device);
}

#[test]
fn test_writer_produces_file() {
  if skip() {
    return;
  }
  let output = temp_path("writer.avi");
  let config = CaptureConfig {
    output: output.clone(),
    ..CaptureConfig::default()
  };

  let mut writer = VideoWriter::create(&config).unwrap();
  for shade in 0..10u8 {
    let frame = Frame::rgb24(640, 480, vec![shade * 20; 640 * 480 * 3]).unwrap();
    writer.write_frame(&frame).unwrap();
  }
  writer.release().unwrap();
  assert_eq!(writer.frames_written(), 10);

  let mut cmd = FfmpegCommand::new();
  cmd.input(&output).rawvideo();
  let mut reader = cmd.spawn().unwrap();
  let events: Vec<FfmpegEvent> = reader.iter().unwrap().collect();
  let streams: Vec<_> = events
    .iter()
    .filter_map(|e| match e {
      FfmpegEvent::ParsedInputStream(stream) => stream.video_data().cloned(),
      _ => None,
    })
    .collect();
  assert_eq!(streams.len(), 1);
  assert_eq!((streams[0].width, streams[0].height), (640, 480));
  let frames = events
    .iter()
    .filter(|e| matches!(e, FfmpegEvent::OutputFrame(_)))
    .count();
  assert_eq!(frames, 10);
  reader.wait().unwrap();

  std::fs::remove_file(output).ok();
}
