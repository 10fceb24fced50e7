//! Decoded video frames and the resize applied before recording.

use image::{imageops, imageops::FilterType, ImageBuffer, Rgb};

use crate::error::{Error, Result};

/// One decoded image, packed row-major with no padding.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  pub width: u32,
  pub height: u32,
  /// Pixel layout as named by FFmpeg, e.g. `rgb24`
  pub pix_fmt: String,
  pub data: Vec<u8>,
  /// Zero-based position of the frame in its stream
  pub frame_num: u32,
  /// Presentation time in seconds, derived from the stream frame rate
  pub timestamp: f32,
}

impl Frame {
  /// Wrap a packed RGB24 buffer, checking its length against the
  /// dimensions.
  pub fn rgb24(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
    let expected = width as usize * height as usize * 3;
    if data.len() != expected {
      return Err(Error::invalid_input(format!(
        "rgb24 frame {width}x{height} needs {expected} bytes, got {}",
        data.len()
      )));
    }
    Ok(Self {
      width,
      height,
      pix_fmt: "rgb24".to_string(),
      data,
      frame_num: 0,
      timestamp: 0.0,
    })
  }

  pub fn dimensions(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  /// Resample to exactly `width`x`height` with bilinear filtering. A frame
  /// that already has the requested size is returned as-is.
  ///
  /// ```rust
  /// use proctor_media::frame::Frame;
  /// let frame = Frame::rgb24(1280, 720, vec![0; 1280 * 720 * 3]).unwrap();
  /// let resized = frame.resize(640, 480).unwrap();
  /// assert_eq!(resized.dimensions(), (640, 480));
  /// assert_eq!(resized.data.len(), 640 * 480 * 3);
  /// ```
  pub fn resize(self, width: u32, height: u32) -> Result<Self> {
    if self.dimensions() == (width, height) {
      return Ok(self);
    }
    if self.pix_fmt != "rgb24" {
      return Err(Error::invalid_input(format!(
        "cannot resize frames with pixel format {}",
        self.pix_fmt
      )));
    }
    if width == 0 || height == 0 {
      return Err(Error::invalid_input("target size must be non-zero"));
    }

    let Frame {
      width: src_width,
      height: src_height,
      pix_fmt,
      data,
      frame_num,
      timestamp,
    } = self;
    let src = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(src_width, src_height, data)
      .ok_or("frame buffer is smaller than its dimensions")?;
    let dst = imageops::resize(&src, width, height, FilterType::Triangle);

    Ok(Self {
      width,
      height,
      pix_fmt,
      data: dst.into_raw(),
      frame_num,
      timestamp,
    })
  }
}

/// Bytes in one frame of `pix_fmt` at the given size, for the packed and
/// planar layouts FFmpeg commonly emits as `rawvideo`. `None` for formats
/// whose size isn't known here.
pub fn bytes_per_frame(pix_fmt: &str, width: u32, height: u32) -> Option<usize> {
  let pixels = width as usize * height as usize;
  let bytes = match pix_fmt {
    "gray" | "pal8" => pixels,
    "gray16le" | "gray16be" | "yuyv422" | "uyvy422" | "yuv422p" => pixels * 2,
    "rgb24" | "bgr24" | "yuv444p" => pixels * 3,
    "rgba" | "bgra" | "argb" | "abgr" | "rgb0" | "bgr0" => pixels * 4,
    "yuv420p" | "yuvj420p" | "nv12" | "nv21" => pixels * 3 / 2,
    _ => return None,
  };
  Some(bytes)
}
