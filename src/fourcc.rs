//! Four-character codec tags and the FFmpeg encoders that produce them.

use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// A four-character code naming a video codec inside a container, e.g.
/// `XVID`, `MJPG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC([u8; 4]);

impl FourCC {
  pub const XVID: FourCC = FourCC(*b"XVID");

  pub fn new(code: [u8; 4]) -> Result<Self> {
    if !code.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
      return Err(Error::invalid_input(format!(
        "FourCC must be printable ASCII, got {code:?}"
      )));
    }
    Ok(Self(code))
  }

  pub fn as_str(&self) -> &str {
    // Printable ASCII is checked in `new`.
    std::str::from_utf8(&self.0).unwrap_or("????")
  }

  /// The packed little-endian integer form used by container headers.
  ///
  /// ```rust
  /// use proctor_media::fourcc::FourCC;
  /// assert_eq!(FourCC::XVID.to_u32(), 0x4449_5658);
  /// ```
  pub fn to_u32(&self) -> u32 {
    u32::from_le_bytes(self.0)
  }

  /// The FFmpeg encoder writing streams with this tag. Unknown tags use
  /// `mpeg4`, with the tag itself forced through `-vtag`.
  ///
  /// ```rust
  /// use proctor_media::fourcc::FourCC;
  /// assert_eq!(FourCC::XVID.encoder(), "mpeg4");
  /// assert_eq!("MJPG".parse::<FourCC>().unwrap().encoder(), "mjpeg");
  /// ```
  pub fn encoder(&self) -> &'static str {
    match &self.0.map(|b| b.to_ascii_uppercase()) {
      b"XVID" | b"DIVX" | b"DX50" | b"FMP4" | b"MP4V" => "mpeg4",
      b"MJPG" => "mjpeg",
      b"H264" | b"X264" | b"AVC1" => "libx264",
      b"HEVC" | b"HVC1" | b"X265" => "libx265",
      b"VP80" => "libvpx",
      b"VP90" => "libvpx-vp9",
      b"FFV1" => "ffv1",
      b"MPG2" => "mpeg2video",
      _ => "mpeg4",
    }
  }

  /// Pixel format the encoder expects, converted from the RGB24 input.
  pub fn encoder_pix_fmt(&self) -> &'static str {
    match self.encoder() {
      "mjpeg" => "yuvj420p",
      "ffv1" => "bgr0",
      _ => "yuv420p",
    }
  }
}

impl FromStr for FourCC {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let code: [u8; 4] = s.as_bytes().try_into().map_err(|_| {
      Error::invalid_input(format!(
        "FourCC must be exactly four characters, got {s:?}"
      ))
    })?;
    Self::new(code)
  }
}

impl fmt::Display for FourCC {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse() {
    let fourcc: FourCC = "XVID".parse().unwrap();
    assert_eq!(fourcc, FourCC::XVID);
    assert_eq!(fourcc.to_string(), "XVID");
  }

  #[test]
  fn test_wrong_length_rejected() {
    for bad in ["", "XVI", "XVIDX", "ÄBC"] {
      assert!(bad.parse::<FourCC>().is_err(), "{bad:?} should be rejected");
    }
  }

  #[test]
  fn test_non_printable_rejected() {
    assert!(FourCC::new([b'X', 0, b'I', b'D']).is_err());
  }

  #[test]
  fn test_encoder_is_case_insensitive() {
    assert_eq!("avc1".parse::<FourCC>().unwrap().encoder(), "libx264");
    assert_eq!("H264".parse::<FourCC>().unwrap().encoder(), "libx264");
  }

  #[test]
  fn test_unknown_tag_falls_back_to_mpeg4() {
    let fourcc: FourCC = "ABCD".parse().unwrap();
    assert_eq!(fourcc.encoder(), "mpeg4");
    assert_eq!(fourcc.encoder_pix_fmt(), "yuv420p");
  }
}
