//! Text encoding and line ending detection for files on disk.
//!
//! A file is always written back with the encoding it was read with.
//! Detection looks at the byte order mark first, then checks for valid
//! UTF-8, and falls back to Latin-1 which maps every byte to a char and
//! therefore round-trips any input.

use std::fmt;

#[cfg(feature = "tracing")]
use tracing::trace;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
  #[default]
  Utf8,
  Utf8Bom,
  Utf16Le,
  Utf16Be,
  /// Fallback for bytes that are neither BOM-marked nor valid UTF-8.
  Latin1,
}

impl TextEncoding {
  pub fn detect(bytes: &[u8]) -> Self {
    let encoding = if bytes.starts_with(UTF8_BOM) {
      Self::Utf8Bom
    } else if bytes.starts_with(UTF16_LE_BOM) {
      Self::Utf16Le
    } else if bytes.starts_with(UTF16_BE_BOM) {
      Self::Utf16Be
    } else if std::str::from_utf8(bytes).is_ok() {
      Self::Utf8
    } else {
      Self::Latin1
    };

    #[cfg(feature = "tracing")]
    trace!(%encoding, "Detected encoding");

    encoding
  }

  fn bom(self) -> &'static [u8] {
    match self {
      Self::Utf8Bom => UTF8_BOM,
      Self::Utf16Le => UTF16_LE_BOM,
      Self::Utf16Be => UTF16_BE_BOM,
      Self::Utf8 | Self::Latin1 => &[],
    }
  }

  /// Decodes `bytes`, dropping the byte order mark if there is one.
  pub fn decode(self, bytes: &[u8]) -> Result<String, EncodingError> {
    let body = bytes.strip_prefix(self.bom()).unwrap_or(bytes);

    match self {
      Self::Utf8 | Self::Utf8Bom => String::from_utf8(body.to_vec()).map_err(|_| EncodingError::Malformed(self)),
      Self::Utf16Le | Self::Utf16Be => {
        if body.len() % 2 != 0 {
          return Err(EncodingError::Malformed(self));
        }
        let units: Vec<u16> = body
          .chunks_exact(2)
          .map(|pair| {
            let pair = [pair[0], pair[1]];
            if self == Self::Utf16Le {
              u16::from_le_bytes(pair)
            } else {
              u16::from_be_bytes(pair)
            }
          })
          .collect();
        String::from_utf16(&units).map_err(|_| EncodingError::Malformed(self))
      }
      Self::Latin1 => Ok(body.iter().map(|&byte| char::from(byte)).collect()),
    }
  }

  /// Encodes `text`, prefixing the byte order mark if the encoding has one.
  pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodingError> {
    let mut bytes = self.bom().to_vec();

    match self {
      Self::Utf8 | Self::Utf8Bom => bytes.extend_from_slice(text.as_bytes()),
      Self::Utf16Le => bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes)),
      Self::Utf16Be => bytes.extend(text.encode_utf16().flat_map(u16::to_be_bytes)),
      Self::Latin1 => {
        for ch in text.chars() {
          let byte = u8::try_from(u32::from(ch)).map_err(|_| EncodingError::Unrepresentable(ch))?;
          bytes.push(byte);
        }
      }
    }

    Ok(bytes)
  }
}

impl fmt::Display for TextEncoding {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Utf8 => "UTF-8",
      Self::Utf8Bom => "UTF-8 (BOM)",
      Self::Utf16Le => "UTF-16LE",
      Self::Utf16Be => "UTF-16BE",
      Self::Latin1 => "ISO-8859-1",
    };
    f.write_str(name)
  }
}

/// Line terminator used by a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
  #[default]
  Lf,
  CrLf,
}

impl LineEnding {
  /// The most common terminator in `text`; LF on a tie or without any.
  pub fn detect(text: &str) -> Self {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;
    if crlf > lf { Self::CrLf } else { Self::Lf }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Lf => "\n",
      Self::CrLf => "\r\n",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
  #[error("content is not valid {0}")]
  Malformed(TextEncoding),
  #[error("character {0:?} cannot be written in ISO-8859-1")]
  Unrepresentable(char),
}
