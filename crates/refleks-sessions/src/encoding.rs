//! Text decoding for session logs.
//!
//! The trainer has written these files as UTF-8 (with or without a BOM) and as
//! UTF-16 in either byte order, sometimes without a BOM. Detection is a
//! heuristic: a short or malformed file may be misclassified, so decoding is
//! always lossy and never fails.

use std::fs;
use std::io;
use std::path::Path;

/// Bytes sampled for the NUL-density check.
const SNIFF_LEN: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// Detected encoding plus the length of the byte-order mark to skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub encoding: TextEncoding,
    pub bom_len: usize,
}

/// Classify a byte buffer.
///
/// Order: explicit BOM (UTF-8, UTF-16LE, UTF-16BE); then, if more than 1/8 of
/// the first 512 bytes are NUL, UTF-16 with the byte order picked by whether
/// NULs sit mostly on odd (little-endian) or even (big-endian) offsets;
/// otherwise UTF-8.
pub fn detect(bytes: &[u8]) -> Detection {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return Detection {
            encoding: TextEncoding::Utf8,
            bom_len: 3,
        };
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return Detection {
            encoding: TextEncoding::Utf16Le,
            bom_len: 2,
        };
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return Detection {
            encoding: TextEncoding::Utf16Be,
            bom_len: 2,
        };
    }

    let sample = &bytes[..bytes.len().min(SNIFF_LEN)];
    if !sample.is_empty() {
        let (mut even, mut odd) = (0usize, 0usize);
        for (i, b) in sample.iter().enumerate() {
            if *b == 0 {
                if i % 2 == 0 {
                    even += 1;
                } else {
                    odd += 1;
                }
            }
        }
        if even + odd > sample.len() / 8 {
            let encoding = if odd > even {
                TextEncoding::Utf16Le
            } else {
                TextEncoding::Utf16Be
            };
            return Detection {
                encoding,
                bom_len: 0,
            };
        }
    }

    Detection {
        encoding: TextEncoding::Utf8,
        bom_len: 0,
    }
}

/// Decode a whole buffer to text. Invalid sequences become U+FFFD.
pub fn decode(bytes: &[u8]) -> String {
    let detection = detect(bytes);
    let body = &bytes[detection.bom_len..];
    match detection.encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(body).into_owned(),
        TextEncoding::Utf16Le => decode_utf16(body, u16::from_le_bytes),
        TextEncoding::Utf16Be => decode_utf16(body, u16::from_be_bytes),
    }
}

/// Read a file and decode it with [`decode`].
pub fn read_text(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(decode(&bytes))
}

fn decode_utf16(body: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units = body.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    let mut text: String = char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if body.len() % 2 == 1 {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}
