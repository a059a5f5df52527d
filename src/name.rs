//! Conversion between host names and the fixed-width names stored on disk.
//!
//! On disk a name is exactly `N` bytes: upper-case letters, digits, `_` and `.`,
//! anything else replaced by `?`, padded with spaces. The conversion is lossy,
//! so lookups always compare encoded forms.

use crate::config::NAME_LEN;

/// An encoded file name as stored in a directory entry.
pub type RawName = [u8; NAME_LEN];

/// Encodes `text` into an `N`-byte on-disk name.
/// Characters past `N` are dropped.
pub fn encode<const N: usize>(text: &str) -> [u8; N] {
    let mut out = [b' '; N];
    for (dst, c) in out.iter_mut().zip(text.chars()) {
        *dst = match c {
            'a'..='z' | 'A'..='Z' => c.to_ascii_uppercase() as u8,
            '0'..='9' | '_' | '.' => c as u8,
            _ => b'?',
        };
    }
    out
}

/// Decodes an on-disk name, trimming the space padding.
pub fn decode(raw: &[u8]) -> String {
    let end = raw.iter().rposition(|&c| c != b' ').map_or(0, |i| i + 1);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Encodes a file name for directory lookups.
pub fn encode_name(text: &str) -> RawName {
    encode::<NAME_LEN>(text)
}
