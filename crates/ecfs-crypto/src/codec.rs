//! Filename-safe base-64 variant used for presented names.
//!
//! Bits are consumed least-significant first, six at a time, and mapped onto
//! `A-Z a-z 0-9 + ,`. There are no padding characters; a trailing partial
//! group is emitted as one more character. This is not RFC 4648 base64 (bit
//! order and alphabet differ), so the `base64` crate cannot be used.

use thiserror::Error;

use ecfs_core::EcfsError;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+,";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("invalid character {byte:#04x} at position {position}")]
    InvalidCharacter { position: usize, byte: u8 },

    #[error("encoded name leaves non-zero trailing bits")]
    TrailingBits,
}

impl From<CodecError> for EcfsError {
    fn from(e: CodecError) -> Self {
        EcfsError::InvalidInput(e.to_string())
    }
}

/// Number of characters `encode` produces for `nbytes` input bytes.
pub const fn encoded_len(nbytes: usize) -> usize {
    (nbytes * 4).div_ceil(3)
}

pub fn encode(src: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(src.len()));
    let mut ac: u32 = 0;
    let mut bits = 0;

    for &byte in src {
        ac |= u32::from(byte) << bits;
        bits += 8;
        while bits >= 6 {
            out.push(char::from(ALPHABET[(ac & 0x3f) as usize]));
            ac >>= 6;
            bits -= 6;
        }
    }
    if bits > 0 {
        out.push(char::from(ALPHABET[(ac & 0x3f) as usize]));
    }
    out
}

pub fn decode(src: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(src.len() * 3 / 4);
    let mut ac: u32 = 0;
    let mut bits = 0;

    for (position, &byte) in src.iter().enumerate() {
        let value = decode_char(byte).ok_or(CodecError::InvalidCharacter { position, byte })?;
        ac |= u32::from(value) << bits;
        bits += 6;
        if bits >= 8 {
            out.push((ac & 0xff) as u8);
            ac >>= 8;
            bits -= 8;
        }
    }
    if ac != 0 {
        return Err(CodecError::TrailingBits);
    }
    Ok(out)
}

fn decode_char(c: u8) -> Option<u8> {
    match c {
        b'A'..=b'Z' => Some(c - b'A'),
        b'a'..=b'z' => Some(c - b'a' + 26),
        b'0'..=b'9' => Some(c - b'0' + 52),
        b'+' => Some(62),
        b',' => Some(63),
        _ => None,
    }
}
