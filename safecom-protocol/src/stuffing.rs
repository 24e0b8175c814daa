//! Frame encoding and decoding
//!
//! Frame format:
//! - HEADER (1 byte): 0xFF
//! - PAYLOAD (1+ bytes): stuffed application data, identifier first
//! - CRC (2 bytes): stuffed, high byte first, over the unstuffed payload
//! - TRAILER (1 byte): 0x00
//!
//! Stuffing replaces HEADER, TRAILER and ESCAPE inside the frame by
//! `ESCAPE, byte ^ XOR_MASK`.

use heapless::Vec;

use crate::config::{ESCAPE, HEADER, TRAILER, XOR_MASK};
use crate::crc::{crc_update, CRC_SEED};
use crate::error::Error;

/// Whether `byte` must be escaped inside a frame
#[inline]
pub const fn is_reserved(byte: u8) -> bool {
    byte == HEADER || byte == TRAILER || byte == ESCAPE
}

/// Worst-case wire size of a payload, every payload and CRC byte escaped
pub const fn max_encoded_len(payload_len: usize) -> usize {
    2 + (payload_len + 2) * 2
}

/// Write `byte` at `out[*pos..]`, escaped if needed
///
/// The caller guarantees room for two bytes.
fn put_stuffed(out: &mut [u8], pos: &mut usize, byte: u8) {
    if is_reserved(byte) {
        out[*pos] = ESCAPE;
        out[*pos + 1] = byte ^ XOR_MASK;
        *pos += 2;
    } else {
        out[*pos] = byte;
        *pos += 1;
    }
}

/// Encode `payload` into `out`
///
/// `out` must hold the worst case ([`max_encoded_len`]) even if the actual
/// frame turns out shorter; nothing is written on error.
///
/// Returns the number of bytes written.
pub fn encode(payload: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    if out.is_empty() {
        return Err(Error::NullArgument);
    }
    if payload.is_empty() {
        return Err(Error::InvalidArgument);
    }
    if out.len() < max_encoded_len(payload.len()) {
        return Err(Error::Full);
    }

    let mut pos = 0;
    let mut crc = CRC_SEED;

    out[pos] = HEADER;
    pos += 1;

    for &byte in payload {
        crc = crc_update(crc, byte);
        put_stuffed(out, &mut pos, byte);
    }

    let [crc_hi, crc_lo] = crc.to_be_bytes();
    put_stuffed(out, &mut pos, crc_hi);
    put_stuffed(out, &mut pos, crc_lo);

    out[pos] = TRAILER;
    pos += 1;

    Ok(pos)
}

/// Encode `payload` into a heapless Vec of capacity `CAP`
pub fn encode_to_vec<const CAP: usize>(payload: &[u8]) -> Result<Vec<u8, CAP>, Error> {
    let mut frame = Vec::new();
    frame.resize_default(CAP).map_err(|_| Error::Full)?;
    let len = encode(payload, &mut frame)?;
    frame.truncate(len);
    Ok(frame)
}

/// Decode one complete wire frame held in a linear buffer
///
/// `frame` must start with HEADER and end with TRAILER. The CRC is checked
/// and stripped; returns the payload length written to `out`.
pub fn decode(frame: &[u8], out: &mut [u8]) -> Result<usize, Error> {
    if frame.is_empty() || out.is_empty() {
        return Err(Error::NullArgument);
    }
    let body = match frame {
        [HEADER, body @ .., TRAILER] => body,
        _ => return Err(Error::Generic),
    };

    // First pass: validate and measure
    let mut len = 0usize;
    let mut crc = CRC_SEED;
    let mut window = [0u8; 2];
    let mut bytes = body.iter();
    while let Some(&raw) = bytes.next() {
        if raw == HEADER || raw == TRAILER {
            return Err(Error::Generic);
        }
        let byte = if raw == ESCAPE {
            match bytes.next() {
                Some(&next) if next != HEADER && next != TRAILER => next ^ XOR_MASK,
                _ => return Err(Error::Generic),
            }
        } else {
            raw
        };
        if len >= 2 {
            crc = crc_update(crc, window[0]);
        }
        window = [window[1], byte];
        len += 1;
    }

    if len < 3 {
        return Err(Error::Empty);
    }
    if crc != u16::from_be_bytes(window) {
        return Err(Error::CrcMismatch);
    }

    let payload_len = len - 2;
    if out.len() < payload_len {
        return Err(Error::Full);
    }

    // Second pass: copy the payload
    let mut bytes = body.iter();
    for slot in out.iter_mut().take(payload_len) {
        let raw = bytes.next().copied().unwrap_or_default();
        *slot = if raw == ESCAPE {
            bytes.next().copied().unwrap_or_default() ^ XOR_MASK
        } else {
            raw
        };
    }

    Ok(payload_len)
}
