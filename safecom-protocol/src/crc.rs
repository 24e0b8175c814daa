//! Cumulative CRC-16
//!
//! MSB-first, no reflection, no final XOR. The running value is updated one
//! byte at a time so the parser can fold bytes in while unstuffing.

use crate::config::CRC_POLYNOMIAL;

/// Initial CRC value when no previous value exists
pub const CRC_SEED: u16 = 0xFFFF;

/// Fold one byte into `prev` using an explicit polynomial
#[inline]
pub const fn crc_update_with(poly: u16, prev: u16, byte: u8) -> u16 {
    let mut crc = prev ^ ((byte as u16) << 8);
    let mut bit = 0;
    while bit < 8 {
        crc = if crc & 0x8000 != 0 {
            (crc << 1) ^ poly
        } else {
            crc << 1
        };
        bit += 1;
    }
    crc
}

/// Fold one byte into `prev` using the build-time polynomial
#[inline]
pub const fn crc_update(prev: u16, byte: u8) -> u16 {
    crc_update_with(CRC_POLYNOMIAL, prev, byte)
}

/// CRC of a whole slice, starting from [`CRC_SEED`]
pub fn crc16(bytes: &[u8]) -> u16 {
    bytes.iter().fold(CRC_SEED, |crc, &b| crc_update(crc, b))
}
