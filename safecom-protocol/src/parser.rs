//! Frame parser ("pooling")
//!
//! Walks the unexamined region of the byte ring one byte at a time. A
//! HEADER opens a candidate (a newer header always replaces an open one), a
//! TRAILER closes it: the enclosed span is unstuffed and CRC-checked, and on
//! success a descriptor is appended to the frame index. Invalid candidates
//! are logged and dropped.

use crate::config::{HEADER, TRAILER};
use crate::context::SafeCom;
use crate::crc::{crc_update, CRC_SEED};
use crate::index::FrameEntry;
use crate::ring::{ByteRing, DanglingEscape};

/// Why a closed candidate was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Rejection {
    /// Fewer than 3 unstuffed bytes (identifier plus CRC)
    TooShort { len: usize },
    /// Escape byte immediately before the trailer
    DanglingEscape,
    /// Checksum over the body does not match the received one
    CrcMismatch { computed: u16, received: u16 },
}

/// What a single parser step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Scan {
    /// Ordinary byte, revisited on validation
    Data,
    /// Header byte, candidate (re)opened
    Header,
    /// Trailer with no open candidate
    Stray,
    /// Candidate validated and indexed
    Accepted(FrameEntry),
    /// Candidate dropped
    Rejected(Rejection),
}

/// Unstuff and check the candidate body `[from, to)`
///
/// Returns the identifier byte of a valid frame.
pub(crate) fn validate<const N: usize>(
    ring: &ByteRing<N>,
    from: usize,
    to: usize,
) -> Result<u8, Rejection> {
    let mut id = 0u8;
    let mut len = 0usize;
    let mut crc = CRC_SEED;
    // Last two unstuffed bytes; they are the CRC once the walk ends
    let mut window = [0u8; 2];

    for byte in ring.unstuff(from, to) {
        let byte = byte.map_err(|DanglingEscape| Rejection::DanglingEscape)?;
        if len == 0 {
            id = byte;
        }
        if len >= 2 {
            crc = crc_update(crc, window[0]);
        }
        window = [window[1], byte];
        len += 1;
    }

    if len < 3 {
        return Err(Rejection::TooShort { len });
    }
    let received = u16::from_be_bytes(window);
    if crc != received {
        return Err(Rejection::CrcMismatch {
            computed: crc,
            received,
        });
    }
    Ok(id)
}

impl<const N: usize, const K: usize> SafeCom<N, K> {
    /// Examine every pending byte
    ///
    /// Returns the number of frames accepted.
    pub fn pool(&mut self) -> usize {
        let mut accepted = 0;
        while let Some(scan) = self.pool_step() {
            if matches!(scan, Scan::Accepted(_)) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Examine the next pending byte, `None` once the ring is drained
    pub fn pool_step(&mut self) -> Option<Scan> {
        let pos = self.ring.peek_unexamined()?;
        let byte = self.ring.at(pos);

        let scan = match (byte, self.parse_start) {
            (HEADER, _) => {
                self.parse_start = Some(pos);
                Scan::Header
            }
            (TRAILER, Some(start)) => {
                self.parse_start = None;
                self.close_candidate(start, pos)
            }
            (TRAILER, None) => Scan::Stray,
            _ => Scan::Data,
        };

        self.ring.advance_proc_tail();
        Some(scan)
    }

    fn close_candidate(&mut self, start: usize, trailer: usize) -> Scan {
        match validate(&self.ring, ByteRing::<N>::next(start), trailer) {
            Ok(id) => {
                let entry = FrameEntry { id, start };
                if let Some(dropped) = self.index.push(entry) {
                    debug!("SC: index full, dropped frame at {}", dropped.start);
                    self.stats.evicted_frames = self.stats.evicted_frames.wrapping_add(1);
                }
                debug_assert!(self.index_is_ordered());
                self.stats.accepted = self.stats.accepted.wrapping_add(1);
                trace!("SC: frame id={=u8:#x} at {}", id, start);
                Scan::Accepted(entry)
            }
            Err(reason) => {
                warn!("SC: CRC fail or invalid frame: {}", reason);
                self.stats.rejected = self.stats.rejected.wrapping_add(1);
                Scan::Rejected(reason)
            }
        }
    }
}
