//! Framing context
//!
//! [`SafeCom`] owns the byte ring, the frame index, the parse cursor and the
//! diagnostics of one link. Several contexts can coexist, one per channel.
//! The parser lives in [`crate::parser`], retrieval in [`crate::store`].

use crate::config::{Config, PoolMode};
use crate::index::FrameIndex;
use crate::ring::ByteRing;

/// Bytes read from a byte source per [`SafeCom::receive_from`] call
pub const RX_CHUNK: usize = 64;

/// Diagnostic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Stats {
    /// Frames validated and indexed
    pub accepted: u32,
    /// Candidates dropped by validation
    pub rejected: u32,
    /// Unexamined bytes dropped because the ring was full
    pub overrun_bytes: u32,
    /// Indexed frames dropped by overwrite or index overflow
    pub evicted_frames: u32,
    /// Open candidates abandoned because their bytes were overwritten
    pub cancelled_parses: u32,
}

/// Framing context with a byte ring of `N` bytes and an index of `K` frames
#[derive(Debug, Clone)]
pub struct SafeCom<const N: usize, const K: usize> {
    pub(crate) ring: ByteRing<N>,
    pub(crate) index: FrameIndex<K>,
    pub(crate) parse_start: Option<usize>,
    pub(crate) config: Config,
    pub(crate) stats: Stats,
}

impl<const N: usize, const K: usize> Default for SafeCom<N, K> {
    fn default() -> Self {
        Self::new(Config::new())
    }
}

impl<const N: usize, const K: usize> SafeCom<N, K> {
    /// Create an empty context
    ///
    /// `N < 2` or `K == 0` fails to compile.
    pub const fn new(config: Config) -> Self {
        Self {
            ring: ByteRing::new(),
            index: FrameIndex::new(),
            parse_start: None,
            config,
            stats: Stats {
                accepted: 0,
                rejected: 0,
                overrun_bytes: 0,
                evicted_frames: 0,
                cancelled_parses: 0,
            },
        }
    }

    /// Context configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Diagnostic counters
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Raw byte ring
    pub fn ring(&self) -> &ByteRing<N> {
        &self.ring
    }

    /// Frame index
    pub fn index(&self) -> &FrameIndex<K> {
        &self.index
    }

    /// Position of the open header, if a candidate is being collected
    pub fn parse_start(&self) -> Option<usize> {
        self.parse_start
    }

    /// Append one received byte
    ///
    /// Never blocks and never fails. When the ring is full the oldest
    /// unexamined byte is dropped, and any state referring to the slot about
    /// to be reused is invalidated first.
    pub fn push_byte(&mut self, byte: u8) {
        let report = self.ring.write(byte);

        if report.evicted.is_some() {
            self.stats.overrun_bytes = self.stats.overrun_bytes.wrapping_add(1);
        }

        // The open header is the next byte to be overwritten. This also covers
        // the overrun case, which can only drop the byte after the header once
        // the header itself is being written over.
        if self.parse_start == Some(report.next_head) {
            self.cancel_parse();
        }

        self.evict_if_overwritten(report.next_head);

        if self.config.mode == PoolMode::Inline {
            self.pool();
        }
    }

    /// Append received bytes one at a time
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Drop index entries whose header byte will be overwritten by the next push
    ///
    /// Returns the number of frames evicted.
    pub fn evict_if_overwritten(&mut self, next_head: usize) -> usize {
        let evicted = self.index.evict_if_overwritten(next_head);
        if evicted > 0 {
            debug!("SC: evicted {} frame(s) about to be overwritten", evicted);
            self.stats.evicted_frames = self.stats.evicted_frames.wrapping_add(evicted as u32);
        }
        evicted
    }

    /// Whether index start positions are in ring order, oldest furthest behind the head
    ///
    /// Eviction on overwrite only inspects the oldest entry, which is only
    /// sound while this holds.
    pub fn index_is_ordered(&self) -> bool {
        let head = self.ring.head();
        let age = |start: usize| ByteRing::<N>::distance(start, head);
        let mut previous = usize::MAX;
        for entry in self.index.iter() {
            let current = age(entry.start);
            if current >= previous {
                return false;
            }
            previous = current;
        }
        true
    }

    /// Read once from `rx` and push whatever arrived
    ///
    /// Returns the number of bytes pushed.
    pub fn receive_from<R: embedded_io::Read>(&mut self, rx: &mut R) -> Result<usize, R::Error> {
        let mut chunk = [0u8; RX_CHUNK];
        let n = rx.read(&mut chunk)?;
        trace!("SC: RX {} bytes", n);
        self.push_bytes(&chunk[..n]);
        Ok(n)
    }

    fn cancel_parse(&mut self) {
        if self.parse_start.take().is_some() {
            debug!("SC: open frame overwritten, parse cancelled");
            self.stats.cancelled_parses = self.stats.cancelled_parses.wrapping_add(1);
        }
    }
}
