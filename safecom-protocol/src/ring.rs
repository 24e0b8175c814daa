//! Raw byte ring
//!
//! A fixed-capacity ring written by a single producer and examined by the
//! parser. Writing never fails: when the producer catches up with the
//! parser, the oldest unexamined byte is dropped.
//!
//! ```text
//! ┌──────────────┬─────────────────────┬──────────────┐
//! │   consumed   │  unexamined bytes   │   consumed   │
//! └──────────────┴─────────────────────┴──────────────┘
//!                ▲                     ▲
//!            proc_tail               head
//! ```

use crate::config::{ESCAPE, XOR_MASK};

/// Outcome of a single write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Overwrite {
    /// Head position after the write
    pub next_head: usize,
    /// Unexamined position dropped to make room, if any
    pub evicted: Option<usize>,
}

/// Byte ring of capacity `N`
///
/// At most `N - 1` bytes are unexamined at any time; one slot separates a
/// full ring from an empty one.
#[derive(Debug, Clone)]
pub struct ByteRing<const N: usize> {
    buffer: [u8; N],
    head: usize,
    proc_tail: usize,
}

impl<const N: usize> Default for ByteRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> ByteRing<N> {
    const CAPACITY_OK: () = assert!(N >= 2, "byte ring needs at least two slots");

    /// Create an empty ring
    pub const fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            buffer: [0; N],
            head: 0,
            proc_tail: 0,
        }
    }

    /// Ring capacity in bytes
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Next write position
    pub fn head(&self) -> usize {
        self.head
    }

    /// Next position the parser has not examined
    pub fn proc_tail(&self) -> usize {
        self.proc_tail
    }

    /// Position following `idx`
    #[inline]
    pub const fn next(idx: usize) -> usize {
        (idx + 1) % N
    }

    /// Distance from `from` forward to `to`
    #[inline]
    pub const fn distance(from: usize, to: usize) -> usize {
        (to + N - from) % N
    }

    /// Byte stored at `idx`
    #[inline]
    pub fn at(&self, idx: usize) -> u8 {
        self.buffer[idx % N]
    }

    /// Number of bytes written but not yet examined
    pub fn unexamined(&self) -> usize {
        Self::distance(self.proc_tail, self.head)
    }

    /// Whether the parser has caught up with the producer
    pub fn is_drained(&self) -> bool {
        self.proc_tail == self.head
    }

    /// Store `byte` at the head and advance it
    ///
    /// If the ring is full of unexamined bytes, the oldest one is dropped by
    /// moving `proc_tail` forward.
    pub fn write(&mut self, byte: u8) -> Overwrite {
        self.buffer[self.head] = byte;
        let next_head = Self::next(self.head);

        let evicted = if next_head == self.proc_tail {
            let dropped = self.proc_tail;
            self.proc_tail = Self::next(self.proc_tail);
            Some(dropped)
        } else {
            None
        };

        self.head = next_head;
        Overwrite { next_head, evicted }
    }

    /// Position of the next unexamined byte, if any
    pub fn peek_unexamined(&self) -> Option<usize> {
        (!self.is_drained()).then_some(self.proc_tail)
    }

    /// Mark the byte at `proc_tail` as examined
    pub fn advance_proc_tail(&mut self) {
        if !self.is_drained() {
            self.proc_tail = Self::next(self.proc_tail);
        }
    }

    /// Unstuffing walk over `[from, to)`
    pub fn unstuff(&self, from: usize, to: usize) -> Unstuff<'_, N> {
        Unstuff {
            ring: self,
            pos: from % N,
            end: to % N,
        }
    }
}

/// A stuffed sequence ended with an escape byte and nothing after it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DanglingEscape;

/// Iterator yielding unstuffed bytes of a ring span
#[derive(Debug, Clone)]
pub struct Unstuff<'a, const N: usize> {
    ring: &'a ByteRing<N>,
    pos: usize,
    end: usize,
}

impl<const N: usize> Iterator for Unstuff<'_, N> {
    type Item = Result<u8, DanglingEscape>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == self.end {
            return None;
        }
        let mut byte = self.ring.at(self.pos);
        self.pos = ByteRing::<N>::next(self.pos);

        if byte == ESCAPE {
            if self.pos == self.end {
                return Some(Err(DanglingEscape));
            }
            byte = self.ring.at(self.pos) ^ XOR_MASK;
            self.pos = ByteRing::<N>::next(self.pos);
        }
        Some(Ok(byte))
    }
}
