//! Frame store API
//!
//! Consumer-side access to validated frames. The `peek_*`/`take_*`
//! primitives never wait and report [`Error::Empty`]; the `get_*`/`remove_*`
//! getters wait up to a [`Timeout`], pooling between attempts.

use embedded_hal::delay::DelayNs;

use crate::config::{HEADER, TRAILER};
use crate::context::SafeCom;
use crate::error::Error;
use crate::index::FrameEntry;
use crate::ring::ByteRing;
use crate::timeout::{wait_for, Timeout};

/// Description of an extracted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameMeta {
    /// Header byte that opened the frame
    pub header: u8,
    /// Trailer byte that closed the frame
    pub trailer: u8,
    /// Identifier (first payload byte)
    pub id: u8,
    /// Payload bytes written to the caller's buffer, CRC excluded
    pub len: usize,
}

impl<const N: usize, const K: usize> SafeCom<N, K> {
    /// Whether at least one validated frame is queued
    pub fn has_new_frame(&self) -> bool {
        !self.index.is_empty()
    }

    /// Number of validated frames queued
    pub fn count_frame(&self) -> usize {
        self.index.len()
    }

    /// Copy the oldest frame's payload into `out` without removing it
    pub fn peek_oldest(&self, out: &mut [u8]) -> Result<FrameMeta, Error> {
        let entry = self.index.oldest().ok_or(Error::Empty)?;
        self.extract(entry, out)
    }

    /// Copy the latest frame's payload into `out` without removing it
    pub fn peek_latest(&self, out: &mut [u8]) -> Result<FrameMeta, Error> {
        let entry = self.index.latest().ok_or(Error::Empty)?;
        self.extract(entry, out)
    }

    /// Copy the oldest frame's payload into `out` and drop it from the queue
    pub fn take_oldest(&mut self, out: &mut [u8]) -> Result<FrameMeta, Error> {
        let meta = self.peek_oldest(out)?;
        self.index.pop_oldest();
        Ok(meta)
    }

    /// Copy the latest frame's payload into `out` and drop it from the queue
    pub fn take_latest(&mut self, out: &mut [u8]) -> Result<FrameMeta, Error> {
        let meta = self.peek_latest(out)?;
        self.index.pop_latest();
        Ok(meta)
    }

    /// Wait for a frame and copy the oldest one, leaving it queued
    pub fn get_oldest_frame<D: DelayNs>(
        &mut self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_and(out, timeout, delay, |com, out| com.peek_oldest(out))
    }

    /// Wait for a frame and copy the latest one, leaving it queued
    pub fn get_latest_frame<D: DelayNs>(
        &mut self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_and(out, timeout, delay, |com, out| com.peek_latest(out))
    }

    /// Wait for a frame, copy the oldest one and remove it
    pub fn remove_oldest_frame<D: DelayNs>(
        &mut self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_and(out, timeout, delay, |com, out| com.take_oldest(out))
    }

    /// Wait for a frame, copy the latest one and remove it
    pub fn remove_latest_frame<D: DelayNs>(
        &mut self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_and(out, timeout, delay, |com, out| com.take_latest(out))
    }

    /// Wait for a frame and copy the oldest payload, returning its length
    pub fn get_data_byte<D: DelayNs>(
        &mut self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<usize, Error> {
        self.get_oldest_frame(out, timeout, delay).map(|meta| meta.len)
    }

    /// Retry `op` within the budget, pooling before every attempt
    fn wait_and<D, F>(
        &mut self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
        mut op: F,
    ) -> Result<FrameMeta, Error>
    where
        D: DelayNs,
        F: FnMut(&mut Self, &mut [u8]) -> Result<FrameMeta, Error>,
    {
        if out.is_empty() {
            return Err(Error::NullArgument);
        }
        let budget = timeout.budget_ms(self.config.default_timeout_ms);
        wait_for(delay, budget, || {
            self.pool();
            op(&mut *self, &mut *out)
        })
    }

    /// Replay the unstuffing walk of an indexed frame into `out`
    pub(crate) fn extract(&self, entry: FrameEntry, out: &mut [u8]) -> Result<FrameMeta, Error> {
        if out.is_empty() {
            return Err(Error::NullArgument);
        }

        let body = ByteRing::<N>::next(entry.start);
        let trailer = self.find_trailer(body).ok_or_else(|| {
            error!("SC: indexed frame at {} has no trailer", entry.start);
            Error::Generic
        })?;

        // Validated on indexing, so the walk cannot hit a dangling escape
        let unstuffed = self.ring.unstuff(body, trailer).count();
        let len = unstuffed.checked_sub(2).ok_or(Error::CrcMismatch)?;
        if out.len() < len {
            return Err(Error::Full);
        }

        for (slot, byte) in out.iter_mut().zip(self.ring.unstuff(body, trailer)).take(len) {
            *slot = byte.map_err(|_| Error::Generic)?;
        }

        Ok(FrameMeta {
            header: HEADER,
            trailer: self.ring.at(trailer),
            id: entry.id,
            len,
        })
    }

    /// First raw TRAILER at or after `from`, stopping at the head
    fn find_trailer(&self, from: usize) -> Option<usize> {
        let head = self.ring.head();
        let mut pos = from;
        while pos != head {
            if self.ring.at(pos) == TRAILER {
                return Some(pos);
            }
            pos = ByteRing::<N>::next(pos);
        }
        None
    }
}
