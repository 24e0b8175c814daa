//! Frame index
//!
//! Bounded FIFO of descriptors for frames the parser has validated. Each
//! descriptor records the identifier byte and where the frame's header sits
//! in the byte ring; the payload itself stays in the ring until extracted.

use heapless::Deque;

/// Descriptor of a validated frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameEntry {
    /// First unstuffed payload byte
    pub id: u8,
    /// Ring position of the frame's header byte
    pub start: usize,
}

/// Descriptor ring of capacity `K`, oldest first
#[derive(Debug, Clone)]
pub struct FrameIndex<const K: usize> {
    entries: Deque<FrameEntry, K>,
}

impl<const K: usize> Default for FrameIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> FrameIndex<K> {
    const CAPACITY_OK: () = assert!(K > 0, "frame index needs at least one slot");

    /// Create an empty index
    pub const fn new() -> Self {
        let () = Self::CAPACITY_OK;
        Self {
            entries: Deque::new(),
        }
    }

    /// Number of live descriptors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no frame is known
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the next insert will evict
    pub fn is_full(&self) -> bool {
        self.entries.is_full()
    }

    /// Maximum number of descriptors
    pub const fn capacity(&self) -> usize {
        K
    }

    /// Append a descriptor, evicting and returning the oldest when full
    pub fn push(&mut self, entry: FrameEntry) -> Option<FrameEntry> {
        let evicted = if self.entries.is_full() {
            self.entries.pop_front()
        } else {
            None
        };
        // Room is guaranteed by the eviction above
        let _ = self.entries.push_back(entry);
        evicted
    }

    /// Oldest descriptor
    pub fn oldest(&self) -> Option<FrameEntry> {
        self.entries.front().copied()
    }

    /// Most recently inserted descriptor
    pub fn latest(&self) -> Option<FrameEntry> {
        self.entries.back().copied()
    }

    /// Remove the oldest descriptor
    pub fn pop_oldest(&mut self) -> Option<FrameEntry> {
        self.entries.pop_front()
    }

    /// Remove the most recently inserted descriptor
    pub fn pop_latest(&mut self) -> Option<FrameEntry> {
        self.entries.pop_back()
    }

    /// Drop descriptors whose header sits at `next_head`
    ///
    /// Start positions are inserted in ring order, so only the oldest entry
    /// can be the next one overwritten. Returns the number evicted.
    pub fn evict_if_overwritten(&mut self, next_head: usize) -> usize {
        let mut evicted = 0;
        while self.oldest().is_some_and(|e| e.start == next_head) {
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Descriptors from oldest to latest
    pub fn iter(&self) -> impl Iterator<Item = &FrameEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u8, start: usize) -> FrameEntry {
        FrameEntry { id, start }
    }

    #[test]
    fn test_fifo_and_lifo_access() {
        let mut index = FrameIndex::<4>::new();
        assert!(index.is_empty());
        assert_eq!(index.oldest(), None);

        index.push(entry(0x10, 0));
        index.push(entry(0x11, 7));
        index.push(entry(0x12, 14));

        assert_eq!(index.len(), 3);
        assert_eq!(index.oldest(), Some(entry(0x10, 0)));
        assert_eq!(index.latest(), Some(entry(0x12, 14)));

        assert_eq!(index.pop_latest(), Some(entry(0x12, 14)));
        assert_eq!(index.pop_oldest(), Some(entry(0x10, 0)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.oldest(), Some(entry(0x11, 7)));
    }

    #[test]
    fn test_push_when_full_evicts_oldest() {
        let mut index = FrameIndex::<2>::new();
        assert_eq!(index.push(entry(1, 0)), None);
        assert_eq!(index.push(entry(2, 5)), None);
        assert!(index.is_full());

        assert_eq!(index.push(entry(3, 10)), Some(entry(1, 0)));
        assert_eq!(index.len(), 2);
        assert_eq!(index.oldest(), Some(entry(2, 5)));
        assert_eq!(index.latest(), Some(entry(3, 10)));
    }

    #[test]
    fn test_evict_if_overwritten_only_matches_oldest() {
        let mut index = FrameIndex::<4>::new();
        index.push(entry(1, 3));
        index.push(entry(2, 9));

        assert_eq!(index.evict_if_overwritten(9), 0);
        assert_eq!(index.len(), 2);

        assert_eq!(index.evict_if_overwritten(3), 1);
        assert_eq!(index.oldest(), Some(entry(2, 9)));

        assert_eq!(index.evict_if_overwritten(9), 1);
        assert!(index.is_empty());
        assert_eq!(index.evict_if_overwritten(9), 0);
    }
}
