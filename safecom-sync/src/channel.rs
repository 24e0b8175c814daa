//! Mutex-guarded SafeCom context with a lock-free receive path
//!
//! Received bytes never touch the mutex. The producer (typically a UART
//! interrupt) enqueues into a `heapless::spsc::Queue`; the consumer side moves
//! staged bytes into the byte ring at the start of every [`SafeComChannel::pool`].
//!
//! ```text
//!  ISR ──SafeComProducer──▶ spsc::Queue<u8, Q> ──drain──▶ ┌─Mutex─────────┐
//!                                                         │ SafeCom<N, K> │
//!  consumer ◀──────────────── get / remove ────────────── └───────────────┘
//! ```
//!
//! Consumer operations take the lock for a bounded amount of work: one drain,
//! one parser step, or one frame extraction. Waiting happens outside the lock.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::spsc::{Consumer, Producer};

use safecom_protocol::{Config, Error, FrameMeta, PoolMode, SafeCom, Scan, Stats, Timeout};

/// Interrupt-side handle of a [`SafeComChannel`]
///
/// Pushing is wait-free: it only enqueues into the staging queue, whatever
/// the consumer is doing. When the queue is full the incoming byte is dropped
/// and counted.
pub struct SafeComProducer<'q, const Q: usize> {
    queue: Producer<'q, u8, Q>,
    dropped: u32,
}

impl<'q, const Q: usize> SafeComProducer<'q, Q> {
    /// Wrap the producer half of the staging queue
    pub fn new(queue: Producer<'q, u8, Q>) -> Self {
        Self { queue, dropped: 0 }
    }

    /// Stage one received byte
    pub fn push_byte(&mut self, byte: u8) {
        if self.queue.enqueue(byte).is_err() {
            self.dropped = self.dropped.wrapping_add(1);
        }
    }

    /// Stage received bytes
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Bytes lost because the staging queue was full
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

/// Which frame an attempt extracts, and whether it is removed
#[derive(Clone, Copy)]
enum Pick {
    PeekOldest,
    PeekLatest,
    TakeOldest,
    TakeLatest,
}

impl Pick {
    fn apply<const N: usize, const K: usize>(
        self,
        com: &mut SafeCom<N, K>,
        out: &mut [u8],
    ) -> Result<FrameMeta, Error> {
        match self {
            Pick::PeekOldest => com.peek_oldest(out),
            Pick::PeekLatest => com.peek_latest(out),
            Pick::TakeOldest => com.take_oldest(out),
            Pick::TakeLatest => com.take_latest(out),
        }
    }
}

struct Shared<'q, const N: usize, const K: usize, const Q: usize> {
    com: SafeCom<N, K>,
    staged: Consumer<'q, u8, Q>,
}

/// Consumer side of a shared [`SafeCom`] context
///
/// ```ignore
/// static RX_QUEUE: StaticCell<Queue<u8, 256>> = StaticCell::new();
/// static LINK: StaticCell<SafeComChannel<'static, CriticalSectionRawMutex, BUFFER_SIZE, KNOWN_LIST_SIZE, 256>> =
///     StaticCell::new();
///
/// let (tx, rx) = RX_QUEUE.init(Queue::new()).split();
/// let link = LINK.init(SafeComChannel::new(Config::new(), rx));
/// let producer = SafeComProducer::new(tx); // moved into the UART interrupt
/// ```
pub struct SafeComChannel<'q, M: RawMutex, const N: usize, const K: usize, const Q: usize> {
    inner: Mutex<M, RefCell<Shared<'q, N, K, Q>>>,
}

impl<'q, M: RawMutex, const N: usize, const K: usize, const Q: usize> SafeComChannel<'q, M, N, K, Q> {
    /// Create an empty channel fed from the consumer half of the staging queue
    pub const fn new(config: Config, staged: Consumer<'q, u8, Q>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Shared {
                com: SafeCom::new(config),
                staged,
            })),
        }
    }

    /// Run `f` with exclusive access to the context
    ///
    /// Must not be called re-entrantly from within `f`. Producers are never
    /// held up by it.
    pub fn lock<R>(&self, f: impl FnOnce(&mut SafeCom<N, K>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut().com))
    }

    /// Move staged bytes into the byte ring
    ///
    /// Ring overrun, parse cancellation and frame eviction apply here, exactly
    /// as for [`SafeCom::push_byte`]. Returns the number of bytes moved.
    pub fn drain(&self) -> usize {
        self.inner.lock(|cell| {
            let mut shared = cell.borrow_mut();
            let Shared { com, staged } = &mut *shared;
            let mut moved = 0;
            while let Some(byte) = staged.dequeue() {
                com.push_byte(byte);
                moved += 1;
            }
            moved
        })
    }

    /// Drain staged bytes, then examine every pending byte one locked step at a time
    ///
    /// Returns the number of frames accepted.
    pub fn pool(&self) -> usize {
        let moved = self.drain();
        if moved > 0 {
            trace!("SC: drained {} staged bytes", moved);
        }

        let mut accepted = 0;
        while let Some(scan) = self.lock(|com| com.pool_step()) {
            if matches!(scan, Scan::Accepted(_)) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Whether at least one validated frame is queued
    pub fn has_new_frame(&self) -> bool {
        self.lock(|com| com.has_new_frame())
    }

    /// Number of validated frames queued
    pub fn count_frame(&self) -> usize {
        self.lock(|com| com.count_frame())
    }

    /// Diagnostic counters of the context
    pub fn stats(&self) -> Stats {
        self.lock(|com| com.stats())
    }

    /// Context configuration
    pub fn config(&self) -> Config {
        self.lock(|com| *com.config())
    }

    /// Wait for a frame and copy the oldest one, leaving it queued
    pub fn get_oldest_frame<D: embedded_hal::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_blocking(Pick::PeekOldest, out, timeout, delay)
    }

    /// Wait for a frame and copy the latest one, leaving it queued
    pub fn get_latest_frame<D: embedded_hal::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_blocking(Pick::PeekLatest, out, timeout, delay)
    }

    /// Wait for a frame, copy the oldest one and remove it
    pub fn remove_oldest_frame<D: embedded_hal::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_blocking(Pick::TakeOldest, out, timeout, delay)
    }

    /// Wait for a frame, copy the latest one and remove it
    pub fn remove_latest_frame<D: embedded_hal::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_blocking(Pick::TakeLatest, out, timeout, delay)
    }

    /// Wait for a frame and copy the oldest payload, returning its length
    pub fn get_data_byte<D: embedded_hal::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<usize, Error> {
        self.get_oldest_frame(out, timeout, delay).map(|meta| meta.len)
    }

    /// Async [`get_oldest_frame`](Self::get_oldest_frame)
    pub async fn get_oldest_frame_async<D: embedded_hal_async::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_async(Pick::PeekOldest, out, timeout, delay).await
    }

    /// Async [`get_latest_frame`](Self::get_latest_frame)
    pub async fn get_latest_frame_async<D: embedded_hal_async::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_async(Pick::PeekLatest, out, timeout, delay).await
    }

    /// Async [`remove_oldest_frame`](Self::remove_oldest_frame)
    pub async fn remove_oldest_frame_async<D: embedded_hal_async::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_async(Pick::TakeOldest, out, timeout, delay).await
    }

    /// Async [`remove_latest_frame`](Self::remove_latest_frame)
    pub async fn remove_latest_frame_async<D: embedded_hal_async::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        self.wait_async(Pick::TakeLatest, out, timeout, delay).await
    }

    /// Async [`get_data_byte`](Self::get_data_byte)
    pub async fn get_data_byte_async<D: embedded_hal_async::delay::DelayNs>(
        &self,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<usize, Error> {
        self.get_oldest_frame_async(out, timeout, delay)
            .await
            .map(|meta| meta.len)
    }

    /// One retrieval attempt; pools first unless a pooling task owns that
    fn attempt(&self, pick: Pick, out: &mut [u8]) -> Result<FrameMeta, Error> {
        if self.config().mode == PoolMode::Inline {
            self.pool();
        }
        self.lock(|com| pick.apply(com, out))
    }

    fn budget_ms(&self, timeout: Timeout) -> u32 {
        timeout.budget_ms(self.config().default_timeout_ms)
    }

    fn wait_blocking<D: embedded_hal::delay::DelayNs>(
        &self,
        pick: Pick,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        if out.is_empty() {
            return Err(Error::NullArgument);
        }
        let budget = self.budget_ms(timeout);
        safecom_protocol::wait_for(delay, budget, || self.attempt(pick, &mut *out))
    }

    /// Async twin of [`safecom_protocol::wait_for`]
    async fn wait_async<D: embedded_hal_async::delay::DelayNs>(
        &self,
        pick: Pick,
        out: &mut [u8],
        timeout: Timeout,
        delay: &mut D,
    ) -> Result<FrameMeta, Error> {
        if out.is_empty() {
            return Err(Error::NullArgument);
        }
        let mut remaining = self.budget_ms(timeout);
        loop {
            match self.attempt(pick, out) {
                Err(Error::Empty) if remaining > 0 => {
                    delay.delay_ms(1).await;
                    remaining -= 1;
                }
                Err(Error::Empty) => return Err(Error::Timeout),
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, NoopRawMutex};
    use heapless::spsc::Queue;
    use safecom_protocol::{encode_to_vec, max_encoded_len};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    type Local<'q> = SafeComChannel<'q, NoopRawMutex, 128, 4, 64>;

    fn frame(payload: &[u8]) -> heapless::Vec<u8, { max_encoded_len(16) }> {
        encode_to_vec(payload).unwrap()
    }

    /// Blocking delay that returns immediately and counts milliseconds
    #[derive(Default)]
    struct CountingDelay {
        ms: u32,
    }

    impl embedded_hal::delay::DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.ms += ns / 1_000_000;
        }
    }

    impl embedded_hal_async::delay::DelayNs for CountingDelay {
        async fn delay_ns(&mut self, ns: u32) {
            self.ms += ns / 1_000_000;
        }
    }

    struct SleepDelay;

    impl embedded_hal::delay::DelayNs for SleepDelay {
        fn delay_ns(&mut self, ns: u32) {
            std::thread::sleep(Duration::from_nanos(ns.into()));
        }
    }

    #[test]
    fn test_push_then_pool() {
        let mut queue: Queue<u8, 64> = Queue::new();
        let (tx, rx) = queue.split();
        let mut producer = SafeComProducer::new(tx);
        let ch = Local::new(Config::new(), rx);

        producer.push_bytes(&frame(&[0x10, 0x01, 0x02]));
        assert_eq!(ch.lock(|com| com.ring().unexamined()), 0);
        assert!(!ch.has_new_frame());

        assert_eq!(ch.pool(), 1);
        assert_eq!(ch.count_frame(), 1);
        assert_eq!(ch.stats().accepted, 1);
        assert_eq!(producer.dropped(), 0);
    }

    #[test]
    fn test_full_staging_queue_drops_incoming_bytes() {
        let mut queue: Queue<u8, 8> = Queue::new();
        let (tx, rx) = queue.split();
        let mut producer = SafeComProducer::new(tx);
        let ch = SafeComChannel::<NoopRawMutex, 64, 4, 8>::new(Config::new(), rx);

        // Holds Q - 1 bytes
        producer.push_bytes(&[1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(producer.dropped(), 2);

        assert_eq!(ch.drain(), 7);
        assert_eq!(ch.lock(|com| com.ring().at(6)), 7);
        assert_eq!(ch.drain(), 0);
    }

    #[test]
    fn test_task_mode_getter_does_not_pool() {
        let mut queue: Queue<u8, 64> = Queue::new();
        let (tx, rx) = queue.split();
        let mut producer = SafeComProducer::new(tx);
        let ch = Local::new(Config::new(), rx);
        producer.push_bytes(&frame(&[0x10, 0x01]));

        let mut delay = CountingDelay::default();
        let mut out = [0u8; 8];
        assert_eq!(
            ch.get_oldest_frame(&mut out, Timeout::Millis(3), &mut delay),
            Err(Error::Timeout)
        );
        assert_eq!(delay.ms, 3);

        ch.pool();
        let meta = ch
            .remove_oldest_frame(&mut out, Timeout::NoWait, &mut delay)
            .unwrap();
        assert_eq!(&out[..meta.len], &[0x10, 0x01]);
        assert_eq!(ch.count_frame(), 0);
    }

    #[test]
    fn test_inline_mode_getter_pools() {
        let mut queue: Queue<u8, 64> = Queue::new();
        let (tx, rx) = queue.split();
        let mut producer = SafeComProducer::new(tx);
        let ch = Local::new(Config::new().with_mode(PoolMode::Inline), rx);
        producer.push_bytes(&frame(&[0x21, 0x00]));

        let mut out = [0u8; 8];
        let len = ch
            .get_data_byte(&mut out, Timeout::NoWait, &mut CountingDelay::default())
            .unwrap();
        assert_eq!(&out[..len], &[0x21, 0x00]);
    }

    #[test]
    fn test_lifo_removal_through_lock() {
        let mut queue: Queue<u8, 64> = Queue::new();
        let (tx, rx) = queue.split();
        let mut producer = SafeComProducer::new(tx);
        let ch = Local::new(Config::new(), rx);
        for id in [0x10, 0x11, 0x12] {
            producer.push_bytes(&frame(&[id, 0xAA]));
        }
        ch.pool();

        let mut out = [0u8; 8];
        let mut delay = CountingDelay::default();
        let latest = ch
            .remove_latest_frame(&mut out, Timeout::NoWait, &mut delay)
            .unwrap();
        assert_eq!(latest.id, 0x12);
        let peeked = ch
            .get_latest_frame(&mut out, Timeout::NoWait, &mut delay)
            .unwrap();
        assert_eq!(peeked.id, 0x11);
        assert_eq!(ch.lock(|com| com.index().len()), 2);
    }

    #[test]
    fn test_empty_output_buffer() {
        let mut queue: Queue<u8, 64> = Queue::new();
        let (_tx, rx) = queue.split();
        let ch = Local::new(Config::new(), rx);
        let mut delay = CountingDelay::default();
        assert_eq!(
            ch.get_oldest_frame(&mut [], Timeout::Default, &mut delay),
            Err(Error::NullArgument)
        );
        assert_eq!(delay.ms, 0);
    }

    #[test]
    fn test_async_getters() {
        let mut queue: Queue<u8, 64> = Queue::new();
        let (tx, rx) = queue.split();
        let mut producer = SafeComProducer::new(tx);
        let ch = Local::new(Config::new().with_default_timeout_ms(7), rx);
        let mut delay = CountingDelay::default();
        let mut out = [0u8; 8];

        let res = block_on(ch.remove_oldest_frame_async(&mut out, Timeout::Default, &mut delay));
        assert_eq!(res, Err(Error::Timeout));
        assert_eq!(delay.ms, 7);

        producer.push_bytes(&frame(&[0x20, 0x01, 0x02, 0x03]));
        ch.pool();
        let len = block_on(ch.get_data_byte_async(&mut out, Timeout::NoWait, &mut delay)).unwrap();
        assert_eq!(&out[..len], &[0x20, 0x01, 0x02, 0x03]);

        let meta =
            block_on(ch.remove_latest_frame_async(&mut out, Timeout::NoWait, &mut delay)).unwrap();
        assert_eq!(meta.id, 0x20);
        assert!(!ch.has_new_frame());
    }

    #[test]
    fn test_push_completes_while_consumer_holds_lock() {
        let mut queue: Queue<u8, 64> = Queue::new();
        let (tx, rx) = queue.split();
        let mut producer = SafeComProducer::new(tx);
        let ch = SafeComChannel::<CriticalSectionRawMutex, 64, 4, 64>::new(Config::new(), rx);
        let locked = AtomicBool::new(false);
        let pushed = AtomicBool::new(false);

        let pushed_under_lock = std::thread::scope(|s| {
            let consumer = s.spawn(|| {
                ch.lock(|_com| {
                    locked.store(true, Ordering::SeqCst);
                    let deadline = Instant::now() + Duration::from_secs(2);
                    while !pushed.load(Ordering::SeqCst) && Instant::now() < deadline {
                        std::thread::yield_now();
                    }
                    pushed.load(Ordering::SeqCst)
                })
            });

            s.spawn(|| {
                while !locked.load(Ordering::SeqCst) {
                    std::thread::yield_now();
                }
                producer.push_byte(0x42);
                pushed.store(true, Ordering::SeqCst);
            });

            consumer.join().unwrap()
        });

        assert!(pushed_under_lock);
        assert_eq!(ch.drain(), 1);
        assert_eq!(ch.lock(|com| com.ring().at(0)), 0x42);
    }

    #[test]
    fn test_producer_pooler_consumer_threads() {
        let mut queue: Queue<u8, 256> = Queue::new();
        let (tx, rx) = queue.split();
        let mut producer = SafeComProducer::new(tx);
        let ch = SafeComChannel::<CriticalSectionRawMutex, 1024, 32, 256>::new(Config::new(), rx);
        let stop = AtomicBool::new(false);
        let mut received = std::vec::Vec::new();

        std::thread::scope(|s| {
            s.spawn(|| {
                for i in 0..20u8 {
                    producer.push_bytes(&frame(&[0x20, i, 0xFF]));
                    std::thread::sleep(Duration::from_millis(1));
                }
            });

            s.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    ch.pool();
                    std::thread::sleep(Duration::from_millis(1));
                }
            });

            let mut out = [0u8; 8];
            for _ in 0..20 {
                let res = ch
                    .remove_oldest_frame(&mut out, Timeout::Millis(2000), &mut SleepDelay)
                    .map(|meta| (out[1], meta.len, out[2]));
                received.push(res);
            }
            stop.store(true, Ordering::Relaxed);
        });

        for (i, res) in received.iter().enumerate() {
            assert_eq!(*res, Ok((i as u8, 3, 0xFF)));
        }

        let stats = ch.stats();
        assert_eq!(stats.accepted, 20);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.overrun_bytes, 0);
    }
}
