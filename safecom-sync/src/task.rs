//! Receive and pooling task bodies
//!
//! Plain async functions, so the application wraps them in its own executor
//! tasks with concrete UART and delay types:
//!
//! ```ignore
//! #[embassy_executor::task]
//! async fn link_rx(producer: SafeComProducer<'static, 256>, rx: BufferedUartRx) -> ! {
//!     run_receiver(producer, rx).await
//! }
//!
//! #[embassy_executor::task]
//! async fn link_pool(link: &'static Link) -> ! {
//!     run_pooling(link, Delay, POOLING_PERIOD_MS).await
//! }
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{Error as _, Read};

use safecom_protocol::context::RX_CHUNK;

use crate::channel::{SafeComChannel, SafeComProducer};

/// Pool the channel, then sleep `period_ms`, forever
pub async fn run_pooling<M, D, const N: usize, const K: usize, const Q: usize>(
    channel: &SafeComChannel<'_, M, N, K, Q>,
    mut delay: D,
    period_ms: u32,
) -> !
where
    M: RawMutex,
    D: DelayNs,
{
    debug!("SC: pooling task started, period {} ms", period_ms);

    loop {
        let accepted = channel.pool();
        if accepted > 0 {
            trace!("SC: pooled {} frame(s)", accepted);
        }
        delay.delay_ms(period_ms).await;
    }
}

/// Read once from `rx` and stage whatever arrived
///
/// Returns the number of bytes read.
pub async fn receive<R, const Q: usize>(
    producer: &mut SafeComProducer<'_, Q>,
    rx: &mut R,
) -> Result<usize, R::Error>
where
    R: Read,
{
    let mut buf = [0u8; RX_CHUNK];
    let n = rx.read(&mut buf).await?;
    if n > 0 {
        trace!("SC: RX {} bytes", n);
        producer.push_bytes(&buf[..n]);
    }
    Ok(n)
}

/// Stage every byte read from `rx`, forever
///
/// Read errors are logged and reading resumes.
pub async fn run_receiver<R, const Q: usize>(mut producer: SafeComProducer<'_, Q>, mut rx: R) -> !
where
    R: Read,
{
    debug!("SC: receive task started");

    loop {
        if let Err(e) = receive(&mut producer, &mut rx).await {
            warn!("SC: RX error: {}", e.kind());
        }
    }
}
