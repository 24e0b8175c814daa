//! Wait budgets for blocking frame retrieval

use embedded_hal::delay::DelayNs;

use crate::error::Error;

/// How long a getter may wait for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Use the context's configured default
    #[default]
    Default,
    /// Return immediately
    NoWait,
    /// Wait up to this many milliseconds
    Millis(u32),
}

impl Timeout {
    /// Legacy millisecond convention: negative means default, zero means no wait
    pub const fn from_ms(ms: i32) -> Self {
        if ms < 0 {
            Timeout::Default
        } else if ms == 0 {
            Timeout::NoWait
        } else {
            Timeout::Millis(ms as u32)
        }
    }

    /// Milliseconds this budget allows
    pub const fn budget_ms(self, default_ms: u32) -> u32 {
        match self {
            Timeout::Default => default_ms,
            Timeout::NoWait => 0,
            Timeout::Millis(ms) => ms,
        }
    }
}

impl From<i32> for Timeout {
    fn from(ms: i32) -> Self {
        Self::from_ms(ms)
    }
}

/// Retry `attempt` in 1 ms slices until it stops returning [`Error::Empty`]
///
/// `attempt` runs once up front and again after every slice. Any other error
/// is returned as is; running out of budget yields [`Error::Timeout`].
pub fn wait_for<T, D: DelayNs>(
    delay: &mut D,
    budget_ms: u32,
    mut attempt: impl FnMut() -> Result<T, Error>,
) -> Result<T, Error> {
    let mut remaining = budget_ms;
    loop {
        match attempt() {
            Err(Error::Empty) if remaining > 0 => {
                delay.delay_ms(1);
                remaining -= 1;
            }
            Err(Error::Empty) => return Err(Error::Timeout),
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Delay that only records how long it was asked to sleep
    #[derive(Default)]
    struct CountingDelay {
        ns: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.ns += u64::from(ns);
        }
    }

    #[test]
    fn test_from_ms() {
        assert_eq!(Timeout::from(-1), Timeout::Default);
        assert_eq!(Timeout::from(0), Timeout::NoWait);
        assert_eq!(Timeout::from(250), Timeout::Millis(250));
        assert_eq!(Timeout::Default.budget_ms(3000), 3000);
        assert_eq!(Timeout::NoWait.budget_ms(3000), 0);
    }

    #[test]
    fn test_no_budget_times_out_without_sleeping() {
        let mut delay = CountingDelay::default();
        let result: Result<(), _> = wait_for(&mut delay, 0, || Err(Error::Empty));
        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(delay.ns, 0);
    }

    #[test]
    fn test_budget_is_spent_in_one_ms_slices() {
        let mut delay = CountingDelay::default();
        let mut attempts = 0;
        let result: Result<(), _> = wait_for(&mut delay, 5, || {
            attempts += 1;
            Err(Error::Empty)
        });
        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(attempts, 6);
        assert_eq!(delay.ns, 5_000_000);
    }

    #[test]
    fn test_success_after_retries() {
        let mut delay = CountingDelay::default();
        let mut attempts = 0;
        let result = wait_for(&mut delay, 100, || {
            attempts += 1;
            if attempts < 3 {
                Err(Error::Empty)
            } else {
                Ok(attempts)
            }
        });
        assert_eq!(result, Ok(3));
        assert_eq!(delay.ns, 2_000_000);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let mut delay = CountingDelay::default();
        let result: Result<(), _> = wait_for(&mut delay, 100, || Err(Error::Full));
        assert_eq!(result, Err(Error::Full));
        assert_eq!(delay.ns, 0);
    }
}
