//! Build-time protocol constants and runtime context configuration
//!
//! Wire constants and capacities are fixed at compile time. Only the pool
//! mode and the default wait budget are chosen per context.

/// Frame start delimiter
pub const HEADER: u8 = 0xFF;

/// Frame end delimiter
pub const TRAILER: u8 = 0x00;

/// Escape byte announcing a stuffed byte
pub const ESCAPE: u8 = 0xFE;

/// Mask applied to a stuffed byte
pub const XOR_MASK: u8 = 0x20;

/// Default byte ring capacity
pub const BUFFER_SIZE: usize = 4096;

/// Default frame index capacity
pub const KNOWN_LIST_SIZE: usize = 16;

/// Wait budget used by getters called with [`Timeout::Default`](crate::Timeout::Default)
pub const DEFAULT_TIMEOUT_MS: u32 = 3000;

/// Cycle time of the dedicated pooling task
pub const POOLING_PERIOD_MS: u32 = 5;

/// CRC polynomial profile
///
/// The two profiles produce different checksums; both ends of a link must be
/// built with the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrcProfile {
    /// CCITT polynomial, matches common CRC peripherals
    Hardware,
    /// Polynomial used by the bit-wise software implementation
    Software,
}

impl CrcProfile {
    /// Generator polynomial of this profile
    pub const fn polynomial(self) -> u16 {
        match self {
            CrcProfile::Hardware => 0x1021,
            CrcProfile::Software => 0x2243,
        }
    }
}

/// Profile selected by the `hw-crc` feature
pub const CRC_PROFILE: CrcProfile = if cfg!(feature = "hw-crc") {
    CrcProfile::Hardware
} else {
    CrcProfile::Software
};

/// Polynomial used by [`crc_update`](crate::crc_update) and the codec
pub const CRC_POLYNOMIAL: u16 = CRC_PROFILE.polynomial();

/// Who drives the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PoolMode {
    /// Single-task integration: every push pools, waiting getters pool too
    Inline,
    /// A dedicated task pools periodically; getters only re-check
    #[default]
    Task,
}

/// Per-context configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Parser scheduling
    pub mode: PoolMode,
    /// Budget for [`Timeout::Default`](crate::Timeout::Default) waits, in ms
    pub default_timeout_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Task-driven pooling with the default wait budget
    pub const fn new() -> Self {
        Self {
            mode: PoolMode::Task,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Set the pool mode
    pub const fn with_mode(mut self, mode: PoolMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the default wait budget
    pub const fn with_default_timeout_ms(mut self, ms: u32) -> Self {
        self.default_timeout_ms = ms;
        self
    }
}
