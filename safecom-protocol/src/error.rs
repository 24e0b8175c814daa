//! Error type shared by the codec and the frame store

use core::fmt;

/// Errors returned by encode, decode and frame retrieval
///
/// Pushing bytes never fails and the parser never reports rejected
/// candidates, so these only surface from caller-initiated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Unspecified failure (malformed frame, missing trailer)
    Generic,
    /// No input or no destination was supplied
    NullArgument,
    /// Argument out of range (empty payload)
    InvalidArgument,
    /// Checksum did not match the frame contents
    CrcMismatch,
    /// Nothing to return
    Empty,
    /// Destination buffer or list cannot hold the result
    Full,
    /// No frame became available within the wait budget
    Timeout,
}

impl Error {
    /// Legacy numeric status code, success being `0`
    pub const fn code(self) -> i8 {
        match self {
            Error::Generic => -1,
            Error::NullArgument => -2,
            Error::InvalidArgument => -3,
            Error::CrcMismatch => -4,
            Error::Empty => -5,
            Error::Full => -6,
            Error::Timeout => -7,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Generic => "generic error",
            Error::NullArgument => "missing input or output buffer",
            Error::InvalidArgument => "invalid argument",
            Error::CrcMismatch => "CRC mismatch",
            Error::Empty => "no frame available",
            Error::Full => "buffer too small",
            Error::Timeout => "timed out waiting for a frame",
        };
        f.write_str(msg)
    }
}
