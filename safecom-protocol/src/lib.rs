//! Safe Communication framing engine
//!
//! This crate turns a raw, possibly noisy byte stream into a queue of
//! validated application frames. Bytes are pushed into a fixed ring by a
//! producer (typically a UART receive interrupt); a consumer periodically
//! "pools" the ring, detecting delimited, byte-stuffed and CRC-protected
//! frames and recording where each one starts.
//!
//! # Wire Format
//!
//! ```text
//! ┌────────┬──────────────────┬──────────┬──────────┬─────────┐
//! │ HEADER │ PAYLOAD          │ CRC HIGH │ CRC LOW  │ TRAILER │
//! │ 0xFF   │ stuffed, 1B..    │ stuffed  │ stuffed  │ 0x00    │
//! └────────┴──────────────────┴──────────┴──────────┴─────────┘
//! ```
//!
//! Any `0xFF`, `0x00` or `0xFE` inside the payload or CRC is sent as
//! `0xFE, byte ^ 0x20`. The CRC covers the unstuffed payload only. The first
//! payload byte is the frame identifier (see [`messages`]).
//!
//! # Data Model
//!
//! ```text
//!  ByteRing<N>                               FrameIndex<K>
//! ┌─────────────────────────────────────┐   ┌───────────────────┐
//! │ consumed │ examined │ unexamined    │   │ {id, start} oldest│
//! └─────────────────────────────────────┘   │ ...               │
//!            ▲          ▲               ▲    │ {id, start} latest│
//!      parse_start   proc_tail        head   └───────────────────┘
//! ```
//!
//! Every live index entry points at a header byte still present in the ring;
//! the producer evicts an entry before overwriting its header.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod config;
pub mod context;
pub mod crc;
pub mod error;
pub mod index;
pub mod messages;
pub mod parser;
pub mod ring;
pub mod store;
pub mod stuffing;
pub mod timeout;

pub use config::{
    Config, CrcProfile, PoolMode, BUFFER_SIZE, CRC_POLYNOMIAL, CRC_PROFILE, DEFAULT_TIMEOUT_MS,
    ESCAPE, HEADER, KNOWN_LIST_SIZE, POOLING_PERIOD_MS, TRAILER, XOR_MASK,
};
pub use context::{SafeCom, Stats};
pub use crc::{crc16, crc_update, crc_update_with, CRC_SEED};
pub use error::Error;
pub use index::{FrameEntry, FrameIndex};
pub use messages::{CmdCode, FrameId, Message, ReqCode, Status};
pub use parser::{Rejection, Scan};
pub use ring::ByteRing;
pub use store::FrameMeta;
pub use stuffing::{decode, encode, encode_to_vec, max_encoded_len};
pub use timeout::{wait_for, Timeout};
