//! Shared SafeCom contexts for multi-task firmware
//!
//! [`safecom_protocol::SafeCom`] is single-owner. This crate splits it into a
//! wait-free [`SafeComProducer`] for the UART interrupt or receive task, and a
//! [`SafeComChannel`] guarded by an `embassy-sync` blocking mutex for the
//! pooling task and the consumers.
//!
//! ```text
//!  UART RX ──push_byte──▶ SafeComProducer ─┐ spsc::Queue
//!                                          ▼
//!                         ┌────────────────┐ ◀──pool── run_pooling
//!                         │ SafeComChannel │
//!  consumer ◀─get/remove─ └────────────────┘
//! ```
//!
//! The mutex only serialises consumers. Use `CriticalSectionRawMutex` when
//! consumers run in different priority contexts, and `NoopRawMutex` when they
//! all run on one executor.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod channel;
pub mod task;

pub use channel::{SafeComChannel, SafeComProducer};
pub use task::{receive, run_pooling, run_receiver};
