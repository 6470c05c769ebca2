//! rtnsim-tbtp - Terminal Burst Time Plan messages
//!
//! The TBTP is the control message the NCC broadcasts once per superframe:
//! it tells every terminal in the beam which time slots it may burst in,
//! with which waveform, and where the random-access contention windows
//! lie. This crate holds the wire-level message model and its binary
//! codec; building a TBTP from an allocation result is the scheduler's
//! business.

pub mod codec;
pub mod message;

pub use codec::{decode, encode, encode_into, TbtpCodecError};
pub use message::{RaSchemeCode, RaWindowEntry, SlotAssignment, TbtpMessage};
