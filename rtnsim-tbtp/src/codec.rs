//! TBTP message encoding/decoding
//!
//! Fixed binary layout, big-endian:
//!
//! ```text
//! marker(1) version(1) beam_id(4) superframe(4) n_slots(2) n_windows(2)
//! n_slots   x [terminal(2) carrier(2) slot_id(2) waveform(1) start_us(4) duration_us(4)]
//! n_windows x [carrier(2) start_us(4) duration_us(4) scheme(1) replicas(1)]
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::message::{RaSchemeCode, RaWindowEntry, SlotAssignment, TbtpMessage};

/// TBTP message marker byte.
const TBTP_MARKER: u8 = 0x54;

/// Codec version.
const TBTP_VERSION: u8 = 1;

/// Fixed header length in bytes.
const HEADER_LEN: usize = 14;

/// Encoded length of one slot assignment.
const SLOT_ENTRY_LEN: usize = 15;

/// Encoded length of one random-access window descriptor.
const RA_ENTRY_LEN: usize = 12;

/// Errors that can occur during TBTP encoding/decoding
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TbtpCodecError {
    /// Invalid marker byte
    #[error("invalid TBTP marker: expected 0x{:02X}, got 0x{:02X}", TBTP_MARKER, .0)]
    InvalidMarker(u8),

    /// Version mismatch
    #[error("unsupported TBTP version: expected {}, got {}", TBTP_VERSION, .0)]
    UnsupportedVersion(u8),

    /// Unknown contention scheme code
    #[error("unknown random-access scheme code: {0}")]
    UnknownScheme(u8),

    /// Entry count does not fit the wire format
    #[error("message too large: {0} entries do not fit a 16-bit count")]
    MessageTooLarge(usize),

    /// Buffer too short
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Number of bytes needed
        needed: usize,
        /// Number of bytes available
        available: usize,
    },
}

/// Result type for TBTP codec operations
pub type Result<T> = std::result::Result<T, TbtpCodecError>;

/// Encodes a TBTP message into a byte buffer.
pub fn encode(msg: &TbtpMessage) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(
        HEADER_LEN + msg.assignments.len() * SLOT_ENTRY_LEN + msg.ra_windows.len() * RA_ENTRY_LEN,
    );
    encode_into(msg, &mut buf)?;
    Ok(buf.freeze())
}

/// Encodes a TBTP message into an existing buffer.
pub fn encode_into(msg: &TbtpMessage, buf: &mut BytesMut) -> Result<()> {
    let n_slots = u16::try_from(msg.assignments.len())
        .map_err(|_| TbtpCodecError::MessageTooLarge(msg.assignments.len()))?;
    let n_windows = u16::try_from(msg.ra_windows.len())
        .map_err(|_| TbtpCodecError::MessageTooLarge(msg.ra_windows.len()))?;

    buf.put_u8(TBTP_MARKER);
    buf.put_u8(TBTP_VERSION);
    buf.put_u32(msg.beam_id);
    buf.put_u32(msg.superframe);
    buf.put_u16(n_slots);
    buf.put_u16(n_windows);

    for slot in &msg.assignments {
        buf.put_u16(slot.terminal);
        buf.put_u16(slot.carrier);
        buf.put_u16(slot.slot_id);
        buf.put_u8(slot.waveform);
        buf.put_u32(slot.start_offset_us);
        buf.put_u32(slot.duration_us);
    }

    for window in &msg.ra_windows {
        buf.put_u16(window.carrier);
        buf.put_u32(window.start_offset_us);
        buf.put_u32(window.duration_us);
        buf.put_u8(window.scheme.into());
        buf.put_u8(window.replicas);
    }

    Ok(())
}

/// Decodes a TBTP message from a byte buffer.
pub fn decode(data: &[u8]) -> Result<TbtpMessage> {
    let mut buf = data;

    if buf.len() < HEADER_LEN {
        return Err(TbtpCodecError::BufferTooShort {
            needed: HEADER_LEN,
            available: buf.len(),
        });
    }

    let marker = buf.get_u8();
    if marker != TBTP_MARKER {
        return Err(TbtpCodecError::InvalidMarker(marker));
    }

    let version = buf.get_u8();
    if version != TBTP_VERSION {
        return Err(TbtpCodecError::UnsupportedVersion(version));
    }

    let beam_id = buf.get_u32();
    let superframe = buf.get_u32();
    let n_slots = buf.get_u16() as usize;
    let n_windows = buf.get_u16() as usize;

    let needed = n_slots * SLOT_ENTRY_LEN + n_windows * RA_ENTRY_LEN;
    if buf.len() < needed {
        return Err(TbtpCodecError::BufferTooShort {
            needed,
            available: buf.len(),
        });
    }

    let mut assignments = Vec::with_capacity(n_slots);
    for _ in 0..n_slots {
        assignments.push(SlotAssignment {
            terminal: buf.get_u16(),
            carrier: buf.get_u16(),
            slot_id: buf.get_u16(),
            waveform: buf.get_u8(),
            start_offset_us: buf.get_u32(),
            duration_us: buf.get_u32(),
        });
    }

    let mut ra_windows = Vec::with_capacity(n_windows);
    for _ in 0..n_windows {
        let carrier = buf.get_u16();
        let start_offset_us = buf.get_u32();
        let duration_us = buf.get_u32();
        let scheme_byte = buf.get_u8();
        let scheme = RaSchemeCode::try_from(scheme_byte)
            .map_err(|_| TbtpCodecError::UnknownScheme(scheme_byte))?;
        let replicas = buf.get_u8();
        ra_windows.push(RaWindowEntry {
            carrier,
            start_offset_us,
            duration_us,
            scheme,
            replicas,
        });
    }

    Ok(TbtpMessage {
        beam_id,
        superframe,
        assignments,
        ra_windows,
    })
}
