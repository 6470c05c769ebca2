//! TBTP message model
//!
//! Wire-level structures carried in the Terminal Burst Time Plan. Fields
//! are plain integers in wire units (microseconds, raw ids); the scheduler
//! converts from its internal types when building the message.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Contention scheme code carried in a random-access window descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RaSchemeCode {
    /// Slotted ALOHA, single transmission per attempt.
    SlottedAloha = 1,
    /// CRDSA, multiple replicas per unique payload.
    Crdsa = 2,
}

/// One time-slot assignment: a burst opportunity for one terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAssignment {
    /// Terminal the slot belongs to.
    pub terminal: u16,
    /// Carrier the slot lives on.
    pub carrier: u16,
    /// Slot identifier within the carrier.
    pub slot_id: u16,
    /// Waveform the burst must use.
    pub waveform: u8,
    /// Burst start relative to the superframe start, in microseconds.
    pub start_offset_us: u32,
    /// Burst duration in microseconds.
    pub duration_us: u32,
}

/// One random-access contention window descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RaWindowEntry {
    /// Carrier the window lives on.
    pub carrier: u16,
    /// Window start relative to the superframe start, in microseconds.
    pub start_offset_us: u32,
    /// Window duration in microseconds.
    pub duration_us: u32,
    /// Contention scheme in force.
    pub scheme: RaSchemeCode,
    /// Burst replicas per unique payload (1 for slotted ALOHA).
    pub replicas: u8,
}

/// The Terminal Burst Time Plan broadcast once per superframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TbtpMessage {
    /// Beam the plan applies to.
    pub beam_id: u32,
    /// Superframe counter the plan is for.
    pub superframe: u32,
    /// DAMA slot assignments.
    pub assignments: Vec<SlotAssignment>,
    /// Random-access window descriptors.
    pub ra_windows: Vec<RaWindowEntry>,
}

impl TbtpMessage {
    /// Creates an empty plan for the given beam and superframe.
    pub fn new(beam_id: u32, superframe: u32) -> Self {
        Self {
            beam_id,
            superframe,
            assignments: Vec::new(),
            ra_windows: Vec::new(),
        }
    }

    /// Number of slot assignments carried.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }
}
