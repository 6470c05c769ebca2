//! Core identifier and counter types shared across the rtnsim crates.
//!
//! Terminals, carriers, frames and waveforms are addressed by small integer
//! ids; all ownership structures key off these ids instead of holding
//! references to each other.

use serde::{Deserialize, Serialize};

/// Identifier of a user terminal (UT) within a beam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TerminalId(pub u16);

impl std::fmt::Display for TerminalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "UT{}", self.0)
    }
}

impl From<u16> for TerminalId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Identifier of a return-link carrier within a superframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CarrierId(pub u16);

impl std::fmt::Display for CarrierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "carrier{}", self.0)
    }
}

impl From<u16> for CarrierId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

/// Identifier of a frame inside the superframe structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u8);

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame{}", self.0)
    }
}

/// Identifier of a burst waveform in the waveform table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WaveformId(pub u8);

impl std::fmt::Display for WaveformId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "wf{}", self.0)
    }
}

/// DAMA capacity categories, in decreasing priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityCategory {
    /// Constant Rate Assignment - configured, guaranteed rate.
    Cra,
    /// Rate-Based Dynamic Capacity - requested rate, decays when stale.
    Rbdc,
    /// Volume-Based Dynamic Capacity - requested volume backlog.
    Vbdc,
    /// Free Capacity Assignment - opportunistic leftover capacity.
    Fca,
}

impl std::fmt::Display for CapacityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityCategory::Cra => write!(f, "CRA"),
            CapacityCategory::Rbdc => write!(f, "RBDC"),
            CapacityCategory::Vbdc => write!(f, "VBDC"),
            CapacityCategory::Fca => write!(f, "FCA"),
        }
    }
}

/// Monotonic superframe counter driving the allocation cycles.
///
/// One allocation cycle runs per counter value; the counter is carried in
/// every TBTP message so terminals can correlate grants with superframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SuperframeCounter(u32);

impl SuperframeCounter {
    /// Creates a counter at the given value.
    pub fn new(count: u32) -> Self {
        Self(count)
    }

    /// Creates the initial counter (superframe 0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the counter value.
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Advances to the next superframe.
    pub fn advance(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }

    /// Returns true when this superframe starts a re-homing epoch of the
    /// given length.
    pub fn is_epoch_boundary(&self, epoch_superframes: u32) -> bool {
        epoch_superframes != 0 && self.0 % epoch_superframes == 0
    }
}

impl std::fmt::Display for SuperframeCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SF{}", self.0)
    }
}

impl From<u32> for SuperframeCounter {
    fn from(count: u32) -> Self {
        Self(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(TerminalId(7).to_string(), "UT7");
        assert_eq!(CarrierId(2).to_string(), "carrier2");
        assert_eq!(FrameId(0).to_string(), "frame0");
        assert_eq!(WaveformId(3).to_string(), "wf3");
    }

    #[test]
    fn test_terminal_id_ordering() {
        let mut ids = vec![TerminalId(3), TerminalId(1), TerminalId(2)];
        ids.sort();
        assert_eq!(ids, vec![TerminalId(1), TerminalId(2), TerminalId(3)]);
    }

    #[test]
    fn test_category_display() {
        assert_eq!(CapacityCategory::Cra.to_string(), "CRA");
        assert_eq!(CapacityCategory::Fca.to_string(), "FCA");
    }

    #[test]
    fn test_superframe_counter_advance() {
        let mut counter = SuperframeCounter::initial();
        assert_eq!(counter.value(), 0);
        counter.advance();
        counter.advance();
        assert_eq!(counter.value(), 2);
        assert_eq!(counter.to_string(), "SF2");
    }

    #[test]
    fn test_superframe_counter_wraps() {
        let mut counter = SuperframeCounter::new(u32::MAX);
        counter.advance();
        assert_eq!(counter.value(), 0);
    }

    #[test]
    fn test_epoch_boundary() {
        assert!(SuperframeCounter::new(0).is_epoch_boundary(10));
        assert!(!SuperframeCounter::new(5).is_epoch_boundary(10));
        assert!(SuperframeCounter::new(20).is_epoch_boundary(10));
        // epoch length 0 disables re-homing entirely
        assert!(!SuperframeCounter::new(0).is_epoch_boundary(0));
    }
}
