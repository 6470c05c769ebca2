//! Allocation cycle state machine
//!
//! One iteration runs per superframe:
//!
//! ```text
//! Idle -> CollectingRequests -> Allocating -> Publishing -> Idle
//!                                    |
//!                                    +--> Idle (cycle aborted)
//! ```
//!
//! Only the `Allocating` state may mutate allocation contexts; logon,
//! logoff and C/N0 updates arriving in any other state are queued and
//! applied at the next `Allocating` entry.

use rtnsim_common::Error;

/// State of the allocation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    /// Between cycles; nothing in flight.
    #[default]
    Idle,
    /// Accumulating capacity requests until the cycle's deadline.
    CollectingRequests,
    /// Running the superframe allocator over the frozen snapshot.
    Allocating,
    /// Serializing and handing off the burst time plan.
    Publishing,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleState::Idle => write!(f, "Idle"),
            CycleState::CollectingRequests => write!(f, "CollectingRequests"),
            CycleState::Allocating => write!(f, "Allocating"),
            CycleState::Publishing => write!(f, "Publishing"),
        }
    }
}

/// Enforces the cyclic state transitions of the beam scheduler.
#[derive(Debug, Default)]
pub struct CycleStateMachine {
    state: CycleState,
}

impl CycleStateMachine {
    /// Creates the machine in `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> CycleState {
        self.state
    }

    /// `Idle -> CollectingRequests`
    pub fn begin_collecting(&mut self) -> Result<(), Error> {
        self.transition(CycleState::Idle, CycleState::CollectingRequests)
    }

    /// `CollectingRequests -> Allocating` at the request deadline.
    pub fn begin_allocating(&mut self) -> Result<(), Error> {
        self.transition(CycleState::CollectingRequests, CycleState::Allocating)
    }

    /// `Allocating -> Publishing` once a plan exists.
    pub fn begin_publishing(&mut self) -> Result<(), Error> {
        self.transition(CycleState::Allocating, CycleState::Publishing)
    }

    /// `Publishing -> Idle`, completing the cycle.
    pub fn complete(&mut self) -> Result<(), Error> {
        self.transition(CycleState::Publishing, CycleState::Idle)
    }

    /// `Allocating -> Idle` when the cycle is aborted and the prior plan
    /// stays in force.
    pub fn abort(&mut self) -> Result<(), Error> {
        self.transition(CycleState::Allocating, CycleState::Idle)
    }

    fn transition(&mut self, from: CycleState, to: CycleState) -> Result<(), Error> {
        if self.state != from {
            return Err(Error::StateMachine(format!(
                "invalid cycle transition {} -> {} (currently {})",
                from, to, self.state
            )));
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let mut sm = CycleStateMachine::new();
        assert_eq!(sm.state(), CycleState::Idle);
        sm.begin_collecting().unwrap();
        sm.begin_allocating().unwrap();
        sm.begin_publishing().unwrap();
        sm.complete().unwrap();
        assert_eq!(sm.state(), CycleState::Idle);
    }

    #[test]
    fn test_aborted_cycle() {
        let mut sm = CycleStateMachine::new();
        sm.begin_collecting().unwrap();
        sm.begin_allocating().unwrap();
        sm.abort().unwrap();
        assert_eq!(sm.state(), CycleState::Idle);
        // the next cycle starts cleanly
        sm.begin_collecting().unwrap();
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let mut sm = CycleStateMachine::new();
        assert!(sm.begin_allocating().is_err());
        sm.begin_collecting().unwrap();
        assert!(sm.begin_publishing().is_err());
        assert!(sm.begin_collecting().is_err());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CycleState::Idle.to_string(), "Idle");
        assert_eq!(
            CycleState::CollectingRequests.to_string(),
            "CollectingRequests"
        );
        assert_eq!(CycleState::Allocating.to_string(), "Allocating");
        assert_eq!(CycleState::Publishing.to_string(), "Publishing");
    }
}
