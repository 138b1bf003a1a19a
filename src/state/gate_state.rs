//! Pause gate state definitions
//!
//! The gate cycles `Open -> Closing -> Cooling -> Open`. Only the backoff
//! cycle that won the test-and-close moves it out of `Open`, and every cycle
//! ends back in `Open`.

use std::fmt;

/// Represents the current state of the shared pause gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    /// Fetchers may start new requests
    Open,

    /// A backoff cycle has claimed the gate and is rotating the identity
    Closing,

    /// The fleet is sleeping out the cooldown
    Cooling,
}

impl GateState {
    /// Returns true if new requests may start
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns true if fetchers must wait before issuing a request
    pub fn is_closed(&self) -> bool {
        !self.is_open()
    }

    /// Checks whether moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: GateState) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Closing)
                | (Self::Closing, Self::Cooling)
                | (Self::Closing, Self::Open)
                | (Self::Cooling, Self::Open)
        )
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Cooling => "cooling",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_closed() {
        assert!(GateState::Open.is_open());
        assert!(GateState::Closing.is_closed());
        assert!(GateState::Cooling.is_closed());
    }

    #[test]
    fn test_cycle_transitions() {
        assert!(GateState::Open.can_transition_to(GateState::Closing));
        assert!(GateState::Closing.can_transition_to(GateState::Cooling));
        assert!(GateState::Cooling.can_transition_to(GateState::Open));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!GateState::Open.can_transition_to(GateState::Cooling));
        assert!(!GateState::Cooling.can_transition_to(GateState::Closing));
        assert!(!GateState::Open.can_transition_to(GateState::Open));
    }

    #[test]
    fn test_display() {
        assert_eq!(GateState::Cooling.to_string(), "cooling");
    }
}
