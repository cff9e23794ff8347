//! Transition ids and lifecycle states

use std::fmt;

/// Identifies one transition across every target it was scheduled on
///
/// Ids are allocated in increasing order, so a larger id always belongs to a
/// later transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransitionId(u64);

impl TransitionId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a schedule record
///
/// States only move forward. The two shortcuts straight to `Ended` are
/// cancellation (from `Scheduled`/`Starting`) and interruption (from
/// `Started`/`Running`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransitionState {
    Created,
    Scheduled,
    Starting,
    Started,
    Running,
    Ending,
    Ended,
}

impl TransitionState {
    /// Past `Starting` and before `Ending`: stopping now is an interruption
    pub fn is_active(self) -> bool {
        self > TransitionState::Starting && self < TransitionState::Ending
    }

    /// Not yet past `Starting`: stopping now is a silent cancellation
    pub fn is_pending(self) -> bool {
        self <= TransitionState::Starting
    }

    pub fn is_ended(self) -> bool {
        self == TransitionState::Ended
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransitionState::Created => "created",
            TransitionState::Scheduled => "scheduled",
            TransitionState::Starting => "starting",
            TransitionState::Started => "started",
            TransitionState::Running => "running",
            TransitionState::Ending => "ending",
            TransitionState::Ended => "ended",
        }
    }
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_windows() {
        use TransitionState::*;

        for state in [Created, Scheduled, Starting] {
            assert!(state.is_pending());
            assert!(!state.is_active());
        }
        for state in [Started, Running] {
            assert!(state.is_active());
            assert!(!state.is_pending());
        }
        for state in [Ending, Ended] {
            assert!(!state.is_active());
            assert!(!state.is_pending());
        }
        assert!(Created < Ended);
    }

    #[test]
    fn test_id_ordering_and_display() {
        let a = TransitionId::from_raw(1);
        let b = TransitionId::from_raw(2);
        assert!(a < b);
        assert_eq!(b.to_raw(), 2);
        assert_eq!(a.to_string(), "#1");
        assert_eq!(TransitionState::Running.to_string(), "running");
    }
}
