// src/sequencer/state.rs

use tracing::info;

/// Bring-up phases, in order.
///
/// Transitions are strictly sequential; the only shortcut is that any
/// non-terminal phase may jump to `Terminating` when a shutdown request
/// arrives mid-bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Launching,
    WaitingReady,
    SettingUp,
    RunningForeground,
    Idling,
    Terminating,
    Terminated,
}

impl Phase {
    /// The next phase in the sequential bring-up order, if any.
    pub fn successor(self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::Launching),
            Phase::Launching => Some(Phase::WaitingReady),
            Phase::WaitingReady => Some(Phase::SettingUp),
            Phase::SettingUp => Some(Phase::RunningForeground),
            Phase::RunningForeground => Some(Phase::Idling),
            Phase::Idling => Some(Phase::Terminating),
            Phase::Terminating => Some(Phase::Terminated),
            Phase::Terminated => None,
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: Phase) -> bool {
        if self.successor() == Some(next) {
            return true;
        }
        // Shutdown can arrive at any point before termination has begun.
        next == Phase::Terminating
            && !matches!(self, Phase::Terminating | Phase::Terminated)
    }
}

/// Tracks the sequencer's current phase and logs every transition.
#[derive(Debug)]
pub struct PhaseTracker {
    current: Phase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: Phase::Idle,
        }
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Move to `next`, logging the transition.
    ///
    /// Illegal transitions indicate a sequencer bug; they are asserted in
    /// debug builds and logged regardless.
    pub fn advance(&mut self, next: Phase) {
        debug_assert!(
            self.current.can_transition_to(next),
            "illegal phase transition {:?} -> {:?}",
            self.current,
            next
        );
        info!(from = ?self.current, to = ?next, "phase transition");
        self.current = next;
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_chain_is_legal() {
        let order = [
            Phase::Idle,
            Phase::Launching,
            Phase::WaitingReady,
            Phase::SettingUp,
            Phase::RunningForeground,
            Phase::Idling,
            Phase::Terminating,
            Phase::Terminated,
        ];
        for pair in order.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{:?} -> {:?} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn skipping_ahead_is_illegal() {
        assert!(!Phase::Idle.can_transition_to(Phase::WaitingReady));
        assert!(!Phase::Launching.can_transition_to(Phase::SettingUp));
        assert!(!Phase::WaitingReady.can_transition_to(Phase::Idling));
    }

    #[test]
    fn going_backwards_is_illegal() {
        assert!(!Phase::SettingUp.can_transition_to(Phase::Launching));
        assert!(!Phase::Idling.can_transition_to(Phase::RunningForeground));
    }

    #[test]
    fn shutdown_shortcut_from_any_live_phase() {
        for phase in [
            Phase::Idle,
            Phase::Launching,
            Phase::WaitingReady,
            Phase::SettingUp,
            Phase::RunningForeground,
            Phase::Idling,
        ] {
            assert!(phase.can_transition_to(Phase::Terminating));
        }
    }

    #[test]
    fn terminal_phases_do_not_restart_termination() {
        assert!(!Phase::Terminating.can_transition_to(Phase::Terminating));
        assert!(!Phase::Terminated.can_transition_to(Phase::Terminating));
        assert_eq!(Phase::Terminated.successor(), None);
    }

    #[test]
    fn tracker_walks_the_chain() {
        let mut tracker = PhaseTracker::new();
        assert_eq!(tracker.current(), Phase::Idle);
        tracker.advance(Phase::Launching);
        tracker.advance(Phase::WaitingReady);
        assert_eq!(tracker.current(), Phase::WaitingReady);
    }
}
