//! The sink's five-state lifecycle machine (`spec.md` §4.2).
//!
//! Distinct from the teacher's wire-facing `protocol::sink::SinkState`,
//! which only distinguishes Running/Idle/Suspended for introspection: this
//! crate owns the real state machine, including the two states
//! (`Init`, `Unlinked`) that never cross the wire.

/// A sink's lifecycle state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SinkState {
    /// Constructed via `new`, not yet `put`.
    Init,
    Idle,
    Running,
    Suspended,
    /// Terminal; no further transition is possible.
    Unlinked,
}

impl SinkState {
    /// "Opened" per `spec.md` §4.2: {IDLE, RUNNING}.
    pub fn is_opened(self) -> bool {
        matches!(self, SinkState::Idle | SinkState::Running)
    }

    /// "Linked" per `spec.md` §4.2: {IDLE, RUNNING, SUSPENDED}.
    pub fn is_linked(self) -> bool {
        matches!(
            self,
            SinkState::Idle | SinkState::Running | SinkState::Suspended
        )
    }

    /// True once this is the terminal state.
    pub fn is_unlinked(self) -> bool {
        self == SinkState::Unlinked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opened_excludes_suspended_and_init() {
        assert!(SinkState::Idle.is_opened());
        assert!(SinkState::Running.is_opened());
        assert!(!SinkState::Suspended.is_opened());
        assert!(!SinkState::Init.is_opened());
        assert!(!SinkState::Unlinked.is_opened());
    }

    #[test]
    fn linked_includes_suspended() {
        assert!(SinkState::Suspended.is_linked());
        assert!(!SinkState::Init.is_linked());
        assert!(!SinkState::Unlinked.is_linked());
    }
}
