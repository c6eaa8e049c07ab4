//! Migration lifecycle
//!
//! `Pending -> Prepared -> Enacted`, with `Failed` reachable from any
//! non-terminal state. Re-preparing a prepared migration is allowed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one migration within a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    /// Not yet prepared in this run
    #[default]
    Pending,
    /// Prepare succeeded; bundle available
    Prepared,
    /// Roots committed
    Enacted,
    /// Prepare or enact failed
    Failed,
}

impl MigrationState {
    /// Check if no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Enacted | Self::Failed)
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Prepared => f.write_str("prepared"),
            Self::Enacted => f.write_str("enacted"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// States reachable from `from`
#[must_use]
pub fn allowed_transitions(from: MigrationState) -> Vec<MigrationState> {
    use MigrationState::{Enacted, Failed, Pending, Prepared};
    match from {
        Pending => vec![Prepared, Failed],
        Prepared => vec![Prepared, Enacted, Failed],
        Enacted | Failed => vec![],
    }
}

/// Check a transition
///
/// # Errors
/// Returns the offending pair when the transition is not allowed.
pub fn validate_transition(
    from: MigrationState,
    to: MigrationState,
) -> Result<(), (MigrationState, MigrationState)> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err((from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn happy_path() {
        assert!(validate_transition(MigrationState::Pending, MigrationState::Prepared).is_ok());
        assert!(validate_transition(MigrationState::Prepared, MigrationState::Prepared).is_ok());
        assert!(validate_transition(MigrationState::Prepared, MigrationState::Enacted).is_ok());
    }

    #[test]
    fn enact_requires_prepare() {
        assert!(validate_transition(MigrationState::Pending, MigrationState::Enacted).is_err());
        assert!(validate_transition(MigrationState::Failed, MigrationState::Enacted).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(MigrationState::Enacted.is_terminal());
        assert!(MigrationState::Failed.is_terminal());
        assert!(!MigrationState::Prepared.is_terminal());
    }

    fn any_state() -> impl Strategy<Value = MigrationState> {
        prop_oneof![
            Just(MigrationState::Pending),
            Just(MigrationState::Prepared),
            Just(MigrationState::Enacted),
            Just(MigrationState::Failed),
        ]
    }

    proptest! {
        #[test]
        fn prop_terminal_states_have_no_exits(from in any_state(), to in any_state()) {
            if from.is_terminal() {
                prop_assert!(validate_transition(from, to).is_err());
            } else {
                prop_assert_eq!(
                    validate_transition(from, to).is_ok(),
                    allowed_transitions(from).contains(&to)
                );
            }
        }
    }
}
