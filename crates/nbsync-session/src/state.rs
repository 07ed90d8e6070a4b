//! Document lifecycle state machine

use std::fmt;

/// Lifecycle of an open document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentState {
    Unloaded,
    Loading,
    Ready,
    Closing,
    Closed,
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Transition not in [`allowed_transitions`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal document state transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: DocumentState,
    pub to: DocumentState,
}

/// Validates a state transition
///
/// # Errors
/// [`IllegalTransition`] if `to` is not reachable from `from`
pub fn validate_transition(from: DocumentState, to: DocumentState) -> Result<(), IllegalTransition> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(IllegalTransition { from, to })
    }
}

#[must_use]
pub fn allowed_transitions(from: DocumentState) -> Vec<DocumentState> {
    use DocumentState::{Closed, Closing, Loading, Ready, Unloaded};
    match from {
        Unloaded => vec![Loading],
        Loading => vec![Ready, Closed],
        Ready => vec![Closing, Closed],
        Closing => vec![Closed],
        Closed => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn happy_path() {
        assert!(validate_transition(DocumentState::Unloaded, DocumentState::Loading).is_ok());
        assert!(validate_transition(DocumentState::Loading, DocumentState::Ready).is_ok());
        assert!(validate_transition(DocumentState::Ready, DocumentState::Closing).is_ok());
        assert!(validate_transition(DocumentState::Closing, DocumentState::Closed).is_ok());
    }

    #[test]
    fn failure_paths() {
        // load failure and consistency teardown
        assert!(validate_transition(DocumentState::Loading, DocumentState::Closed).is_ok());
        assert!(validate_transition(DocumentState::Ready, DocumentState::Closed).is_ok());

        assert!(validate_transition(DocumentState::Closed, DocumentState::Ready).is_err());
        assert!(validate_transition(DocumentState::Closing, DocumentState::Ready).is_err());
        assert_eq!(
            validate_transition(DocumentState::Unloaded, DocumentState::Ready)
                .unwrap_err()
                .to_string(),
            "illegal document state transition: Unloaded -> Ready"
        );
    }

    fn any_state() -> impl Strategy<Value = DocumentState> {
        prop_oneof![
            Just(DocumentState::Unloaded),
            Just(DocumentState::Loading),
            Just(DocumentState::Ready),
            Just(DocumentState::Closing),
            Just(DocumentState::Closed),
        ]
    }

    proptest! {
        #[test]
        fn prop_validation_matches_allowed(from in any_state(), to in any_state()) {
            let allowed = allowed_transitions(from);
            prop_assert_eq!(validate_transition(from, to).is_ok(), allowed.contains(&to));
        }

        #[test]
        fn prop_closed_is_terminal(to in any_state()) {
            prop_assert!(validate_transition(DocumentState::Closed, to).is_err());
        }
    }
}
