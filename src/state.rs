//! Instance lifecycle states and the transition table.

use std::fmt;

use crate::error::TransitionError;

/// Lifecycle state of a test instance.
///
/// Failure states are distinct from their success counterparts. Only
/// `stop_and_cleanup` may run after a failed start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Created,
    InstallationFailed,
    Installed,
    StartFailed,
    Started,
    StopFailed,
    Stopped,
}

impl State {
    pub const ALL: [State; 7] = [
        State::Created,
        State::InstallationFailed,
        State::Installed,
        State::StartFailed,
        State::Started,
        State::StopFailed,
        State::Stopped,
    ];

    /// States reachable from `self` in one transition.
    pub fn allowed_transitions(self) -> &'static [State] {
        match self {
            State::Created => &[State::Installed, State::InstallationFailed],
            State::Installed => &[State::Started, State::StartFailed],
            State::Started => &[State::Stopped, State::StopFailed],
            State::StartFailed => &[State::Stopped],
            State::InstallationFailed | State::StopFailed | State::Stopped => &[],
        }
    }

    pub fn can_transition_to(self, next: State) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// Guard run before every mutating operation.
    pub fn check_transition(self, next: State) -> Result<State, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_transitions().is_empty()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Created => "CREATED",
            State::InstallationFailed => "INSTALLATION_FAILED",
            State::Installed => "INSTALLED",
            State::StartFailed => "START_FAILED",
            State::Started => "STARTED",
            State::StopFailed => "STOP_FAILED",
            State::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(from: State, to: State) -> bool {
        use State::*;
        matches!(
            (from, to),
            (Created, Installed)
                | (Created, InstallationFailed)
                | (Installed, Started)
                | (Installed, StartFailed)
                | (Started, Stopped)
                | (Started, StopFailed)
                | (StartFailed, Stopped)
        )
    }

    #[test]
    fn test_every_pair_matches_table() {
        for from in State::ALL {
            for to in State::ALL {
                let result = from.check_transition(to);
                if expected(from, to) {
                    assert_eq!(result, Ok(to), "{from} -> {to} should be allowed");
                } else {
                    assert_eq!(
                        result,
                        Err(TransitionError { from, to }),
                        "{from} -> {to} should be rejected"
                    );
                }
            }
        }
    }

    #[test]
    fn test_terminal_states() {
        let terminal: Vec<State> = State::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![State::InstallationFailed, State::StopFailed, State::Stopped]
        );
    }

    #[test]
    fn test_error_names_both_states() {
        let err = State::Started.check_transition(State::Installed).unwrap_err();
        assert_eq!(err.to_string(), "cannot transition from STARTED to INSTALLED");
    }
}
