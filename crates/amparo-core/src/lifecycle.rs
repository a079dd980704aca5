use amparo_types::models::Status;

use crate::error::{Error, Result};
use crate::policy::Capability;

/// The status state machine, expressed as the capability each edge requires.
///
/// Returns `None` for a same-state request (a no-op, not an error) and
/// `InvalidTransition` for every edge the machine does not have. `done` and
/// `cancelled` are terminal.
pub fn required_capability(from: Status, to: Status) -> Result<Option<Capability>> {
    if from == to {
        return Ok(None);
    }
    match (from, to) {
        (Status::Triage, Status::InProgress) | (Status::Triage, Status::Cancelled) => {
            Ok(Some(Capability::Approve))
        }
        (Status::InProgress, Status::Done) => Ok(Some(Capability::Complete)),
        _ => Err(Error::InvalidTransition { from, to }),
    }
}

/// Triage decisions stamp updated_by/updated_at/update_reason on the record.
pub fn is_triage_decision(from: Status, to: Status) -> bool {
    from == Status::Triage && matches!(to, Status::InProgress | Status::Cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_edges() {
        assert_eq!(
            required_capability(Status::Triage, Status::InProgress).unwrap(),
            Some(Capability::Approve)
        );
        assert_eq!(
            required_capability(Status::Triage, Status::Cancelled).unwrap(),
            Some(Capability::Approve)
        );
        assert_eq!(
            required_capability(Status::InProgress, Status::Done).unwrap(),
            Some(Capability::Complete)
        );
    }

    #[test]
    fn same_state_is_a_noop() {
        for s in Status::ALL {
            assert_eq!(required_capability(s, s).unwrap(), None);
        }
    }

    #[test]
    fn triage_cannot_jump_straight_to_done() {
        assert!(matches!(
            required_capability(Status::Triage, Status::Done),
            Err(Error::InvalidTransition {
                from: Status::Triage,
                to: Status::Done
            })
        ));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in [Status::Done, Status::Cancelled] {
            for to in Status::ALL {
                if to == terminal {
                    continue;
                }
                assert!(
                    required_capability(terminal, to).is_err(),
                    "{terminal} -> {to} should be rejected"
                );
            }
        }
    }

    #[test]
    fn no_reopening_in_progress() {
        assert!(required_capability(Status::InProgress, Status::Triage).is_err());
        assert!(required_capability(Status::InProgress, Status::Cancelled).is_err());
    }

    #[test]
    fn triage_decisions_are_stamped() {
        assert!(is_triage_decision(Status::Triage, Status::InProgress));
        assert!(is_triage_decision(Status::Triage, Status::Cancelled));
        assert!(!is_triage_decision(Status::InProgress, Status::Done));
    }
}
