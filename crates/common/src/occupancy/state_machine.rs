//! Lease state machine
//!
//! Every legal (status, operation) pair lives in this one transition table.
//! Callers consult it before mutating anything, so an illegal request is
//! rejected before the transaction writes a single row.

use crate::db::models::LeaseStatus;
use crate::errors::{AppError, Result};

/// Operations that drive the lease lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaseOp {
    /// DRAFT -> Active, sets the start date
    Activate,
    /// Rent correction, no status change
    AdjustRent,
    /// Physical removal (with full occupancy unwind when Active)
    Delete,
    /// Tenant relocated elsewhere; the lease is kept for history
    MoveOut,
    /// Repoint a reservation at a different unit/bedroom in place
    Repoint,
}

impl LeaseOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseOp::Activate => "activate",
            LeaseOp::AdjustRent => "adjust rent",
            LeaseOp::Delete => "delete",
            LeaseOp::MoveOut => "move out",
            LeaseOp::Repoint => "repoint",
        }
    }
}

/// Outcome of a legal transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// The lease takes a new status
    To(LeaseStatus),
    /// The operation is legal but leaves the status untouched
    Unchanged,
    /// The lease row is physically deleted
    Remove,
}

/// The transition table: from-status x operation -> outcome or rejection
pub fn transition(from: LeaseStatus, op: LeaseOp) -> Result<Transition> {
    use LeaseOp::*;
    use LeaseStatus::*;

    match (from, op) {
        (Draft, Activate) => Ok(Transition::To(Active)),
        (Draft, AdjustRent) => Ok(Transition::Unchanged),
        (Draft, Delete) => Ok(Transition::Remove),
        (Draft, Repoint) => Ok(Transition::Unchanged),

        (Active, AdjustRent) => Ok(Transition::Unchanged),
        (Active, Delete) => Ok(Transition::Remove),
        (Active, MoveOut) => Ok(Transition::To(Moved)),

        // History rows can still be purged
        (Moved, Delete) => Ok(Transition::Remove),

        (from, op) => Err(AppError::IllegalTransition {
            from: String::from(from),
            op: op.as_str().to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_activates() {
        assert_eq!(
            transition(LeaseStatus::Draft, LeaseOp::Activate).unwrap(),
            Transition::To(LeaseStatus::Active)
        );
    }

    #[test]
    fn test_active_cannot_activate_again() {
        let err = transition(LeaseStatus::Active, LeaseOp::Activate).unwrap_err();
        assert!(err.to_string().contains("activate"));
    }

    #[test]
    fn test_moved_is_terminal_except_purge() {
        assert!(transition(LeaseStatus::Moved, LeaseOp::Activate).is_err());
        assert!(transition(LeaseStatus::Moved, LeaseOp::AdjustRent).is_err());
        assert!(transition(LeaseStatus::Moved, LeaseOp::MoveOut).is_err());
        assert_eq!(
            transition(LeaseStatus::Moved, LeaseOp::Delete).unwrap(),
            Transition::Remove
        );
    }

    #[test]
    fn test_delete_is_legal_from_any_live_state() {
        assert_eq!(
            transition(LeaseStatus::Draft, LeaseOp::Delete).unwrap(),
            Transition::Remove
        );
        assert_eq!(
            transition(LeaseStatus::Active, LeaseOp::Delete).unwrap(),
            Transition::Remove
        );
    }

    #[test]
    fn test_only_drafts_repoint() {
        assert_eq!(
            transition(LeaseStatus::Draft, LeaseOp::Repoint).unwrap(),
            Transition::Unchanged
        );
        assert!(transition(LeaseStatus::Active, LeaseOp::Repoint).is_err());
    }

    #[test]
    fn test_only_active_moves_out() {
        assert_eq!(
            transition(LeaseStatus::Active, LeaseOp::MoveOut).unwrap(),
            Transition::To(LeaseStatus::Moved)
        );
        assert!(transition(LeaseStatus::Draft, LeaseOp::MoveOut).is_err());
    }
}
