//! Status state machine for issue reports.
//!
//! ```text
//! PENDING ──> INPROGRESS ──> RESOLVED
//!    │            └────────> REJECTED
//!    └──────> RESOLVED | REJECTED
//! ```
//!
//! `RESOLVED` and `REJECTED` are terminal. Requesting the current state is an
//! error, never a no-op.

use serde::{Deserialize, Serialize};

use crate::model::{IssueReport, IssueStatus};

/// A status change an administrator can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueTransition {
    StartProgress,
    Resolve,
    Reject,
}

impl IssueTransition {
    pub const ALL: [Self; 3] = [Self::StartProgress, Self::Resolve, Self::Reject];

    pub const fn target(self) -> IssueStatus {
        match self {
            Self::StartProgress => IssueStatus::InProgress,
            Self::Resolve => IssueStatus::Resolved,
            Self::Reject => IssueStatus::Rejected,
        }
    }
}

/// Why a transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Issue is already in progress")]
    AlreadyInProgress,

    #[error("Issue is already resolved")]
    AlreadyResolved,

    #[error("Issue is already rejected")]
    AlreadyRejected,

    #[error("Cannot resolve a rejected issue")]
    CannotResolveRejected,

    #[error("Cannot reject a resolved issue")]
    CannotRejectResolved,

    #[error("Cannot set issue to in-progress from {from}")]
    Terminal { from: IssueStatus },
}

/// The status `transition` leads to from `from`, or why it is illegal.
pub const fn next_status(
    from: IssueStatus,
    transition: IssueTransition,
) -> Result<IssueStatus, TransitionError> {
    use IssueStatus::{InProgress, Pending, Rejected, Resolved};
    use IssueTransition::{Reject, Resolve, StartProgress};

    match (from, transition) {
        (Pending, _) | (InProgress, Resolve | Reject) => Ok(transition.target()),
        (InProgress, StartProgress) => Err(TransitionError::AlreadyInProgress),
        (Resolved | Rejected, StartProgress) => Err(TransitionError::Terminal { from }),
        (Resolved, Resolve) => Err(TransitionError::AlreadyResolved),
        (Resolved, Reject) => Err(TransitionError::CannotRejectResolved),
        (Rejected, Resolve) => Err(TransitionError::CannotResolveRejected),
        (Rejected, Reject) => Err(TransitionError::AlreadyRejected),
    }
}

/// Apply `transition` to `report` in place, stamping `updated_at`.
///
/// The report is untouched when the transition is illegal.
pub fn apply(
    report: &mut IssueReport,
    transition: IssueTransition,
    now: i64,
) -> Result<(), TransitionError> {
    report.status = next_status(report.status, transition)?;
    report.updated_at = now;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::NewIssueReport;

    fn pending_report() -> IssueReport {
        NewIssueReport {
            reporter_name: "Alice".into(),
            reporter_email: "alice@example.com".into(),
            reporter_phone: None,
            title: "Pothole".into(),
            description: "Deep".into(),
            category: None,
            location: "Delhi".into(),
            address: "Main street".into(),
            picture: None,
            image_ref: None,
            owner_id: 1,
            created_at: 100,
        }
        .into_report(1)
    }

    #[test]
    fn full_transition_table() {
        use IssueStatus::{InProgress, Pending, Rejected, Resolved};
        use IssueTransition::{Reject, Resolve, StartProgress};

        let cases = [
            (Pending, StartProgress, Ok(InProgress)),
            (Pending, Resolve, Ok(Resolved)),
            (Pending, Reject, Ok(Rejected)),
            (InProgress, StartProgress, Err(TransitionError::AlreadyInProgress)),
            (InProgress, Resolve, Ok(Resolved)),
            (InProgress, Reject, Ok(Rejected)),
            (Resolved, StartProgress, Err(TransitionError::Terminal { from: Resolved })),
            (Resolved, Resolve, Err(TransitionError::AlreadyResolved)),
            (Resolved, Reject, Err(TransitionError::CannotRejectResolved)),
            (Rejected, StartProgress, Err(TransitionError::Terminal { from: Rejected })),
            (Rejected, Resolve, Err(TransitionError::CannotResolveRejected)),
            (Rejected, Reject, Err(TransitionError::AlreadyRejected)),
        ];

        for (from, transition, expected) in cases {
            assert_eq!(
                next_status(from, transition),
                expected,
                "{from} --{transition:?}-->"
            );
        }
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in [IssueStatus::Resolved, IssueStatus::Rejected] {
            for transition in IssueTransition::ALL {
                assert!(next_status(from, transition).is_err());
            }
        }
    }

    #[test]
    fn apply_stamps_updated_at() {
        let mut report = pending_report();
        apply(&mut report, IssueTransition::StartProgress, 500).unwrap();
        assert_eq!(report.status, IssueStatus::InProgress);
        assert_eq!(report.updated_at, 500);
        assert_eq!(report.created_at, 100);
    }

    #[test]
    fn illegal_apply_leaves_report_untouched() {
        let mut report = pending_report();
        apply(&mut report, IssueTransition::Resolve, 200).unwrap();
        let before = report.clone();

        let err = apply(&mut report, IssueTransition::Reject, 300).unwrap_err();
        assert_eq!(err, TransitionError::CannotRejectResolved);
        assert_eq!(report, before);
    }

    #[test]
    fn terminal_message_names_the_state() {
        let err = next_status(IssueStatus::Rejected, IssueTransition::StartProgress).unwrap_err();
        assert_eq!(err.to_string(), "Cannot set issue to in-progress from REJECTED");
    }
}
