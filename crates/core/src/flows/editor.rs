//! Local, storage-free edits of an approval flow.
//!
//! Every operation takes the current list by reference and returns a new list,
//! or a [`FlowEditError`] when the edit would break a flow invariant. The input
//! is never touched, so a refused edit leaves the caller's state as it was.

use chrono::Utc;
use thiserror::Error;

use crate::domain::approval::{ApprovalStep, Approver};
use crate::flows::invariants::{self, FlowIndexError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowEditError {
    #[error("approval flow is frozen because a step was rejected")]
    Frozen,
    #[error("approval step {index} is decided or precedes the current step and cannot change")]
    StepLocked { index: usize },
    #[error("decided approval step {index} must be resubmitted unchanged")]
    HistoryChanged { index: usize },
    #[error("approval step {index} cannot be decided by editing the flow")]
    DecisionSubmitted { index: usize },
    #[error("approval flow has no unsaved changes")]
    NoChanges,
    #[error(transparent)]
    Index(#[from] FlowIndexError),
}

pub fn reorder(
    steps: &[ApprovalStep],
    from: usize,
    to: usize,
    current: Option<usize>,
) -> Result<Vec<ApprovalStep>, FlowEditError> {
    ensure_open(steps)?;
    ensure_editable(steps, from, current)?;
    ensure_editable(steps, to, current)?;

    let mut next = steps.to_vec();
    let moved = next.remove(from);
    next.insert(to, moved);
    Ok(next)
}

pub fn remove(
    steps: &[ApprovalStep],
    index: usize,
    current: Option<usize>,
) -> Result<Vec<ApprovalStep>, FlowEditError> {
    ensure_open(steps)?;
    if !invariants::can_delete(steps, index, current)? {
        return Err(FlowEditError::StepLocked { index });
    }

    let mut next = steps.to_vec();
    next.remove(index);
    Ok(next)
}

/// Adds a pending step for `approver` at the tail of the flow.
pub fn append(
    approver: Approver,
    steps: &[ApprovalStep],
) -> Result<Vec<ApprovalStep>, FlowEditError> {
    if !invariants::can_append(steps) {
        return Err(FlowEditError::Frozen);
    }

    let mut next = Vec::with_capacity(steps.len() + 1);
    next.extend_from_slice(steps);
    next.push(ApprovalStep::pending(approver, Utc::now()));
    Ok(next)
}

fn ensure_open(steps: &[ApprovalStep]) -> Result<(), FlowEditError> {
    if invariants::is_frozen(steps) {
        return Err(FlowEditError::Frozen);
    }
    Ok(())
}

fn ensure_editable(
    steps: &[ApprovalStep],
    index: usize,
    current: Option<usize>,
) -> Result<(), FlowEditError> {
    if invariants::is_editable(steps, index, current)? {
        Ok(())
    } else {
        Err(FlowEditError::StepLocked { index })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::approval::{
        ApprovalParty, ApprovalStatus, ApprovalStep, ApprovalStepId, Approver, ApproverId,
    };
    use crate::flows::invariants::FlowIndexError;

    use super::{append, remove, reorder, FlowEditError};
    use ApprovalStatus::{Approved, Pending, Rejected};

    fn approver(id: i64) -> Approver {
        Approver {
            id: ApproverId(id),
            name: format!("Approver {id}"),
            email: format!("approver{id}@example.com"),
            role: ApprovalParty::Legal,
        }
    }

    fn flow(statuses: &[ApprovalStatus]) -> Vec<ApprovalStep> {
        let now = Utc::now();
        statuses
            .iter()
            .enumerate()
            .map(|(index, status)| ApprovalStep {
                id: ApprovalStepId(format!("STEP-{index}")),
                status: *status,
                assignee: approver(index as i64 + 1),
                created_at: now,
                updated_at: now,
                info_requested: None,
            })
            .collect()
    }

    fn ids(steps: &[ApprovalStep]) -> Vec<&str> {
        steps.iter().map(|step| step.id.0.as_str()).collect()
    }

    #[test]
    fn reorder_swaps_pending_steps_at_or_after_current() {
        let steps = flow(&[Approved, Pending, Pending, Pending]);

        let next = reorder(&steps, 2, 3, Some(1)).expect("both steps are editable");

        assert_eq!(ids(&next), ["STEP-0", "STEP-1", "STEP-3", "STEP-2"]);
        assert!(next.iter().skip(1).all(|step| step.status == Pending));
    }

    #[test]
    fn reorder_moves_and_keeps_relative_order() {
        let steps = flow(&[Approved, Pending, Pending, Pending]);

        let next = reorder(&steps, 3, 1, Some(1)).expect("move onto current position");

        assert_eq!(ids(&next), ["STEP-0", "STEP-3", "STEP-1", "STEP-2"]);
    }

    #[test]
    fn reorder_into_history_is_refused() {
        let steps = flow(&[Approved, Pending, Pending, Pending]);

        let error = reorder(&steps, 3, 0, Some(1)).expect_err("index 0 is approved history");

        assert_eq!(error, FlowEditError::StepLocked { index: 0 });
    }

    #[test]
    fn remove_closes_the_gap() {
        let steps = flow(&[Pending, Pending, Approved]);

        let next = remove(&steps, 1, Some(0)).expect("pending step after current");

        assert_eq!(ids(&next), ["STEP-0", "STEP-2"]);
        assert_eq!(next[1].status, Approved);
    }

    #[test]
    fn remove_refuses_decided_steps() {
        let steps = flow(&[Pending, Pending, Approved]);

        assert_eq!(remove(&steps, 2, Some(0)), Err(FlowEditError::StepLocked { index: 2 }));
    }

    #[test]
    fn append_adds_pending_step_at_tail() {
        let steps = flow(&[Approved, Pending, Pending]);

        let next = append(approver(9), &steps).expect("open flow accepts new steps");

        assert_eq!(next.len(), 4);
        assert_eq!(&next[..3], &steps[..]);
        assert_eq!(next[3].status, Pending);
        assert_eq!(next[3].assignee.id, ApproverId(9));
        assert!(next[3].id.is_placeholder());
        assert!(next[3].info_requested.is_none());
    }

    #[test]
    fn frozen_flow_refuses_every_edit_regardless_of_inputs() {
        let steps = flow(&[Approved, Rejected, Pending, Pending]);

        assert_eq!(append(approver(3), &steps), Err(FlowEditError::Frozen));
        assert_eq!(remove(&steps, 3, Some(1)), Err(FlowEditError::Frozen));
        assert_eq!(remove(&steps, 40, None), Err(FlowEditError::Frozen));
        assert_eq!(reorder(&steps, 2, 3, Some(1)), Err(FlowEditError::Frozen));
        assert_eq!(reorder(&steps, 2, 3, None), Err(FlowEditError::Frozen));
    }

    #[test]
    fn history_is_never_altered() {
        let steps = flow(&[Approved, Approved, Pending, Pending, Pending]);
        let current = Some(2);

        let candidates = [
            reorder(&steps, 2, 4, current),
            reorder(&steps, 4, 2, current),
            remove(&steps, 3, current),
            append(approver(7), &steps),
        ];

        for next in candidates.into_iter().flatten() {
            assert_eq!(&next[..2], &steps[..2]);
        }
        for index in 0..2 {
            assert!(remove(&steps, index, current).is_err());
            assert!(reorder(&steps, index, 3, current).is_err());
            assert!(reorder(&steps, 3, index, current).is_err());
        }
    }

    #[test]
    fn out_of_range_index_surfaces_index_error() {
        let steps = flow(&[Pending]);

        assert_eq!(
            remove(&steps, 1, None),
            Err(FlowEditError::Index(FlowIndexError::StepOutOfRange { index: 1, len: 1 }))
        );
    }
}
