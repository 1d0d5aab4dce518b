//! Pure predicates over an ordered approval flow.
//!
//! `current` is the zero-based position of the step awaiting action, or `None`
//! when the flow has no current step. Indices outside the flow are programming
//! errors and come back as [`FlowIndexError`] instead of a silent `false`.

use thiserror::Error;

use crate::domain::approval::{ApprovalStatus, ApprovalStep};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowIndexError {
    #[error("step index {index} is out of range for a flow of {len} steps")]
    StepOutOfRange { index: usize, len: usize },
    #[error("current position {position} is out of range for a flow of {len} steps")]
    CurrentOutOfRange { position: usize, len: usize },
}

/// A flow with any rejected step is frozen against every further edit.
pub fn is_frozen(steps: &[ApprovalStep]) -> bool {
    steps.iter().any(|step| step.status == ApprovalStatus::Rejected)
}

pub fn is_editable(
    steps: &[ApprovalStep],
    index: usize,
    current: Option<usize>,
) -> Result<bool, FlowIndexError> {
    check_current(steps, current)?;
    let step = steps.get(index).ok_or(FlowIndexError::StepOutOfRange { index, len: steps.len() })?;

    if step.status != ApprovalStatus::Pending {
        return Ok(false);
    }
    if current.is_some_and(|position| index < position) {
        return Ok(false);
    }

    Ok(!is_frozen(&steps[..index]))
}

pub fn can_reorder(
    steps: &[ApprovalStep],
    from: usize,
    to: usize,
    current: Option<usize>,
) -> Result<bool, FlowIndexError> {
    let from_editable = is_editable(steps, from, current)?;
    let to_editable = is_editable(steps, to, current)?;
    Ok(from_editable && to_editable)
}

pub fn can_append(steps: &[ApprovalStep]) -> bool {
    !is_frozen(steps)
}

pub fn can_delete(
    steps: &[ApprovalStep],
    index: usize,
    current: Option<usize>,
) -> Result<bool, FlowIndexError> {
    is_editable(steps, index, current)
}

/// Position of the first entry that is not approved, or the last entry once
/// every entry is approved. `None` for an empty flow.
pub fn current_position_of<T>(
    steps: &[T],
    status: impl Fn(&T) -> ApprovalStatus,
) -> Option<usize> {
    let last = steps.len().checked_sub(1)?;
    Some(steps.iter().position(|step| status(step) != ApprovalStatus::Approved).unwrap_or(last))
}

pub fn current_step_position(steps: &[ApprovalStep]) -> Option<usize> {
    current_position_of(steps, |step| step.status)
}

/// Number of leading decided steps. Decisions land on the current step only,
/// so this prefix is the flow's history.
pub fn decided_prefix_len(steps: &[ApprovalStep]) -> usize {
    steps.iter().take_while(|step| step.status.is_decided()).count()
}

/// 1-based `step_number` stored on the quote; 0 means no flow.
pub fn step_number_for(steps: &[ApprovalStep]) -> u32 {
    current_step_position(steps)
        .and_then(|position| u32::try_from(position + 1).ok())
        .unwrap_or(0)
}

fn check_current(steps: &[ApprovalStep], current: Option<usize>) -> Result<(), FlowIndexError> {
    match current {
        Some(position) if position >= steps.len() => {
            Err(FlowIndexError::CurrentOutOfRange { position, len: steps.len() })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::domain::approval::{
        ApprovalParty, ApprovalStatus, ApprovalStep, ApprovalStepId, Approver, ApproverId,
    };

    use super::*;
    use ApprovalStatus::{Approved, InfoRequested, Pending, Rejected};

    fn flow(statuses: &[ApprovalStatus]) -> Vec<ApprovalStep> {
        let now = Utc::now();
        statuses
            .iter()
            .enumerate()
            .map(|(index, status)| ApprovalStep {
                id: ApprovalStepId(format!("STEP-{index}")),
                status: *status,
                assignee: Approver {
                    id: ApproverId(1),
                    name: "Avery Chen".to_string(),
                    email: "avery.chen@example.com".to_string(),
                    role: ApprovalParty::Cro,
                },
                created_at: now,
                updated_at: now,
                info_requested: None,
            })
            .collect()
    }

    #[test]
    fn frozen_only_when_a_step_is_rejected() {
        assert!(!is_frozen(&flow(&[])));
        assert!(!is_frozen(&flow(&[Approved, InfoRequested, Pending])));
        assert!(is_frozen(&flow(&[Approved, Rejected, Pending])));
        assert!(!can_append(&flow(&[Rejected])));
        assert!(can_append(&flow(&[Approved, Pending])));
    }

    #[test]
    fn decided_steps_are_never_editable() {
        let steps = flow(&[Approved, InfoRequested, Pending]);

        assert_eq!(is_editable(&steps, 0, None), Ok(false));
        assert_eq!(is_editable(&steps, 1, None), Ok(false));
        assert_eq!(is_editable(&steps, 2, None), Ok(true));
    }

    #[test]
    fn steps_before_current_are_history() {
        let steps = flow(&[Pending, Pending, Pending]);

        assert_eq!(is_editable(&steps, 0, Some(1)), Ok(false));
        assert_eq!(is_editable(&steps, 1, Some(1)), Ok(true));
        assert_eq!(is_editable(&steps, 2, Some(1)), Ok(true));
        assert_eq!(can_delete(&steps, 0, Some(1)), Ok(false));
    }

    #[test]
    fn steps_after_a_rejection_are_locked() {
        let steps = flow(&[Approved, Rejected, Pending]);

        assert_eq!(is_editable(&steps, 2, None), Ok(false));
        assert_eq!(can_delete(&steps, 2, Some(1)), Ok(false));
    }

    #[test]
    fn reorder_needs_both_endpoints_editable() {
        let steps = flow(&[Approved, Pending, Pending, Pending]);

        assert_eq!(can_reorder(&steps, 2, 3, Some(1)), Ok(true));
        assert_eq!(can_reorder(&steps, 3, 1, Some(1)), Ok(true));
        assert_eq!(can_reorder(&steps, 3, 0, Some(1)), Ok(false));
        assert_eq!(can_reorder(&steps, 0, 2, Some(1)), Ok(false));
    }

    #[test]
    fn out_of_range_inputs_fail_fast() {
        let steps = flow(&[Pending, Pending]);

        assert_eq!(
            is_editable(&steps, 2, None),
            Err(FlowIndexError::StepOutOfRange { index: 2, len: 2 })
        );
        assert_eq!(
            is_editable(&steps, 0, Some(2)),
            Err(FlowIndexError::CurrentOutOfRange { position: 2, len: 2 })
        );
        assert_eq!(
            can_reorder(&flow(&[Approved, Pending]), 0, 5, None),
            Err(FlowIndexError::StepOutOfRange { index: 5, len: 2 })
        );
        assert!(is_editable(&[], 0, Some(0)).is_err());
    }

    #[test]
    fn current_step_is_first_step_not_approved() {
        assert_eq!(current_step_position(&flow(&[])), None);
        assert_eq!(current_step_position(&flow(&[Pending, Pending])), Some(0));
        assert_eq!(current_step_position(&flow(&[Approved, InfoRequested, Pending])), Some(1));
        assert_eq!(current_step_position(&flow(&[Approved, Rejected, Pending])), Some(1));
        assert_eq!(current_step_position(&flow(&[Approved, Approved])), Some(1));

        assert_eq!(step_number_for(&flow(&[])), 0);
        assert_eq!(step_number_for(&flow(&[Approved, Pending, Pending])), 2);
    }

    #[test]
    fn pointer_rule_applies_to_bare_statuses() {
        let statuses = [Approved, Approved, Pending];

        assert_eq!(current_position_of(&statuses, |status| *status), Some(2));
        assert_eq!(current_position_of(&[Approved], |status: &ApprovalStatus| *status), Some(0));
    }

    #[test]
    fn decided_prefix_is_the_history() {
        assert_eq!(decided_prefix_len(&flow(&[])), 0);
        assert_eq!(decided_prefix_len(&flow(&[Pending, Approved])), 0);
        assert_eq!(decided_prefix_len(&flow(&[Approved, InfoRequested, Pending])), 2);
        assert_eq!(decided_prefix_len(&flow(&[Approved, Approved])), 2);
    }
}
