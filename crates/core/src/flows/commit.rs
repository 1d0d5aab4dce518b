//! Payloads exchanged when an edited flow is handed to durable storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::approval::{ApprovalStatus, ApprovalStep, ApprovalStepId, ApproverId};
use crate::domain::quote::QuoteId;
use crate::flows::editor::FlowEditError;
use crate::flows::invariants;

/// One step of a submitted flow, referring to its assignee by id only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSubmission {
    pub status: ApprovalStatus,
    pub assignee_id: ApproverId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_requested: Option<String>,
}

impl From<&ApprovalStep> for StepSubmission {
    fn from(step: &ApprovalStep) -> Self {
        Self {
            status: step.status,
            assignee_id: step.assignee.id,
            created_at: step.created_at,
            updated_at: step.updated_at,
            info_requested: step.info_requested.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCommitRequest {
    pub quote_id: QuoteId,
    /// Version the editor started from. `None` means last writer wins.
    #[serde(default)]
    pub expected_version: Option<u32>,
    pub steps: Vec<StepSubmission>,
}

/// A step as it will be written: durable id, resolved position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepRecord {
    pub id: ApprovalStepId,
    pub status: ApprovalStatus,
    pub assignee_id: ApproverId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub info_requested: Option<String>,
}

impl StepRecord {
    pub fn from_submission(submission: StepSubmission) -> Self {
        Self {
            id: ApprovalStepId::durable(),
            status: submission.status,
            assignee_id: submission.assignee_id,
            created_at: submission.created_at,
            updated_at: submission.updated_at,
            info_requested: submission.info_requested,
        }
    }
}

/// Everything a repository needs to swap a quote's flow in one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowReplacement {
    pub quote_id: QuoteId,
    pub expected_version: Option<u32>,
    pub steps: Vec<StepRecord>,
    pub step_number: u32,
    pub current_step_id: Option<ApprovalStepId>,
    pub committed_at: DateTime<Utc>,
}

impl FlowReplacement {
    pub fn new(request: FlowCommitRequest, committed_at: DateTime<Utc>) -> Self {
        let steps: Vec<StepRecord> =
            request.steps.into_iter().map(StepRecord::from_submission).collect();
        let position = invariants::current_position_of(&steps, |step| step.status);

        Self {
            quote_id: request.quote_id,
            expected_version: request.expected_version,
            step_number: position
                .and_then(|position| u32::try_from(position + 1).ok())
                .unwrap_or(0),
            current_step_id: position
                .and_then(|position| steps.get(position))
                .map(|step| step.id.clone()),
            steps,
            committed_at,
        }
    }

    /// Checks the new list against the flow it replaces. A frozen flow takes no
    /// replacement. Decided steps must come back first, in order, with the same
    /// status and assignee, and every later step must still be pending.
    pub fn check_against(&self, stored: &[ApprovalStep]) -> Result<(), FlowEditError> {
        if invariants::is_frozen(stored)
            || self.steps.iter().any(|step| step.status == ApprovalStatus::Rejected)
        {
            return Err(FlowEditError::Frozen);
        }

        let history = invariants::decided_prefix_len(stored);
        for (index, kept) in stored[..history].iter().enumerate() {
            match self.steps.get(index) {
                Some(step)
                    if step.status == kept.status && step.assignee_id == kept.assignee.id => {}
                _ => return Err(FlowEditError::HistoryChanged { index }),
            }
        }

        match self.steps[history..]
            .iter()
            .position(|step| ApprovalStatus::Pending.can_transition_to(step.status))
        {
            Some(offset) => Err(FlowEditError::DecisionSubmitted { index: history + offset }),
            None => Ok(()),
        }
    }
}

/// The authoritative flow after a successful commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedFlow {
    pub quote_id: QuoteId,
    pub version: u32,
    pub step_number: u32,
    pub current_step_id: Option<ApprovalStepId>,
    pub steps: Vec<ApprovalStep>,
}

impl CommittedFlow {
    pub fn current_step(&self) -> Option<&ApprovalStep> {
        let id = self.current_step_id.as_ref()?;
        self.steps.iter().find(|step| &step.id == id)
    }

    pub fn is_frozen(&self) -> bool {
        invariants::is_frozen(&self.steps)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowCommitError {
    #[error(transparent)]
    Validation(#[from] FlowEditError),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("quote `{quote_id}` changed since version {expected}; current version is {actual}")]
    Conflict { quote_id: String, expected: u32, actual: u32 },
    #[error("approval flow transaction failed: {0}")]
    Transaction(String),
}
