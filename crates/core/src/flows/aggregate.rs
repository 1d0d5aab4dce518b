use chrono::Utc;

use crate::domain::approval::{ApprovalStep, Approver};
use crate::domain::quote::Quote;
use crate::errors::DomainError;
use crate::flows::commit::{CommittedFlow, FlowCommitRequest, StepSubmission};
use crate::flows::editor::{self, FlowEditError};
use crate::flows::invariants;

/// A quote together with an uncommitted candidate flow.
///
/// Edits go to the candidate list only. The quote keeps the last committed
/// flow until [`QuoteApproval::apply_commit`] installs the server's answer.
#[derive(Clone, Debug)]
pub struct QuoteApproval {
    quote: Quote,
    steps: Vec<ApprovalStep>,
    dirty: bool,
}

impl QuoteApproval {
    pub fn new(quote: Quote) -> Self {
        let steps = quote.approval_steps.clone();
        Self { quote, steps, dirty: false }
    }

    pub fn quote(&self) -> &Quote {
        &self.quote
    }

    pub fn steps(&self) -> &[ApprovalStep] {
        &self.steps
    }

    pub fn has_changes(&self) -> bool {
        self.dirty
    }

    pub fn is_frozen(&self) -> bool {
        invariants::is_frozen(&self.steps)
    }

    pub fn current_position(&self) -> Option<usize> {
        invariants::current_step_position(&self.steps)
    }

    /// The persisted step awaiting action, resolved by its committed id.
    pub fn current_step(&self) -> Option<&ApprovalStep> {
        let id = self.quote.current_step_id.as_ref()?;
        self.quote.approval_steps.iter().find(|step| &step.id == id)
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> Result<(), FlowEditError> {
        let next = editor::reorder(&self.steps, from, to, self.current_position())?;
        self.install(next);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Result<(), FlowEditError> {
        let next = editor::remove(&self.steps, index, self.current_position())?;
        self.install(next);
        Ok(())
    }

    pub fn append(&mut self, approver: Approver) -> Result<(), FlowEditError> {
        let next = editor::append(approver, &self.steps)?;
        self.install(next);
        Ok(())
    }

    pub fn discard_changes(&mut self) {
        self.steps = self.quote.approval_steps.clone();
        self.dirty = false;
    }

    /// Builds the submission for the candidate flow against the loaded version.
    pub fn commit_request(&self) -> Result<FlowCommitRequest, FlowEditError> {
        if self.is_frozen() {
            return Err(FlowEditError::Frozen);
        }
        if !self.dirty {
            return Err(FlowEditError::NoChanges);
        }

        Ok(FlowCommitRequest {
            quote_id: self.quote.id.clone(),
            expected_version: Some(self.quote.version),
            steps: self.steps.iter().map(StepSubmission::from).collect(),
        })
    }

    /// Installs the authoritative flow returned by a successful commit.
    pub fn apply_commit(&mut self, committed: CommittedFlow) -> Result<(), DomainError> {
        if committed.quote_id != self.quote.id {
            return Err(DomainError::QuoteMismatch {
                expected: self.quote.id.0.clone(),
                actual: committed.quote_id.0,
            });
        }

        let mut quote = self.quote.clone();
        quote.replace_flow(committed.steps, committed.version, Utc::now());
        quote.check_invariants()?;
        let pointer_matches = quote.step_number == committed.step_number
            && quote.current_step_id == committed.current_step_id;
        if !pointer_matches {
            return Err(DomainError::InvariantViolation(format!(
                "committed pointer for quote `{}` disagrees with its steps",
                quote.id.0
            )));
        }

        self.steps = quote.approval_steps.clone();
        self.quote = quote;
        self.dirty = false;
        Ok(())
    }

    fn install(&mut self, next: Vec<ApprovalStep>) {
        if next != self.steps {
            self.steps = next;
            self.dirty = true;
        }
    }
}
