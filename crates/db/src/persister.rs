use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use quoteflow_core::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink};
use quoteflow_core::directory::Directory;
use quoteflow_core::flows::{CommittedFlow, FlowCommitError, FlowCommitRequest, FlowReplacement};

use crate::repositories::{ApprovalFlowRepository, RepositoryError};

const ACTOR: &str = "flow-persister";

/// Commits an edited approval flow as one atomic replacement.
///
/// Lookups happen before anything is written: the quote must exist, the new
/// list must keep the stored flow's decided steps and decide nothing itself,
/// and every assignee must resolve through the directory. The repository
/// repeats the flow check inside its transaction.
#[derive(Clone)]
pub struct FlowPersister {
    repository: Arc<dyn ApprovalFlowRepository>,
    directory: Arc<dyn Directory>,
    audit: Arc<dyn AuditSink>,
}

impl FlowPersister {
    pub fn new(
        repository: Arc<dyn ApprovalFlowRepository>,
        directory: Arc<dyn Directory>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { repository, directory, audit }
    }

    pub async fn commit(
        &self,
        request: FlowCommitRequest,
        correlation_id: &str,
    ) -> Result<CommittedFlow, FlowCommitError> {
        let quote_id = request.quote_id.clone();
        let submitted = request.steps.len();

        match self.try_commit(request).await {
            Ok(committed) => {
                info!(
                    event_name = "approval_flow.committed",
                    correlation_id = %correlation_id,
                    quote_id = %quote_id.0,
                    version = committed.version,
                    step_number = committed.step_number,
                    steps = committed.steps.len(),
                    "approval flow replaced"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(quote_id),
                        correlation_id,
                        "approval_flow.committed",
                        AuditCategory::Flow,
                        ACTOR,
                        AuditOutcome::Success,
                    )
                    .with_metadata("version", committed.version.to_string())
                    .with_metadata("steps", committed.steps.len().to_string()),
                );
                Ok(committed)
            }
            Err(error) => {
                let (outcome, category) = match error {
                    FlowCommitError::Transaction(_) => {
                        (AuditOutcome::Failed, AuditCategory::Persistence)
                    }
                    _ => (AuditOutcome::Rejected, AuditCategory::Flow),
                };
                warn!(
                    event_name = "approval_flow.commit_failed",
                    correlation_id = %correlation_id,
                    quote_id = %quote_id.0,
                    submitted_steps = submitted,
                    error = %error,
                    "approval flow commit did not apply"
                );
                self.audit.emit(
                    AuditEvent::new(
                        Some(quote_id),
                        correlation_id,
                        "approval_flow.commit_failed",
                        category,
                        ACTOR,
                        outcome,
                    )
                    .with_metadata("reason", error.to_string()),
                );
                Err(error)
            }
        }
    }

    pub async fn load(
        &self,
        quote_id: &quoteflow_core::QuoteId,
    ) -> Result<CommittedFlow, FlowCommitError> {
        self.repository
            .load_flow(quote_id)
            .await
            .map_err(commit_error)?
            .ok_or_else(|| FlowCommitError::NotFound { entity: "quote", id: quote_id.0.clone() })
    }

    async fn try_commit(
        &self,
        request: FlowCommitRequest,
    ) -> Result<CommittedFlow, FlowCommitError> {
        let persisted = self.load(&request.quote_id).await?;
        let replacement = FlowReplacement::new(request, Utc::now());
        replacement.check_against(&persisted.steps)?;

        for step in &replacement.steps {
            let known = self
                .directory
                .approver(step.assignee_id)
                .await
                .map_err(|error| FlowCommitError::Transaction(error.to_string()))?;
            if known.is_none() {
                return Err(FlowCommitError::NotFound {
                    entity: "approver",
                    id: step.assignee_id.0.to_string(),
                });
            }
        }

        self.repository.replace_flow(replacement).await.map_err(commit_error)
    }
}

fn commit_error(error: RepositoryError) -> FlowCommitError {
    match error {
        RepositoryError::NotFound { entity, id } => FlowCommitError::NotFound { entity, id },
        RepositoryError::Conflict { quote_id, expected, actual } => {
            FlowCommitError::Conflict { quote_id, expected, actual }
        }
        RepositoryError::Refused(error) => FlowCommitError::Validation(error),
        other => FlowCommitError::Transaction(other.to_string()),
    }
}
