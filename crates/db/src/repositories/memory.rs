use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use quoteflow_core::domain::approval::{ApprovalStep, Approver};
use quoteflow_core::domain::quote::{Quote, QuoteId};
use quoteflow_core::flows::{CommittedFlow, FlowReplacement};

use super::{ApprovalFlowRepository, QuoteRepository, RepositoryError};

/// Quote and flow store held in process memory.
///
/// Assignee ids are resolved against the approvers given at construction,
/// mirroring the foreign key the SQL schema enforces.
#[derive(Default)]
pub struct InMemoryApprovalFlowRepository {
    quotes: RwLock<HashMap<String, Quote>>,
    approvers: HashMap<i64, Approver>,
    fail_next_replace: AtomicBool,
}

impl InMemoryApprovalFlowRepository {
    pub fn new(approvers: Vec<Approver>) -> Self {
        Self {
            quotes: RwLock::new(HashMap::new()),
            approvers: approvers.into_iter().map(|approver| (approver.id.0, approver)).collect(),
            fail_next_replace: AtomicBool::new(false),
        }
    }

    /// Makes the next `replace_flow` fail after the old steps are dropped from
    /// its working copy, before anything is published.
    pub fn fail_next_replace(&self) {
        self.fail_next_replace.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryApprovalFlowRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&id.0).cloned())
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        quotes.insert(quote.id.0.clone(), quote);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ApprovalFlowRepository for InMemoryApprovalFlowRepository {
    async fn load_flow(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Option<CommittedFlow>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&quote_id.0).map(|quote| CommittedFlow {
            quote_id: quote.id.clone(),
            version: quote.version,
            step_number: quote.step_number,
            current_step_id: quote.current_step_id.clone(),
            steps: quote.approval_steps.clone(),
        }))
    }

    async fn replace_flow(
        &self,
        replacement: FlowReplacement,
    ) -> Result<CommittedFlow, RepositoryError> {
        let mut quotes = self.quotes.write().await;
        let stored = quotes.get(&replacement.quote_id.0).ok_or_else(|| {
            RepositoryError::NotFound { entity: "quote", id: replacement.quote_id.0.clone() }
        })?;

        if let Some(expected) = replacement.expected_version {
            if expected != stored.version {
                return Err(RepositoryError::Conflict {
                    quote_id: replacement.quote_id.0.clone(),
                    expected,
                    actual: stored.version,
                });
            }
        }

        replacement.check_against(&stored.approval_steps)?;

        let mut working = stored.clone();
        working.approval_steps.clear();
        if self.fail_next_replace.swap(false, Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("injected replace failure".to_string()));
        }

        for record in &replacement.steps {
            let assignee = self.approvers.get(&record.assignee_id.0).cloned().ok_or_else(|| {
                RepositoryError::NotFound {
                    entity: "approver",
                    id: record.assignee_id.0.to_string(),
                }
            })?;
            working.approval_steps.push(ApprovalStep {
                id: record.id.clone(),
                status: record.status,
                assignee,
                created_at: record.created_at,
                updated_at: record.updated_at,
                info_requested: record.info_requested.clone(),
            });
        }

        working.version = working.version.checked_add(1).ok_or_else(|| {
            RepositoryError::Decode(format!("version of quote `{}` overflowed", working.id.0))
        })?;
        working.step_number = replacement.step_number;
        working.current_step_id = replacement.current_step_id.clone();
        working.updated_at = replacement.committed_at;

        let committed = CommittedFlow {
            quote_id: working.id.clone(),
            version: working.version,
            step_number: working.step_number,
            current_step_id: working.current_step_id.clone(),
            steps: working.approval_steps.clone(),
        };
        quotes.insert(working.id.0.clone(), working);
        Ok(committed)
    }
}
