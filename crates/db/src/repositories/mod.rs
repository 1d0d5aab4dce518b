use async_trait::async_trait;
use thiserror::Error;

use quoteflow_core::domain::quote::{Quote, QuoteId};
use quoteflow_core::flows::{CommittedFlow, FlowEditError, FlowReplacement};

pub mod flow;
pub mod memory;
pub mod quote;
mod rows;

pub use flow::SqlApprovalFlowRepository;
pub use memory::InMemoryApprovalFlowRepository;
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error("quote `{quote_id}` is at version {actual}, expected {expected}")]
    Conflict { quote_id: String, expected: u32, actual: u32 },
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Refused(#[from] FlowEditError),
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    /// Upserts the quote row together with its full approval flow.
    async fn save(&self, quote: Quote) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ApprovalFlowRepository: Send + Sync {
    async fn load_flow(&self, quote_id: &QuoteId)
        -> Result<Option<CommittedFlow>, RepositoryError>;

    /// Swaps the quote's whole flow in one transaction: version bump, delete
    /// all steps, insert the new list, write the current-step pointer. Either
    /// every part lands or none does. The stored flow is read inside the same
    /// transaction and the replacement is refused when it would thaw a frozen
    /// flow or rewrite decided steps.
    async fn replace_flow(
        &self,
        replacement: FlowReplacement,
    ) -> Result<CommittedFlow, RepositoryError>;
}
