pub mod audit;
pub mod config;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod flows;

pub use directory::{Directory, DirectoryError, StaticDirectory};
pub use domain::approval::{
    ApprovalParty, ApprovalStatus, ApprovalStep, ApprovalStepId, Approver, ApproverId,
};
pub use domain::company::{Company, CompanyId};
pub use domain::quote::{Plan, Quote, QuoteId, QuoteTerms, QuoteType};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{
    CommittedFlow, FlowCommitError, FlowCommitRequest, FlowEditError, FlowIndexError,
    FlowReplacement, QuoteApproval, StepRecord, StepSubmission,
};
