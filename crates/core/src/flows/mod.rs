pub mod aggregate;
pub mod commit;
pub mod editor;
pub mod invariants;

pub use aggregate::QuoteApproval;
pub use commit::{
    CommittedFlow, FlowCommitError, FlowCommitRequest, FlowReplacement, StepRecord,
    StepSubmission,
};
pub use editor::FlowEditError;
pub use invariants::FlowIndexError;
