use std::sync::Arc;

use quoteflow_core::audit::{AuditOutcome, InMemoryAuditSink};
use quoteflow_core::directory::Directory;
use quoteflow_core::domain::approval::{ApprovalParty, ApprovalStatus, ApproverId};
use quoteflow_core::domain::quote::QuoteId;
use quoteflow_core::flows::{FlowCommitError, FlowEditError, QuoteApproval};
use quoteflow_db::repositories::{QuoteRepository, SqlApprovalFlowRepository, SqlQuoteRepository};
use quoteflow_db::{
    connect_with_settings, migrations, DbPool, DemoSeedDataset, FlowPersister, SqlDirectory,
};

struct Fixture {
    pool: DbPool,
    quotes: SqlQuoteRepository,
    directory: Arc<SqlDirectory>,
    persister: FlowPersister,
    audit: InMemoryAuditSink,
}

async fn fixture() -> Fixture {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    DemoSeedDataset::load(&pool).await.expect("seed demo quotes");

    let directory = Arc::new(SqlDirectory::new(pool.clone()));
    let audit = InMemoryAuditSink::default();
    let persister = FlowPersister::new(
        Arc::new(SqlApprovalFlowRepository::new(pool.clone())),
        directory.clone(),
        Arc::new(audit.clone()),
    );
    Fixture { quotes: SqlQuoteRepository::new(pool.clone()), pool, directory, persister, audit }
}

async fn open_quote(fixture: &Fixture) -> QuoteApproval {
    let quote = fixture
        .quotes
        .find_by_id(&QuoteId("Q-DEMO-OPEN".to_string()))
        .await
        .expect("query")
        .expect("demo quote");
    QuoteApproval::new(quote)
}

#[tokio::test]
async fn edit_commit_and_reload_round_trip() {
    let fixture = fixture().await;
    let mut approval = open_quote(&fixture).await;
    let finance = fixture
        .directory
        .approvers(Some(ApprovalParty::Finance))
        .await
        .expect("finance approvers")
        .remove(0);

    approval.append(finance).expect("append to open flow");
    approval.reorder(1, 2).expect("swap the two pending steps");
    let request = approval.commit_request().expect("dirty flow");
    let committed = fixture.persister.commit(request, "it-1").await.expect("commit");
    approval.apply_commit(committed).expect("apply server result");

    let reloaded = open_quote(&fixture).await;
    let assignees: Vec<_> = reloaded.steps().iter().map(|step| step.assignee.id).collect();
    assert_eq!(assignees, [ApproverId(1), ApproverId(4), ApproverId(3), ApproverId(6)]);
    assert_eq!(reloaded.quote().version, 1);
    assert_eq!(reloaded.quote().step_number, 2);
    assert_eq!(reloaded.current_step().map(|step| step.assignee.id), Some(ApproverId(4)));
    assert!(reloaded.steps().iter().all(|step| !step.id.is_placeholder()));
    assert_eq!(approval.steps(), reloaded.steps());
    assert!(!approval.has_changes());
}

#[tokio::test]
async fn second_editor_with_stale_version_keeps_local_edits() {
    let fixture = fixture().await;
    let mut first = open_quote(&fixture).await;
    let mut second = open_quote(&fixture).await;

    first.remove(2).expect("drop the legal step");
    let committed = fixture
        .persister
        .commit(first.commit_request().expect("dirty"), "it-2")
        .await
        .expect("first editor commits");
    first.apply_commit(committed).expect("apply");

    second.reorder(1, 2).expect("swap pending steps");
    let before = second.steps().to_vec();
    let error = fixture
        .persister
        .commit(second.commit_request().expect("dirty"), "it-3")
        .await
        .expect_err("second editor is stale");

    assert!(matches!(error, FlowCommitError::Conflict { expected: 0, actual: 1, .. }));
    assert!(second.has_changes());
    assert_eq!(second.steps(), before.as_slice());
    let outcomes: Vec<_> = fixture.audit.events().into_iter().map(|event| event.outcome).collect();
    assert_eq!(outcomes, [AuditOutcome::Success, AuditOutcome::Rejected]);
}

#[tokio::test]
async fn frozen_quote_refuses_local_edits_and_commits() {
    let fixture = fixture().await;
    let quote = fixture
        .quotes
        .find_by_id(&QuoteId("Q-DEMO-REJECTED".to_string()))
        .await
        .expect("query")
        .expect("demo quote");
    let mut approval = QuoteApproval::new(quote.clone());

    assert!(approval.is_frozen());
    assert_eq!(approval.remove(2), Err(FlowEditError::Frozen));
    assert_eq!(approval.commit_request(), Err(FlowEditError::Frozen));

    let forced = quoteflow_core::flows::FlowCommitRequest {
        quote_id: quote.id.clone(),
        expected_version: None,
        steps: quote
            .approval_steps
            .iter()
            .filter(|step| step.status != ApprovalStatus::Rejected)
            .map(Into::into)
            .collect(),
    };
    let error = fixture.persister.commit(forced, "it-4").await.expect_err("frozen in storage");
    assert_eq!(error, FlowCommitError::Validation(FlowEditError::Frozen));

    let steps: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM approval_step WHERE quote_id = 'Q-DEMO-REJECTED'")
            .fetch_one(&fixture.pool)
            .await
            .expect("count steps");
    assert_eq!(steps, 3);
}
