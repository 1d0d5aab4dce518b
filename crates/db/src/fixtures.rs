use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use quoteflow_core::directory::Directory;
use quoteflow_core::domain::approval::{ApprovalStatus, ApprovalStep, ApprovalStepId, ApproverId};
use quoteflow_core::domain::company::CompanyId;
use quoteflow_core::domain::quote::{Plan, Quote, QuoteId, QuoteTerms, QuoteType};

use crate::connection::DbPool;
use crate::directory::SqlDirectory;
use crate::repositories::{QuoteRepository, RepositoryError, SqlQuoteRepository};

/// Demo quotes covering the three flow shapes an operator meets:
/// 1. Open flow with one approval recorded
/// 2. Fully approved flow
/// 3. Frozen flow after a rejection
const DEMO_QUOTES: &[DemoQuote] = &[
    DemoQuote {
        quote_id: "Q-DEMO-OPEN",
        name: "Northwind Traders expansion",
        company_id: 1,
        plan: Plan::Pro,
        quote_type: QuoteType::Expansion,
        tcv_cents: 8_400_000,
        seats: 60,
        term_months: 12,
        discount_tenths: 75,
        steps: &[
            (ApprovalStatus::Approved, 1),
            (ApprovalStatus::Pending, 3),
            (ApprovalStatus::Pending, 4),
        ],
        expected_step_number: 2,
        description: "Deal desk signed off, CRO and legal still pending",
    },
    DemoQuote {
        quote_id: "Q-DEMO-APPROVED",
        name: "Globex Corporation renewal",
        company_id: 2,
        plan: Plan::Enterprise,
        quote_type: QuoteType::Renewal,
        tcv_cents: 21_600_000,
        seats: 180,
        term_months: 24,
        discount_tenths: 150,
        steps: &[(ApprovalStatus::Approved, 2), (ApprovalStatus::Approved, 6)],
        expected_step_number: 2,
        description: "Every approver signed off",
    },
    DemoQuote {
        quote_id: "Q-DEMO-REJECTED",
        name: "Initech new platform",
        company_id: 3,
        plan: Plan::Basic,
        quote_type: QuoteType::New,
        tcv_cents: 1_800_000,
        seats: 25,
        term_months: 12,
        discount_tenths: 300,
        steps: &[
            (ApprovalStatus::Approved, 1),
            (ApprovalStatus::Rejected, 5),
            (ApprovalStatus::Pending, 6),
        ],
        expected_step_number: 2,
        description: "Legal rejected the terms, flow is frozen",
    },
];

pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// Writes the demo quotes with their flows. Reloading resets them to the
    /// seeded state.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let directory = SqlDirectory::new(pool.clone());
        let repository = SqlQuoteRepository::new(pool.clone());
        let seeded_at = Utc::now();
        let mut quotes = Vec::with_capacity(DEMO_QUOTES.len());

        for demo in DEMO_QUOTES {
            let quote = demo.build(&directory, seeded_at).await?;
            quote.check_invariants().map_err(|error| RepositoryError::Decode(error.to_string()))?;
            let frozen = quote.is_frozen();
            repository.save(quote).await?;

            quotes.push(SeededQuote {
                quote_id: demo.quote_id,
                steps: demo.steps.len(),
                frozen,
                description: demo.description,
            });
        }

        Ok(SeedResult { quotes })
    }

    /// Checks every demo quote is present with its flow and pointer intact.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let repository = SqlQuoteRepository::new(pool.clone());
        let mut checks = Vec::new();

        for demo in DEMO_QUOTES {
            let Some(quote) = repository.find_by_id(&QuoteId(demo.quote_id.to_string())).await?
            else {
                checks.push((demo.quote_id, false));
                continue;
            };

            let statuses: Vec<_> = quote.approval_steps.iter().map(|step| step.status).collect();
            let assignees: Vec<_> =
                quote.approval_steps.iter().map(|step| step.assignee.id.0).collect();
            let flow_matches = statuses
                == demo.steps.iter().map(|(status, _)| *status).collect::<Vec<_>>()
                && assignees == demo.steps.iter().map(|(_, id)| *id).collect::<Vec<_>>();

            checks.push((demo.quote_id, flow_matches));
            checks.push((
                demo.pointer_label(),
                quote.step_number == demo.expected_step_number && quote.check_invariants().is_ok(),
            ));
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo quotes; their steps go with them.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for demo in DEMO_QUOTES {
            sqlx::query("DELETE FROM quote WHERE id = ?")
                .bind(demo.quote_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

struct DemoQuote {
    quote_id: &'static str,
    name: &'static str,
    company_id: i64,
    plan: Plan,
    quote_type: QuoteType,
    tcv_cents: i64,
    seats: u32,
    term_months: u32,
    discount_tenths: i64,
    steps: &'static [(ApprovalStatus, i64)],
    expected_step_number: u32,
    description: &'static str,
}

impl DemoQuote {
    async fn build(
        &self,
        directory: &SqlDirectory,
        seeded_at: DateTime<Utc>,
    ) -> Result<Quote, RepositoryError> {
        let created_at = seeded_at - Duration::days(14);
        let mut quote = Quote::new(
            QuoteId(self.quote_id.to_string()),
            QuoteTerms {
                name: self.name.to_string(),
                company_id: CompanyId(self.company_id),
                filename: format!("{}.md", self.quote_id.to_lowercase()),
                tcv: Decimal::new(self.tcv_cents, 2),
                plan: self.plan,
                term_months: self.term_months,
                quote_type: self.quote_type,
                seats: self.seats,
                discount_percentage: Decimal::new(self.discount_tenths, 1),
            },
            created_at,
        );

        let mut steps = Vec::with_capacity(self.steps.len());
        for (position, (status, assignee_id)) in self.steps.iter().enumerate() {
            let assignee = directory
                .approver(ApproverId(*assignee_id))
                .await
                .map_err(|error| RepositoryError::Unavailable(error.to_string()))?
                .ok_or_else(|| RepositoryError::NotFound {
                    entity: "approver",
                    id: assignee_id.to_string(),
                })?;
            let decided_at = created_at + Duration::days(2 * (position as i64 + 1));
            steps.push(ApprovalStep {
                id: ApprovalStepId(format!("STEP-{}-{}", self.quote_id, position + 1)),
                status: *status,
                assignee,
                created_at,
                updated_at: if status.is_decided() { decided_at } else { created_at },
                info_requested: None,
            });
        }

        quote.replace_flow(steps, 0, created_at);
        Ok(quote)
    }

    fn pointer_label(&self) -> &'static str {
        match self.quote_id {
            "Q-DEMO-OPEN" => "open flow pointer",
            "Q-DEMO-APPROVED" => "approved flow pointer",
            _ => "frozen flow pointer",
        }
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub quotes: Vec<SeededQuote>,
}

#[derive(Debug)]
pub struct SeededQuote {
    pub quote_id: &'static str,
    pub steps: usize,
    pub frozen: bool,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
