use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalStep, ApprovalStepId};
use crate::domain::company::CompanyId;
use crate::errors::DomainError;
use crate::flows::invariants;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    Basic,
    Pro,
    Enterprise,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteType {
    New,
    Renewal,
    Expansion,
}

impl Plan {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(Self::Basic),
            "pro" => Some(Self::Pro),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

impl QuoteType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Renewal => "renewal",
            Self::Expansion => "expansion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "new" => Some(Self::New),
            "renewal" => Some(Self::Renewal),
            "expansion" => Some(Self::Expansion),
            _ => None,
        }
    }
}

/// Commercial terms captured when a quote is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuoteTerms {
    pub name: String,
    pub company_id: CompanyId,
    pub filename: String,
    pub tcv: Decimal,
    pub plan: Plan,
    pub term_months: u32,
    pub quote_type: QuoteType,
    pub seats: u32,
    pub discount_percentage: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub name: String,
    pub company_id: CompanyId,
    pub filename: String,
    pub tcv: Decimal,
    pub plan: Plan,
    pub term_months: u32,
    pub quote_type: QuoteType,
    pub seats: u32,
    pub discount_percentage: Decimal,
    pub approval_steps: Vec<ApprovalStep>,
    /// 1-based position of the step awaiting action; 0 when no flow exists.
    pub step_number: u32,
    pub current_step_id: Option<ApprovalStepId>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(id: QuoteId, terms: QuoteTerms, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: terms.name,
            company_id: terms.company_id,
            filename: terms.filename,
            tcv: terms.tcv,
            plan: terms.plan,
            term_months: terms.term_months,
            quote_type: terms.quote_type,
            seats: terms.seats,
            discount_percentage: terms.discount_percentage,
            approval_steps: Vec::new(),
            step_number: 0,
            current_step_id: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn current_step(&self) -> Option<&ApprovalStep> {
        let index = usize::try_from(self.step_number).ok()?.checked_sub(1)?;
        self.approval_steps.get(index)
    }

    pub fn is_frozen(&self) -> bool {
        invariants::is_frozen(&self.approval_steps)
    }

    /// Replace the flow with a committed one, recomputing the current-step pointer.
    pub fn replace_flow(&mut self, steps: Vec<ApprovalStep>, version: u32, now: DateTime<Utc>) {
        self.step_number = invariants::step_number_for(&steps);
        self.current_step_id = invariants::current_step_position(&steps)
            .and_then(|position| steps.get(position))
            .map(|step| step.id.clone());
        self.approval_steps = steps;
        self.version = version;
        self.updated_at = now;
    }

    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let len = self.approval_steps.len();
        if usize::try_from(self.step_number).map_or(true, |number| number > len) {
            return Err(DomainError::InvariantViolation(format!(
                "quote `{}` has step_number {} but only {len} approval steps",
                self.id.0, self.step_number
            )));
        }

        let pointed = self.current_step().map(|step| &step.id);
        if pointed != self.current_step_id.as_ref() {
            return Err(DomainError::InvariantViolation(format!(
                "quote `{}` current_step_id does not match step_number {}",
                self.id.0, self.step_number
            )));
        }

        Ok(())
    }
}
