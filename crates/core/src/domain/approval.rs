use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const PLACEHOLDER_PREFIX: &str = "draft-";
const DURABLE_PREFIX: &str = "STEP-";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalStepId(pub String);

impl ApprovalStepId {
    /// Client-local identity for a step that has not been committed yet.
    pub fn placeholder() -> Self {
        Self(format!("{PLACEHOLDER_PREFIX}{}", Uuid::new_v4().simple()))
    }

    /// Identity assigned when a step is written to durable storage.
    pub fn durable() -> Self {
        Self(format!("{DURABLE_PREFIX}{}", Uuid::new_v4().simple()))
    }

    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApproverId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    InfoRequested,
}

impl ApprovalStatus {
    /// Approved, rejected and info-requested steps are terminal for that step instance.
    pub fn is_decided(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn can_transition_to(self, next: ApprovalStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::InfoRequested)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::InfoRequested => "info_requested",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "info_requested" => Some(Self::InfoRequested),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::InfoRequested => "Info Requested",
        }
    }
}

/// Team an approver signs off for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalParty {
    DealDesk,
    Cro,
    Legal,
    Finance,
}

impl ApprovalParty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DealDesk => "deal_desk",
            Self::Cro => "cro",
            Self::Legal => "legal",
            Self::Finance => "finance",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::DealDesk => "Deal Desk",
            Self::Cro => "CRO",
            Self::Legal => "Legal",
            Self::Finance => "Finance",
        }
    }
}

impl std::str::FromStr for ApprovalParty {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "deal_desk" => Ok(Self::DealDesk),
            "cro" => Ok(Self::Cro),
            "legal" => Ok(Self::Legal),
            "finance" => Ok(Self::Finance),
            other => Err(format!(
                "unknown approval party `{other}` (expected deal_desk|cro|legal|finance)"
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    pub id: ApproverId,
    pub name: String,
    pub email: String,
    pub role: ApprovalParty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStep {
    pub id: ApprovalStepId,
    pub status: ApprovalStatus,
    pub assignee: Approver,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub info_requested: Option<String>,
}

impl ApprovalStep {
    /// A new pending step as created by the flow editor.
    pub fn pending(assignee: Approver, now: DateTime<Utc>) -> Self {
        Self {
            id: ApprovalStepId::placeholder(),
            status: ApprovalStatus::Pending,
            assignee,
            created_at: now,
            updated_at: now,
            info_requested: None,
        }
    }
}
