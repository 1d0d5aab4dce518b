//! Read-only lookups for approvers and companies.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::approval::{ApprovalParty, Approver, ApproverId};
use crate::domain::company::{Company, CompanyId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory lookup failed: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn approver(&self, id: ApproverId) -> Result<Option<Approver>, DirectoryError>;
    async fn company(&self, id: CompanyId) -> Result<Option<Company>, DirectoryError>;
    /// All approvers, optionally restricted to one team, ordered by id.
    async fn approvers(
        &self,
        role: Option<ApprovalParty>,
    ) -> Result<Vec<Approver>, DirectoryError>;
}

/// Directory backed by fixed in-memory records.
#[derive(Clone, Debug, Default)]
pub struct StaticDirectory {
    approvers: BTreeMap<i64, Approver>,
    companies: BTreeMap<i64, Company>,
}

impl StaticDirectory {
    pub fn new(approvers: Vec<Approver>, companies: Vec<Company>) -> Self {
        Self {
            approvers: approvers.into_iter().map(|a| (a.id.0, a)).collect(),
            companies: companies.into_iter().map(|c| (c.id.0, c)).collect(),
        }
    }

    /// The same approvers and companies the reference-data migration seeds.
    pub fn reference_data() -> Self {
        let approvers = [
            (1, "Avery Chen", "avery.chen@quoteflow.example", ApprovalParty::DealDesk),
            (2, "Jordan Park", "jordan.park@quoteflow.example", ApprovalParty::DealDesk),
            (3, "Morgan Reyes", "morgan.reyes@quoteflow.example", ApprovalParty::Cro),
            (4, "Riley Okafor", "riley.okafor@quoteflow.example", ApprovalParty::Legal),
            (5, "Sam Lindqvist", "sam.lindqvist@quoteflow.example", ApprovalParty::Legal),
            (6, "Taylor Brooks", "taylor.brooks@quoteflow.example", ApprovalParty::Finance),
        ]
        .into_iter()
        .map(|(id, name, email, role)| Approver {
            id: ApproverId(id),
            name: name.to_string(),
            email: email.to_string(),
            role,
        })
        .collect();

        let companies = [
            (1, "Northwind Traders", "Casey Morgan", "casey.morgan@northwind.example"),
            (2, "Globex Corporation", "Dana Whitfield", "dana.whitfield@globex.example"),
            (3, "Initech", "Lee Navarro", "lee.navarro@initech.example"),
        ]
        .into_iter()
        .map(|(id, name, contact_name, contact_email)| Company {
            id: CompanyId(id),
            name: name.to_string(),
            contact_name: contact_name.to_string(),
            contact_email: contact_email.to_string(),
        })
        .collect();

        Self::new(approvers, companies)
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn approver(&self, id: ApproverId) -> Result<Option<Approver>, DirectoryError> {
        Ok(self.approvers.get(&id.0).cloned())
    }

    async fn company(&self, id: CompanyId) -> Result<Option<Company>, DirectoryError> {
        Ok(self.companies.get(&id.0).cloned())
    }

    async fn approvers(
        &self,
        role: Option<ApprovalParty>,
    ) -> Result<Vec<Approver>, DirectoryError> {
        Ok(self
            .approvers
            .values()
            .filter(|approver| role.map_or(true, |role| approver.role == role))
            .cloned()
            .collect())
    }
}
