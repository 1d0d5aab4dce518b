use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use quoteflow_core::directory::{Directory, DirectoryError};
use quoteflow_core::domain::approval::{ApprovalParty, Approver, ApproverId};
use quoteflow_core::domain::company::{Company, CompanyId};

use crate::DbPool;

/// Directory over the seeded `approver` and `company` tables.
pub struct SqlDirectory {
    pool: DbPool,
}

impl SqlDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for SqlDirectory {
    async fn approver(&self, id: ApproverId) -> Result<Option<Approver>, DirectoryError> {
        let row = sqlx::query("SELECT id, name, email, role FROM approver WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.map(approver_from_row).transpose()
    }

    async fn company(&self, id: CompanyId) -> Result<Option<Company>, DirectoryError> {
        let row =
            sqlx::query("SELECT id, name, contact_name, contact_email FROM company WHERE id = ?")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(unavailable)?;

        row.map(company_from_row).transpose()
    }

    async fn approvers(
        &self,
        role: Option<ApprovalParty>,
    ) -> Result<Vec<Approver>, DirectoryError> {
        let rows = match role {
            Some(role) => {
                sqlx::query("SELECT id, name, email, role FROM approver WHERE role = ? ORDER BY id")
                    .bind(role.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT id, name, email, role FROM approver ORDER BY id")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(unavailable)?;

        rows.into_iter().map(approver_from_row).collect()
    }
}

fn approver_from_row(row: SqliteRow) -> Result<Approver, DirectoryError> {
    let role_raw: String = row.try_get("role").map_err(unavailable)?;
    let role = role_raw.parse::<ApprovalParty>().map_err(DirectoryError::Unavailable)?;

    Ok(Approver {
        id: ApproverId(row.try_get("id").map_err(unavailable)?),
        name: row.try_get("name").map_err(unavailable)?,
        email: row.try_get("email").map_err(unavailable)?,
        role,
    })
}

fn company_from_row(row: SqliteRow) -> Result<Company, DirectoryError> {
    Ok(Company {
        id: CompanyId(row.try_get("id").map_err(unavailable)?),
        name: row.try_get("name").map_err(unavailable)?,
        contact_name: row.try_get("contact_name").map_err(unavailable)?,
        contact_email: row.try_get("contact_email").map_err(unavailable)?,
    })
}

fn unavailable(error: sqlx::Error) -> DirectoryError {
    DirectoryError::Unavailable(error.to_string())
}
