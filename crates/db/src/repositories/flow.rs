use sqlx::Row;

use quoteflow_core::domain::approval::ApprovalStepId;
use quoteflow_core::domain::quote::QuoteId;
use quoteflow_core::flows::{CommittedFlow, FlowReplacement};

use super::rows::{fetch_steps, insert_step, parse_u32};
use super::{ApprovalFlowRepository, RepositoryError};
use crate::DbPool;

pub struct SqlApprovalFlowRepository {
    pool: DbPool,
}

impl SqlApprovalFlowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ApprovalFlowRepository for SqlApprovalFlowRepository {
    async fn load_flow(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Option<CommittedFlow>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let row =
            sqlx::query("SELECT version, step_number, current_step_id FROM quote WHERE id = ?")
                .bind(&quote_id.0)
                .fetch_optional(&mut *conn)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CommittedFlow {
            quote_id: quote_id.clone(),
            version: parse_u32("version", row.try_get("version")?)?,
            step_number: parse_u32("step_number", row.try_get("step_number")?)?,
            current_step_id: row
                .try_get::<Option<String>, _>("current_step_id")?
                .map(ApprovalStepId),
            steps: fetch_steps(&mut conn, quote_id).await?,
        }))
    }

    async fn replace_flow(
        &self,
        replacement: FlowReplacement,
    ) -> Result<CommittedFlow, RepositoryError> {
        let quote_id = &replacement.quote_id;
        let mut tx = self.pool.begin().await?;

        let stored: Option<i64> = sqlx::query_scalar("SELECT version FROM quote WHERE id = ?")
            .bind(&quote_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        let actual = match stored {
            Some(version) => parse_u32("version", version)?,
            None => {
                return Err(RepositoryError::NotFound { entity: "quote", id: quote_id.0.clone() })
            }
        };
        if let Some(expected) = replacement.expected_version {
            if expected != actual {
                return Err(RepositoryError::Conflict {
                    quote_id: quote_id.0.clone(),
                    expected,
                    actual,
                });
            }
        }
        let stored_steps = fetch_steps(&mut tx, quote_id).await?;
        replacement.check_against(&stored_steps)?;
        let next_version = actual.checked_add(1).ok_or_else(|| {
            RepositoryError::Decode(format!("version of quote `{}` overflowed", quote_id.0))
        })?;

        let updated = sqlx::query(
            "UPDATE quote
             SET version = ?, step_number = ?, current_step_id = ?, updated_at = ?
             WHERE id = ? AND version = ?",
        )
        .bind(i64::from(next_version))
        .bind(i64::from(replacement.step_number))
        .bind(replacement.current_step_id.as_ref().map(|id| id.0.as_str()))
        .bind(replacement.committed_at.to_rfc3339())
        .bind(&quote_id.0)
        .bind(i64::from(actual))
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() != 1 {
            return Err(RepositoryError::Conflict {
                quote_id: quote_id.0.clone(),
                expected: replacement.expected_version.unwrap_or(actual),
                actual: next_version,
            });
        }

        sqlx::query("DELETE FROM approval_step WHERE quote_id = ?")
            .bind(&quote_id.0)
            .execute(&mut *tx)
            .await?;
        for (index, step) in replacement.steps.iter().enumerate() {
            insert_step(&mut tx, quote_id, index + 1, step).await?;
        }

        let steps = fetch_steps(&mut tx, quote_id).await?;
        tx.commit().await?;

        Ok(CommittedFlow {
            quote_id: quote_id.clone(),
            version: next_version,
            step_number: replacement.step_number,
            current_step_id: replacement.current_step_id,
            steps,
        })
    }
}
