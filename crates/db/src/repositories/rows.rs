use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use quoteflow_core::domain::approval::{
    ApprovalParty, ApprovalStatus, ApprovalStep, ApprovalStepId, Approver, ApproverId,
};
use quoteflow_core::domain::quote::QuoteId;
use quoteflow_core::flows::StepRecord;

use super::RepositoryError;

pub(crate) async fn fetch_steps(
    conn: &mut SqliteConnection,
    quote_id: &QuoteId,
) -> Result<Vec<ApprovalStep>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT
            s.id,
            s.status,
            s.info_requested,
            s.created_at,
            s.updated_at,
            a.id AS assignee_id,
            a.name AS assignee_name,
            a.email AS assignee_email,
            a.role AS assignee_role
         FROM approval_step s
         JOIN approver a ON a.id = s.assignee_id
         WHERE s.quote_id = ?
         ORDER BY s.step_number ASC",
    )
    .bind(&quote_id.0)
    .fetch_all(&mut *conn)
    .await?;

    rows.into_iter().map(step_from_row).collect()
}

/// Writes one step at its 1-based position.
pub(crate) async fn insert_step(
    conn: &mut SqliteConnection,
    quote_id: &QuoteId,
    position: usize,
    step: &StepRecord,
) -> Result<(), RepositoryError> {
    let step_number = i64::try_from(position).map_err(|_| {
        RepositoryError::Decode(format!("step position {position} does not fit in a column"))
    })?;

    let result = sqlx::query(
        "INSERT INTO approval_step (
            id,
            quote_id,
            step_number,
            status,
            assignee_id,
            info_requested,
            created_at,
            updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&step.id.0)
    .bind(&quote_id.0)
    .bind(step_number)
    .bind(step.status.as_str())
    .bind(step.assignee_id.0)
    .bind(step.info_requested.as_deref())
    .bind(step.created_at.to_rfc3339())
    .bind(step.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(error)) if error.is_foreign_key_violation() => {
            Err(RepositoryError::NotFound {
                entity: "approver",
                id: step.assignee_id.0.to_string(),
            })
        }
        Err(error) => Err(error.into()),
    }
}

pub(crate) fn record_from_step(step: &ApprovalStep) -> StepRecord {
    StepRecord {
        id: step.id.clone(),
        status: step.status,
        assignee_id: step.assignee.id,
        created_at: step.created_at,
        updated_at: step.updated_at,
        info_requested: step.info_requested.clone(),
    }
}

fn step_from_row(row: SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = ApprovalStatus::parse(&status_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown approval status `{status_raw}`"))
    })?;
    let role_raw = row.try_get::<String, _>("assignee_role")?;
    let role = role_raw.parse::<ApprovalParty>().map_err(RepositoryError::Decode)?;

    Ok(ApprovalStep {
        id: ApprovalStepId(row.try_get("id")?),
        status,
        assignee: Approver {
            id: ApproverId(row.try_get("assignee_id")?),
            name: row.try_get("assignee_name")?,
            email: row.try_get("assignee_email")?,
            role,
        },
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
        info_requested: row.try_get("info_requested")?,
    })
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}
