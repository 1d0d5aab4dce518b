use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use quoteflow_core::domain::approval::ApprovalStepId;
use quoteflow_core::domain::company::CompanyId;
use quoteflow_core::domain::quote::{Plan, Quote, QuoteId, QuoteType};

use super::rows::{
    fetch_steps, insert_step, parse_decimal, parse_timestamp, parse_u32, record_from_step,
};
use super::{QuoteRepository, RepositoryError};
use crate::DbPool;

pub struct SqlQuoteRepository {
    pool: DbPool,
}

impl SqlQuoteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl QuoteRepository for SqlQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(
            "SELECT
                id,
                name,
                company_id,
                filename,
                tcv,
                plan,
                term_months,
                quote_type,
                seats,
                discount_percentage,
                step_number,
                current_step_id,
                version,
                created_at,
                updated_at
             FROM quote
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&mut *conn)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut quote = quote_from_row(row)?;
        quote.approval_steps = fetch_steps(&mut conn, id).await?;
        Ok(Some(quote))
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        upsert_quote_row(&mut tx, &quote).await?;

        sqlx::query("DELETE FROM approval_step WHERE quote_id = ?")
            .bind(&quote.id.0)
            .execute(&mut *tx)
            .await?;
        for (index, step) in quote.approval_steps.iter().enumerate() {
            insert_step(&mut tx, &quote.id, index + 1, &record_from_step(step)).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn upsert_quote_row(
    conn: &mut SqliteConnection,
    quote: &Quote,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO quote (
            id,
            name,
            company_id,
            filename,
            tcv,
            plan,
            term_months,
            quote_type,
            seats,
            discount_percentage,
            step_number,
            current_step_id,
            version,
            created_at,
            updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            company_id = excluded.company_id,
            filename = excluded.filename,
            tcv = excluded.tcv,
            plan = excluded.plan,
            term_months = excluded.term_months,
            quote_type = excluded.quote_type,
            seats = excluded.seats,
            discount_percentage = excluded.discount_percentage,
            step_number = excluded.step_number,
            current_step_id = excluded.current_step_id,
            version = excluded.version,
            updated_at = excluded.updated_at",
    )
    .bind(&quote.id.0)
    .bind(&quote.name)
    .bind(quote.company_id.0)
    .bind(&quote.filename)
    .bind(quote.tcv.to_string())
    .bind(quote.plan.as_str())
    .bind(i64::from(quote.term_months))
    .bind(quote.quote_type.as_str())
    .bind(i64::from(quote.seats))
    .bind(quote.discount_percentage.to_string())
    .bind(i64::from(quote.step_number))
    .bind(quote.current_step_id.as_ref().map(|id| id.0.as_str()))
    .bind(i64::from(quote.version))
    .bind(quote.created_at.to_rfc3339())
    .bind(quote.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

fn quote_from_row(row: SqliteRow) -> Result<Quote, RepositoryError> {
    let plan_raw = row.try_get::<String, _>("plan")?;
    let plan = Plan::parse(&plan_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown plan `{plan_raw}`")))?;
    let quote_type_raw = row.try_get::<String, _>("quote_type")?;
    let quote_type = QuoteType::parse(&quote_type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown quote type `{quote_type_raw}`")))?;

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        name: row.try_get("name")?,
        company_id: CompanyId(row.try_get("company_id")?),
        filename: row.try_get("filename")?,
        tcv: parse_decimal("tcv", row.try_get("tcv")?)?,
        plan,
        term_months: parse_u32("term_months", row.try_get("term_months")?)?,
        quote_type,
        seats: parse_u32("seats", row.try_get("seats")?)?,
        discount_percentage: parse_decimal(
            "discount_percentage",
            row.try_get("discount_percentage")?,
        )?,
        approval_steps: Vec::new(),
        step_number: parse_u32("step_number", row.try_get("step_number")?)?,
        current_step_id: row.try_get::<Option<String>, _>("current_step_id")?.map(ApprovalStepId),
        version: parse_u32("version", row.try_get("version")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
