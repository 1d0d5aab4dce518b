use quoteflow_core::domain::quote::{Quote, QuoteId};
use quoteflow_db::repositories::{QuoteRepository, SqlQuoteRepository};
use quoteflow_db::{connect_with_config, migrations};
use serde_json::{json, Value};

use crate::commands::{
    load_config, runtime, CommandResult, EXIT_DB_CONNECT, EXIT_MIGRATION, EXIT_NOT_FOUND,
    EXIT_STORAGE, EXIT_USAGE,
};

pub fn run(quote_id: &str) -> CommandResult {
    let quote_id = quote_id.trim();
    if quote_id.is_empty() {
        return CommandResult::failure(
            "flow",
            "invalid_argument",
            "quote id is required",
            EXIT_USAGE,
        );
    }

    let config = match load_config("flow") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("flow") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB_CONNECT))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let found = SqlQuoteRepository::new(pool.clone())
            .find_by_id(&QuoteId(quote_id.to_string()))
            .await
            .map_err(|error| ("storage", error.to_string(), EXIT_STORAGE));
        pool.close().await;

        found?.ok_or_else(|| {
            ("not_found", format!("quote `{quote_id}` was not found"), EXIT_NOT_FOUND)
        })
    });

    match result {
        Ok(quote) => {
            CommandResult::success_with_data("flow", summary(&quote), Some(flow_data(&quote)))
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("flow", error_class, message, exit_code)
        }
    }
}

fn summary(quote: &Quote) -> String {
    let state = if quote.is_frozen() {
        "frozen"
    } else if quote.approval_steps.is_empty() {
        "empty"
    } else {
        "open"
    };
    match quote.current_step() {
        Some(step) => format!(
            "{} is {state} at step {} of {} ({}, {})",
            quote.id.0,
            quote.step_number,
            quote.approval_steps.len(),
            step.assignee.name,
            step.status.label()
        ),
        None => format!("{} has no approval steps", quote.id.0),
    }
}

fn flow_data(quote: &Quote) -> Value {
    let steps: Vec<Value> = quote
        .approval_steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            json!({
                "position": index + 1,
                "id": step.id.0,
                "status": step.status,
                "assignee": step.assignee.name,
                "role": step.assignee.role.label(),
                "info_requested": step.info_requested,
                "updated_at": step.updated_at.to_rfc3339(),
            })
        })
        .collect();

    json!({
        "quote_id": quote.id.0,
        "version": quote.version,
        "step_number": quote.step_number,
        "current_step_id": quote.current_step_id.as_ref().map(|id| id.0.as_str()),
        "frozen": quote.is_frozen(),
        "discount_percentage": quote.discount_percentage.to_string(),
        "steps": steps,
    })
}
