use crate::commands::{
    load_config, runtime, CommandResult, EXIT_DB_CONNECT, EXIT_MIGRATION, EXIT_SEED,
};
use quoteflow_db::{connect_with_config, migrations, DemoSeedDataset, SeededQuote};

pub fn run() -> CommandResult {
    let config = match load_config("seed") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("seed") {
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

        let seed_result = DemoSeedDataset::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED))?;
        let verification = DemoSeedDataset::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED))?;

        let failed_checks = verification
            .checks
            .iter()
            .filter_map(|(check, passed)| (!passed).then_some(*check))
            .collect::<Vec<_>>();
        let run_result = if verification.all_present {
            Ok(seed_result.quotes)
        } else {
            Err(("seed_verification", verification_message(&failed_checks), EXIT_SEED))
        };

        pool.close().await;
        run_result
    });

    match result {
        Ok(quotes) => CommandResult::success("seed", seeded_message(&quotes)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn seeded_message(quotes: &[SeededQuote]) -> String {
    let lines: Vec<String> = quotes
        .iter()
        .map(|quote| {
            let state = if quote.frozen { "frozen" } else { "open" };
            format!(
                "  - {}: {} steps, {state} ({})",
                quote.quote_id, quote.steps, quote.description
            )
        })
        .collect();
    format!("demo quotes loaded:\n{}", lines.join("\n"))
}

fn verification_message(failed_checks: &[&str]) -> String {
    if failed_checks.is_empty() {
        "Some demo quotes failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use quoteflow_db::SeededQuote;

    use super::{seeded_message, verification_message};

    #[test]
    fn verification_message_names_failed_checks() {
        assert_eq!(
            verification_message(&["Q-DEMO-OPEN", "frozen flow pointer"]),
            "Seed verification failed for checks: Q-DEMO-OPEN, frozen flow pointer"
        );
        assert_eq!(verification_message(&[]), "Some demo quotes failed to load");
    }

    #[test]
    fn seeded_message_marks_frozen_flows() {
        let message = seeded_message(&[SeededQuote {
            quote_id: "Q-DEMO-REJECTED",
            steps: 3,
            frozen: true,
            description: "Legal rejected the terms, flow is frozen",
        }]);

        assert!(message.ends_with(
            "  - Q-DEMO-REJECTED: 3 steps, frozen (Legal rejected the terms, flow is frozen)"
        ));
    }
}
