pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "quoteflow",
    about = "Quoteflow operator CLI",
    long_about = "Apply migrations, load demo quotes, inspect configuration, and read committed approval flows.",
    after_help = "Examples:\n  quoteflow migrate\n  quoteflow seed\n  quoteflow flow --quote-id Q-DEMO-OPEN"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo quotes with open, approved, and frozen approval flows")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Show the committed approval flow of one quote")]
    Flow {
        #[arg(long, help = "Quote whose approval flow to show")]
        quote_id: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Flow { quote_id } => commands::flow::run(&quote_id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
