pub mod connection;
pub mod directory;
pub mod fixtures;
pub mod migrations;
pub mod persister;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use directory::SqlDirectory;
pub use fixtures::{DemoSeedDataset, SeedResult, SeededQuote, VerificationResult};
pub use persister::FlowPersister;
