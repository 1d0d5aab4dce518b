use std::sync::Arc;

use axum::Router;
use quoteflow_core::config::{AppConfig, ConfigError, LoadOptions};
use quoteflow_db::{connect_with_config, migrations, DbPool};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{self, ApiState};
use crate::audit::TracingAuditSink;
use crate::health;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
}

impl Application {
    /// API and health routes behind request tracing.
    pub fn router(&self) -> Router {
        let state = ApiState::from_pool(self.db_pool.clone(), Arc::new(TracingAuditSink));
        api::router(state)
            .merge(health::router(self.db_pool.clone()))
            .layer(TraceLayer::new_for_http())
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        quote_id = "unknown",
        "starting application bootstrap"
    );

    let db_pool = connect_with_config(&config.database)
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        quote_id = "unknown",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        quote_id = "unknown",
        "database migrations applied"
    );

    Ok(Application { config, db_pool })
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use quoteflow_core::config::{ConfigOverrides, LoadOptions};
    use tower::ServiceExt;

    use crate::bootstrap::bootstrap;

    fn overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_database_url() {
        let result = bootstrap(overrides("postgres://localhost/quoteflow")).await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("database.url"));
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_serves_health_and_api() {
        let app = bootstrap(overrides("sqlite::memory:")).await.expect("bootstrap");

        let (approvers,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM approver")
            .fetch_one(&app.db_pool)
            .await
            .expect("reference approvers are seeded");
        assert_eq!(approvers, 6);

        let health = app
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health response");
        assert_eq!(health.status(), StatusCode::OK);

        let listing = app
            .router()
            .oneshot(Request::get("/api/approvers?role=cro").body(Body::empty()).expect("request"))
            .await
            .expect("approvers response");
        assert_eq!(listing.status(), StatusCode::OK);
        let bytes = to_bytes(listing.into_body(), usize::MAX).await.expect("body");
        let approvers: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(approvers[0]["name"], "Morgan Reyes");

        app.db_pool.close().await;
    }
}
