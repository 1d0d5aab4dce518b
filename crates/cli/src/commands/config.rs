use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::commands::{load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, &[env_key], config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let entries = vec![
        entry(
            "database.url",
            &redact_url(&config.database.url),
            source("database.url", "QUOTEFLOW_DATABASE_URL"),
        ),
        entry(
            "database.max_connections",
            &config.database.max_connections.to_string(),
            source("database.max_connections", "QUOTEFLOW_DATABASE_MAX_CONNECTIONS"),
        ),
        entry(
            "database.timeout_secs",
            &config.database.timeout_secs.to_string(),
            source("database.timeout_secs", "QUOTEFLOW_DATABASE_TIMEOUT_SECS"),
        ),
        entry(
            "server.bind_address",
            &config.server.bind_address,
            source("server.bind_address", "QUOTEFLOW_SERVER_BIND_ADDRESS"),
        ),
        entry(
            "server.port",
            &config.server.port.to_string(),
            source("server.port", "QUOTEFLOW_SERVER_PORT"),
        ),
        entry(
            "server.graceful_shutdown_secs",
            &config.server.graceful_shutdown_secs.to_string(),
            source("server.graceful_shutdown_secs", "QUOTEFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ),
        entry(
            "logging.level",
            &config.logging.level,
            field_source(
                "logging.level",
                &["QUOTEFLOW_LOGGING_LEVEL", "QUOTEFLOW_LOG_LEVEL"],
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ),
        entry(
            "logging.format",
            &format!("{:?}", config.logging.format).to_ascii_lowercase(),
            field_source(
                "logging.format",
                &["QUOTEFLOW_LOGGING_FORMAT", "QUOTEFLOW_LOG_FORMAT"],
                config_file_doc.as_ref(),
                config_file_path.as_deref(),
            ),
        ),
    ];

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: env > file > default)",
        Some(Value::Array(entries)),
    )
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("quoteflow.toml"), PathBuf::from("config/quoteflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<toml::Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<toml::Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&toml::Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &toml::Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn entry(key: &str, value: &str, source: String) -> Value {
    json!({ "key": key, "value": value, "source": source })
}

/// Hides credentials embedded as `user:password@` in a database URL.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.split_once('@') {
        Some((credentials, host)) if credentials.contains(':') => {
            format!("{scheme}://<redacted>@{host}")
        }
        _ => url.to_string(),
    }
}
