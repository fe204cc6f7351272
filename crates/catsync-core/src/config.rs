use std::time::Duration;

use crate::app_config::{AppConfig, Environment};
use crate::settings::{
    BatchSettings, BreakerSettings, HarvestSettings, PaginationSettings, RemoteSettings,
    RetrySettings, DEFAULT_PERSISTED_QUERY_HASH, DEFAULT_QUERY_PROVIDER, DEFAULT_QUERY_SENDER,
    DEFAULT_SEARCH_ENDPOINT, DEFAULT_USER_AGENT,
};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_num = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let value = parse_num(var, default)?;
        u32::try_from(value).map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("CATSYNC_ENV", "development"))?;

    let bind_addr = or_default("CATSYNC_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "CATSYNC_BIND_ADDR".to_string(),
            reason: e.to_string(),
        })?;
    let log_level = or_default("CATSYNC_LOG_LEVEL", "info");
    let categories_path = PathBuf::from(or_default(
        "CATSYNC_CATEGORIES_PATH",
        "./config/categories.yaml",
    ));

    let db_max_connections = parse_u32("CATSYNC_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CATSYNC_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_num("CATSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;
    let sync_cron = or_default("CATSYNC_SYNC_CRON", "0 0 * * * *");

    let remote = RemoteSettings {
        endpoint: or_default("CATSYNC_SEARCH_ENDPOINT", DEFAULT_SEARCH_ENDPOINT),
        user_agent: or_default("CATSYNC_USER_AGENT", DEFAULT_USER_AGENT),
        persisted_query_hash: or_default(
            "CATSYNC_PERSISTED_QUERY_HASH",
            DEFAULT_PERSISTED_QUERY_HASH,
        ),
        sender: or_default("CATSYNC_QUERY_SENDER", DEFAULT_QUERY_SENDER),
        provider: or_default("CATSYNC_QUERY_PROVIDER", DEFAULT_QUERY_PROVIDER),
    };

    let breaker = BreakerSettings {
        failure_threshold: parse_u32("CATSYNC_BREAKER_FAILURE_THRESHOLD", "10")?,
        recovery_timeout: Duration::from_secs(parse_num("CATSYNC_BREAKER_RECOVERY_SECS", "60")?),
    };

    let retry = RetrySettings {
        max_retries: parse_u32("CATSYNC_MAX_RETRIES", "8")?,
        base_delay: Duration::from_millis(parse_num("CATSYNC_RETRY_BASE_DELAY_MS", "200")?),
        timeout_ladder: parse_ladder(
            "CATSYNC_TIMEOUT_LADDER_SECS",
            &or_default("CATSYNC_TIMEOUT_LADDER_SECS", "3,4,5,6,8,10,12,15"),
        )?,
        ..RetrySettings::default()
    };

    let batch = BatchSettings {
        min: parse_u32("CATSYNC_BATCH_MIN", "3")?,
        max: parse_u32("CATSYNC_BATCH_MAX", "12")?,
        initial: parse_u32("CATSYNC_BATCH_INITIAL", "5")?,
        ..BatchSettings::default()
    };

    let pagination = PaginationSettings {
        failure_ceiling: parse_u32("CATSYNC_CATEGORY_FAILURE_CEILING", "8")?,
        ..PaginationSettings::default()
    };

    let harvest = HarvestSettings {
        remote,
        breaker,
        retry,
        batch,
        pagination,
    };
    harvest.validate()?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        categories_path,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        sync_cron,
        harvest,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CATSYNC_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

/// Parse a comma-separated list of whole seconds, e.g. `"3,4,5"`.
fn parse_ladder(var: &str, raw: &str) -> Result<Vec<Duration>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::InvalidEnvVar {
                    var: var.to_string(),
                    reason: format!("'{s}': {e}"),
                })
        })
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
