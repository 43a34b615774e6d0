use std::path::PathBuf;

use crate::app_config::AppConfig;
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
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
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can drive it with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        let value = raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })?;
        if value == 0 {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(value)
    };

    let log_level = or_default("SHELFSCAN_LOG_LEVEL", "info");
    let webdriver_url = or_default("SHELFSCAN_WEBDRIVER_URL", "http://localhost:9515");
    if !webdriver_url.starts_with("http://") && !webdriver_url.starts_with("https://") {
        return Err(ConfigError::InvalidEnvVar {
            var: "SHELFSCAN_WEBDRIVER_URL".to_string(),
            reason: format!("expected an http(s) URL, got '{webdriver_url}'"),
        });
    }

    let search_endpoint = optional("SHELFSCAN_SEARCH_ENDPOINT");
    let search_query_param = or_default("SHELFSCAN_SEARCH_QUERY_PARAM", "q");
    let output_path = PathBuf::from(or_default(
        "SHELFSCAN_OUTPUT_PATH",
        "./output/records.jsonl",
    ));
    let store_dir = PathBuf::from(or_default("SHELFSCAN_STORE_DIR", "./storage"));
    let user_agent = optional("SHELFSCAN_USER_AGENT");

    let eval_timeout_ms = parse_u64("SHELFSCAN_EVAL_TIMEOUT_MS", "10000")?;
    let results_timeout_ms = parse_u64("SHELFSCAN_RESULTS_TIMEOUT_MS", "10000")?;
    let location_step_timeout_ms = parse_u64("SHELFSCAN_LOCATION_STEP_TIMEOUT_MS", "8000")?;
    let session_timeout_secs = parse_u64("SHELFSCAN_SESSION_TIMEOUT_SECS", "300")?;
    let retry_backoff_base_ms = parse_u64("SHELFSCAN_RETRY_BACKOFF_BASE_MS", "2000")?;

    Ok(AppConfig {
        log_level,
        webdriver_url,
        search_endpoint,
        search_query_param,
        output_path,
        store_dir,
        user_agent,
        eval_timeout_ms,
        results_timeout_ms,
        location_step_timeout_ms,
        session_timeout_secs,
        retry_backoff_base_ms,
    })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
