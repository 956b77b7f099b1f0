use crate::app_config::{AppConfig, Environment};
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
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for any value that fails to parse.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_i64 = |var: &str, default: &str| -> Result<i64, ConfigError> {
        or_default(var, default)
            .parse::<i64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(default),
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
            },
        }
    };

    let env = parse_environment(&or_default("MAPSCOUT_ENV", "development"))?;

    let bind_addr = parse_addr("MAPSCOUT_BIND_ADDR", "0.0.0.0:8000")?;
    let log_level = or_default("MAPSCOUT_LOG_LEVEL", "info");
    let output_dir = PathBuf::from(or_default("MAPSCOUT_OUTPUT_DIR", "output"));
    let maps_url = or_default("MAPSCOUT_MAPS_URL", "https://www.google.com/maps");

    let navigation_timeout_secs = parse_u64("MAPSCOUT_NAVIGATION_TIMEOUT_SECS", "60")?;
    let ready_timeout_secs = parse_u64("MAPSCOUT_READY_TIMEOUT_SECS", "15")?;
    let settle_timeout_ms = parse_u64("MAPSCOUT_SETTLE_TIMEOUT_MS", "2000")?;

    let scroll_delta = parse_i64("MAPSCOUT_SCROLL_DELTA", "10000")?;
    let max_scroll_iterations = parse_usize("MAPSCOUT_MAX_SCROLL_ITERATIONS", "200")?;
    if max_scroll_iterations == 0 {
        return Err(invalid(
            "MAPSCOUT_MAX_SCROLL_ITERATIONS",
            "must be at least 1".to_string(),
        ));
    }

    let headless = parse_bool("MAPSCOUT_HEADLESS", true)?;
    let chrome_path = optional("MAPSCOUT_CHROME_PATH").map(PathBuf::from);
    let remote_browser_url = optional("MAPSCOUT_REMOTE_BROWSER_URL");

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        output_dir,
        maps_url,
        navigation_timeout_secs,
        ready_timeout_secs,
        settle_timeout_ms,
        scroll_delta,
        max_scroll_iterations,
        headless,
        chrome_path,
        remote_browser_url,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidEnvVar`] for unrecognized values.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "MAPSCOUT_ENV".to_string(),
            reason: format!("unknown environment \"{other}\""),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
