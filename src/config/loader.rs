// Configuration loader
// Loads ~/.safeharbor/config.toml (or an explicit path) and applies
// SAFEHARBOR_* environment overrides

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::settings::Config;
use crate::errors::config_parse_error;

const ENV_PREFIX: &str = "SAFEHARBOR_";

/// Default config location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".safeharbor/config.toml"))
}

/// Load configuration from a file, the environment and defaults.
///
/// An explicit `path` must exist. Without one, the default location is used
/// if present, otherwise built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            load_file(path)?
        }
        None => match default_config_path() {
            Some(default) if default.exists() => load_file(&default)?,
            _ => {
                tracing::debug!("No config file found, using defaults");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

fn load_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!(config_parse_error(&e.to_string())))?;

    tracing::info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Apply `SAFEHARBOR_*` overrides using `lookup` to read variables
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| {
        lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|value| !value.trim().is_empty())
    };

    if let Some(value) = get("CATALOG") {
        config.catalog_path = Some(PathBuf::from(value));
    }
    if let Some(value) = get("BIND_ADDRESS") {
        config.server.bind_address = value;
    }
    if let Some(value) = get("SESSION_TTL_HOURS") {
        config.session.ttl_hours = parse_env("SESSION_TTL_HOURS", &value)?;
    }
    if let Some(value) = get("MAX_SESSIONS") {
        config.session.max_sessions = parse_env("MAX_SESSIONS", &value)?;
    }
    if let Some(value) = get("MAX_TURNS") {
        config.session.max_turns = parse_env("MAX_TURNS", &value)?;
    }
    if let Some(value) = get("CLEANUP_INTERVAL_SECS") {
        config.session.cleanup_interval_secs = parse_env("CLEANUP_INTERVAL_SECS", &value)?;
    }
    if let Some(value) = get("CRISIS_HOTLINE") {
        config.safety.crisis_hotline = value;
    }
    if let Some(value) = get("CRISIS_TEXT_LINE") {
        config.safety.crisis_text_line = value;
    }
    if let Some(value) = get("EMERGENCY_NUMBER") {
        config.safety.emergency_number = value;
    }

    Ok(())
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{}{}='{}' is invalid: {}", ENV_PREFIX, name, value, e))
}
