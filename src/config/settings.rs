// Configuration structs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::catalog::PatternCatalog;
use crate::engine::EngineConfig;
use crate::errors::catalog_load_error;
use crate::escalation::SafetyConfig;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8000")
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Custom pattern catalog; the built-in catalog is used when unset
    pub catalog_path: Option<PathBuf>,
    pub engine: EngineConfig,
    pub session: SessionConfig,
    pub safety: SafetyConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Check every section and report all problems at once
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let engine = &self.engine;

        if engine.aggregator.history_window == 0 {
            errors.push("engine.history_window must be positive".to_string());
        }
        if !(engine.aggregator.history_decay > 0.0 && engine.aggregator.history_decay <= 1.0) {
            errors.push("engine.history_decay must be in (0, 1]".to_string());
        }
        if !(engine.aggregator.trend_delta >= 0.0 && engine.aggregator.trend_delta < 1.0) {
            errors.push("engine.trend_delta must be in [0, 1)".to_string());
        }
        if engine.parallel_token_threshold == 0 {
            errors.push("engine.parallel_token_threshold must be positive".to_string());
        }

        if self.session.ttl_hours == 0 {
            errors.push("session.ttl_hours must be positive".to_string());
        }
        if self.session.max_sessions == 0 {
            errors.push("session.max_sessions must be positive".to_string());
        }
        if self.session.max_turns == 0 {
            errors.push("session.max_turns must be positive".to_string());
        }
        if self.session.cleanup_interval_secs == 0 {
            errors.push("session.cleanup_interval_secs must be positive".to_string());
        }

        for (name, value) in [
            ("safety.crisis_hotline", &self.safety.crisis_hotline),
            ("safety.crisis_text_line", &self.safety.crisis_text_line),
            ("safety.emergency_number", &self.safety.emergency_number),
            ("safety.samhsa_helpline", &self.safety.samhsa_helpline),
            ("safety.nami_helpline", &self.safety.nami_helpline),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{} must not be empty", name));
            }
        }

        if self
            .server
            .bind_address
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            errors.push(format!(
                "server.bind_address '{}' is not a socket address",
                self.server.bind_address
            ));
        }

        if !errors.is_empty() {
            bail!("Invalid configuration:\n  - {}", errors.join("\n  - "));
        }
        Ok(())
    }

    /// Load and validate the configured catalog
    pub fn load_catalog(&self) -> Result<PatternCatalog> {
        let catalog = match &self.catalog_path {
            Some(path) => PatternCatalog::load_from_file(path).map_err(|e| {
                anyhow::anyhow!(catalog_load_error(Some(&path.display().to_string()), &e))
            })?,
            None => PatternCatalog::builtin()
                .map_err(|e| anyhow::anyhow!(catalog_load_error(None, &e)))?,
        };

        let stats = catalog.stats();
        tracing::info!(
            rules = catalog.rules().len(),
            regex_rules = stats.regex_rules,
            modifiers = stats.modifiers,
            mood_keywords = catalog.mood_keywords().len(),
            "Pattern catalog ready"
        );
        Ok(catalog)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.session.max_turns, 100);
        assert_eq!(config.session.ttl_hours, 24);
        assert_eq!(config.safety.crisis_hotline, "988");
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = Config::default();
        config.session.max_sessions = 0;
        config.engine.aggregator.history_decay = 1.5;
        config.safety.emergency_number = " ".to_string();

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("session.max_sessions"));
        assert!(message.contains("engine.history_decay"));
        assert!(message.contains("safety.emergency_number"));
    }

    #[test]
    fn test_toml_round_trip_keeps_flattened_engine_fields() {
        let mut config = Config::default();
        config.engine.aggregator.history_window = 7;

        let text = config.to_toml().unwrap();
        assert!(text.contains("history_window = 7"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.engine.aggregator.history_window, 7);
    }
}
