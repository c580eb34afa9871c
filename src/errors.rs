// Error taxonomy and user-friendly error messages
//
// Library layers return typed errors; the binary wraps them with anyhow and
// uses the formatting helpers below to point operators at a fix.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::CrisisCategory;

/// Failures while loading or validating the pattern catalog.
///
/// Always fatal at startup: serving traffic with a broken catalog would
/// silently disable crisis detection.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("category {0} has no rules")]
    EmptyCategory(CrisisCategory),

    #[error("rule '{rule}' has severity {severity}, expected a value in [0, 1]")]
    SeverityOutOfRange { rule: String, severity: f64 },

    #[error("rule in {0} must set exactly one of `phrase` or `regex`")]
    AmbiguousMatcher(CrisisCategory),

    #[error("invalid regex '{pattern}': {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid catalog entry: {0}")]
    Invalid(String),
}

/// Rejected at the normalizer boundary, before any scoring happens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("message is empty or whitespace-only")]
    EmptyInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("session {0} is poisoned by an earlier panic")]
    Poisoned(String),

    #[error("session {0} was evicted repeatedly while resolving")]
    Evicted(String),
}

/// Internal failures during a turn. These never reach the caller as errors:
/// the engine converts them into a fail-safe-high outcome.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("risk score is not a finite number")]
    NonFiniteScore,

    #[error("{0} pass panicked")]
    PassPanicked(&'static str),
}

/// Format a catalog load error with helpful suggestions
pub fn catalog_load_error(path: Option<&str>, error: &CatalogError) -> String {
    let source = path.unwrap_or("<built-in catalog>");
    format!(
        "Failed to load crisis pattern catalog from {}\n\n\
        \x1b[1;33mError:\x1b[0m {}\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Validate the catalog:\n\
           \x1b[36msafeharbor check-catalog {}\x1b[0m\n\n\
        2. Start from the built-in catalog:\n\
           \x1b[36msafeharbor export-catalog > catalog.json\x1b[0m\n\n\
        3. Common mistakes:\n\
           • Unknown category or mood label name\n\
           • Severity outside 0.0-1.0\n\
           • A rule setting both `phrase` and `regex`",
        source,
        error,
        path.unwrap_or("")
    )
}

/// Format a config parse error with helpful suggestions
pub fn config_parse_error(error: &str) -> String {
    format!(
        "Failed to load configuration\n\n\
        \x1b[1;33mError:\x1b[0m {}\n\n\
        \x1b[1;32mTry:\x1b[0m\n\
        1. Check config file syntax:\n\
           \x1b[36mcat ~/.safeharbor/config.toml\x1b[0m\n\n\
        2. Remove the file to fall back to defaults:\n\
           \x1b[36mmv ~/.safeharbor/config.toml ~/.safeharbor/config.toml.backup\x1b[0m",
        error
    )
}
