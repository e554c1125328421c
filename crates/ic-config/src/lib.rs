// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading and validation for the intent resolution core.
//!
//! Provides [`IcConfig`] — the top-level runtime settings for embedder
//! dimension, catalog seeding, rate-limit defaults, and decomposer
//! timeout/retry knobs — together with TOML loading, environment
//! overrides, and advisory [`ConfigWarning`]s.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },

    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },

    /// Semantic validation failed.
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// Advisory-level issues that do not prevent operation but deserve
/// attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// The decomposer timeout is unusually large.
    LargeDecomposerTimeout {
        /// Configured timeout, in seconds.
        secs: u64,
    },
    /// A tenant-tier rate-limit override looks suspiciously low.
    LowRateLimit {
        /// Tier name the warning applies to.
        tier: String,
        /// Configured requests-per-minute value.
        requests_per_minute: u32,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            ConfigWarning::LargeDecomposerTimeout { secs } => {
                write!(f, "decomposer timeout is unusually large ({secs}s)")
            }
            ConfigWarning::LowRateLimit {
                tier,
                requests_per_minute,
            } => write!(
                f,
                "tier '{tier}' rate limit is unusually low ({requests_per_minute} req/min)"
            ),
        }
    }
}

/// Top-level runtime configuration for the intent resolution core.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct IcConfig {
    /// Path to a JSON seed file loaded into the catalog at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_seed_path: Option<String>,

    /// Log level override (e.g. `"debug"`, `"info"`, `"warn"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Decomposer connection settings.
    #[serde(default)]
    pub decomposer: DecomposerSettings,

    /// Default rate-limit parameters, keyed by tenant tier name.
    #[serde(default)]
    pub rate_limits: RateLimitSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IcConfig {
    fn default() -> Self {
        Self {
            catalog_seed_path: None,
            log_level: default_log_level(),
            decomposer: DecomposerSettings::default(),
            rate_limits: RateLimitSettings::default(),
        }
    }
}

/// Connection settings for the LLM decomposer (C6).
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct DecomposerSettings {
    /// Base URL of the hosted model endpoint.
    pub endpoint: String,
    /// Bearer token sent with each request, if required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-call timeout, in seconds, before the request is abandoned.
    #[serde(default = "default_decomposer_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum jitter, in milliseconds, added before the single retry
    /// attempt.
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,
}

fn default_decomposer_timeout_secs() -> u64 {
    8
}

fn default_retry_jitter_ms() -> u64 {
    250
}

impl Default for DecomposerSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8088/v1/decompose".to_string(),
            api_key: None,
            timeout_secs: default_decomposer_timeout_secs(),
            retry_jitter_ms: default_retry_jitter_ms(),
        }
    }
}

/// Default rate-limit parameters applied when a tenant's own
/// [`ic_core::TenantConfig`] overrides are absent. Keyed by tier so an
/// operator can retune defaults without redeploying tenant records.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Requests-per-minute for the `free` tier.
    #[serde(default = "default_free_rpm")]
    pub free_requests_per_minute: u32,
    /// Requests-per-minute for the `enterprise` tier.
    #[serde(default = "default_enterprise_rpm")]
    pub enterprise_requests_per_minute: u32,
}

fn default_free_rpm() -> u32 {
    20
}

fn default_enterprise_rpm() -> u32 {
    1_000
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            free_requests_per_minute: default_free_rpm(),
            enterprise_requests_per_minute: default_enterprise_rpm(),
        }
    }
}

const LARGE_TIMEOUT_THRESHOLD_SECS: u64 = 60;
const LOW_RATE_LIMIT_THRESHOLD: u32 = 5;

/// Load an [`IcConfig`] from an optional TOML file path.
///
/// * If `path` is `Some`, reads and parses the file.
/// * If `path` is `None`, returns [`IcConfig::default()`].
///
/// Environment variable overrides are applied on top in both cases.
///
/// # Errors
///
/// Returns [`ConfigError::FileNotFound`] if `path` is given but cannot
/// be read, or [`ConfigError::ParseError`] if its contents are not
/// valid TOML for this shape.
pub fn load_config(path: Option<&Path>) -> Result<IcConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => IcConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into an [`IcConfig`].
///
/// # Errors
///
/// Returns [`ConfigError::ParseError`] if `content` is not valid TOML
/// for this shape.
pub fn parse_toml(content: &str) -> Result<IcConfig, ConfigError> {
    toml::from_str::<IcConfig>(content).map_err(|e| ConfigError::ParseError {
        reason: e.to_string(),
    })
}

/// Apply environment variable overrides.
///
/// Recognised variables:
/// - `IC_LOG_LEVEL`
/// - `IC_DECOMPOSER_ENDPOINT`
/// - `IC_DECOMPOSER_API_KEY`
pub fn apply_env_overrides(config: &mut IcConfig) {
    if let Ok(val) = std::env::var("IC_LOG_LEVEL") {
        config.log_level = val;
    }
    if let Ok(val) = std::env::var("IC_DECOMPOSER_ENDPOINT") {
        config.decomposer.endpoint = val;
    }
    if let Ok(val) = std::env::var("IC_DECOMPOSER_API_KEY") {
        config.decomposer.api_key = Some(val);
    }
}

const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (invalid log level, zero timeout) are returned as a
/// [`ConfigError::ValidationError`]; soft issues come back as
/// warnings.
///
/// # Errors
///
/// Returns [`ConfigError::ValidationError`] if any hard constraint is
/// violated.
pub fn validate_config(config: &IcConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<ConfigWarning> = Vec::new();

    if !VALID_LOG_LEVELS.contains(&config.log_level.as_str()) {
        errors.push(format!("invalid log_level '{}'", config.log_level));
    }

    if config.decomposer.timeout_secs == 0 {
        errors.push("decomposer.timeout_secs must be greater than 0".to_string());
    } else if config.decomposer.timeout_secs > LARGE_TIMEOUT_THRESHOLD_SECS {
        warnings.push(ConfigWarning::LargeDecomposerTimeout {
            secs: config.decomposer.timeout_secs,
        });
    }

    if config.rate_limits.free_requests_per_minute < LOW_RATE_LIMIT_THRESHOLD {
        warnings.push(ConfigWarning::LowRateLimit {
            tier: "free".to_string(),
            requests_per_minute: config.rate_limits.free_requests_per_minute,
        });
    }

    if config.catalog_seed_path.is_none() {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "catalog_seed_path".to_string(),
            hint: "the catalog will start empty".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid_with_warnings() {
        let cfg = IcConfig::default();
        let warnings = validate_config(&cfg).expect("default config should be valid");
        assert!(!warnings.is_empty());
    }

    #[test]
    fn default_config_has_sensible_defaults() {
        let cfg = IcConfig::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.decomposer.timeout_secs, 8);
        assert_eq!(cfg.rate_limits.free_requests_per_minute, 20);
    }

    #[test]
    fn parse_valid_toml_string() {
        let toml = r#"
            log_level = "debug"
            catalog_seed_path = "catalog.json"

            [decomposer]
            endpoint = "https://model.internal/v1/decompose"
            timeout_secs = 5
        "#;
        let cfg = parse_toml(toml).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.decomposer.endpoint, "https://model.internal/v1/decompose");
        assert_eq!(cfg.decomposer.timeout_secs, 5);
    }

    #[test]
    fn parse_invalid_toml_fails() {
        let err = parse_toml("not valid toml [[[").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn invalid_log_level_is_a_hard_error() {
        let mut cfg = IcConfig::default();
        cfg.log_level = "verbose".to_string();
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn zero_timeout_is_a_hard_error() {
        let mut cfg = IcConfig::default();
        cfg.decomposer.timeout_secs = 0;
        let err = validate_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }

    #[test]
    fn large_timeout_is_a_warning_not_an_error() {
        let mut cfg = IcConfig::default();
        cfg.decomposer.timeout_secs = 120;
        let warnings = validate_config(&cfg).unwrap();
        assert!(warnings
            .iter()
            .any(|w| matches!(w, ConfigWarning::LargeDecomposerTimeout { secs: 120 })));
    }

    #[test]
    fn load_config_from_file_applies_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"warn\"").unwrap();
        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.log_level, "warn");
    }

    #[test]
    fn load_config_missing_file_is_file_not_found() {
        let err = load_config(Some(Path::new("/nonexistent/ic-config.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn load_config_without_path_returns_default() {
        let cfg = load_config(None).unwrap();
        assert_eq!(cfg, IcConfig::default());
    }

    #[test]
    fn env_override_wins_over_file() {
        std::env::set_var("IC_LOG_LEVEL", "trace");
        let cfg = load_config(None).unwrap();
        std::env::remove_var("IC_LOG_LEVEL");
        assert_eq!(cfg.log_level, "trace");
    }
}
