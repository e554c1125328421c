// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared command implementations for the intent resolution CLI.
//!
//! These functions are library-level so they can be tested without
//! spawning the binary.

use anyhow::{bail, Context, Result};
use ic_core::{BatchJob, IntentCatalogEntry, ResolveOutput, TenantConfig};
use schemars::schema_for;
use std::collections::HashMap;
use std::path::Path;

/// Schema types that can be printed by the `schema` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// JSON schema for [`IntentCatalogEntry`].
    CatalogEntry,
    /// JSON schema for [`TenantConfig`].
    TenantConfig,
    /// JSON schema for [`ResolveOutput`].
    ResolveOutput,
    /// JSON schema for [`BatchJob`].
    BatchJob,
    /// JSON schema for [`ic_config::IcConfig`].
    Config,
}

/// Return the JSON schema string for the given kind.
///
/// # Errors
///
/// Returns an error if the schema cannot be serialized, which should
/// not happen for any type in this workspace.
pub fn schema_json(kind: SchemaKind) -> Result<String> {
    let value = match kind {
        SchemaKind::CatalogEntry => serde_json::to_value(schema_for!(IntentCatalogEntry))?,
        SchemaKind::TenantConfig => serde_json::to_value(schema_for!(TenantConfig))?,
        SchemaKind::ResolveOutput => serde_json::to_value(schema_for!(ResolveOutput))?,
        SchemaKind::BatchJob => serde_json::to_value(schema_for!(BatchJob))?,
        SchemaKind::Config => serde_json::to_value(schema_for!(ic_config::IcConfig))?,
    };
    serde_json::to_string_pretty(&value).context("serialize schema")
}

/// Load and count a catalog seed file (a JSON object mapping
/// `CATEGORY.INTENT` codes to lists of example phrases, per
/// [`ic_catalog::InMemoryCatalog::refresh`]) without embedding anything
/// or mutating any running catalog.
///
/// # Errors
///
/// Returns an error if the file cannot be read, does not parse as a
/// `{intent_code: [examples]}` object, or names a key that isn't a
/// `CATEGORY.INTENT` code.
pub fn validate_catalog_file(path: &Path) -> Result<usize> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read file '{}'", path.display()))?;
    let seed: HashMap<String, Vec<String>> = serde_json::from_str(&content)
        .with_context(|| format!("parse catalog seed from '{}'", path.display()))?;
    let mut count = 0;
    for (intent_code, examples) in &seed {
        if !intent_code.contains('.') || !intent_code.chars().all(|c| c.is_ascii_uppercase() || c == '_' || c == '.') {
            bail!("invalid intent code '{intent_code}' in '{}'", path.display());
        }
        count += examples.len();
    }
    Ok(count)
}

/// Load and count a tenant seed file (a JSON array of [`TenantConfig`]).
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse as a
/// JSON array of [`TenantConfig`].
pub fn validate_tenant_file(path: &Path) -> Result<Vec<TenantConfig>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("read file '{}'", path.display()))?;
    let tenants: Vec<TenantConfig> = serde_json::from_str(&content)
        .with_context(|| format!("parse tenant configs from '{}'", path.display()))?;
    Ok(tenants)
}

/// Load an [`ic_config::IcConfig`] from an optional TOML path and
/// return its advisory warnings as display strings.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or fails hard
/// validation (see [`ic_config::validate_config`]).
pub fn config_check(path: Option<&Path>) -> Result<Vec<String>> {
    let config = ic_config::load_config(path).context("load config")?;
    let warnings = ic_config::validate_config(&config).context("validate config")?;
    Ok(warnings.into_iter().map(|w| w.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn schema_json_produces_valid_json_for_every_kind() {
        for kind in [
            SchemaKind::CatalogEntry,
            SchemaKind::TenantConfig,
            SchemaKind::ResolveOutput,
            SchemaKind::BatchJob,
            SchemaKind::Config,
        ] {
            let s = schema_json(kind).unwrap();
            let _: serde_json::Value = serde_json::from_str(&s).unwrap();
        }
    }

    #[test]
    fn validate_catalog_file_counts_examples() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ORDER_STATUS.WISMO":["where is my order","track my package"]}}"#
        )
        .unwrap();
        let count = validate_catalog_file(file.path()).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn validate_catalog_file_rejects_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(validate_catalog_file(file.path()).is_err());
    }

    #[test]
    fn validate_catalog_file_rejects_bad_intent_code() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"not-a-code":["hello"]}}"#).unwrap();
        assert!(validate_catalog_file(file.path()).is_err());
    }

    #[test]
    fn config_check_on_missing_path_uses_defaults() {
        let warnings = config_check(None).unwrap();
        assert!(!warnings.is_empty());
    }
}
