//! Configuration file for the `ukcp18` command.
//!
//! A single YAML document with optional sections:
//!
//! ```yaml
//! storage:
//!   azure:
//!     account: ${AZURE_STORAGE_ACCOUNT_NAME}
//! loader:
//!   crs_override: EPSG:27700
//! collection:
//!   id: ukcp-18
//!   custom_fields:
//!     - field: "ukcp18:scenario"
//!       attribute: scenario
//!       mandatory: true
//! cog:
//!   compression: ZSTD
//! ```
//!
//! Supports environment variable substitution using `${VAR}` and
//! `${VAR:-default}` syntax.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use cog_writer::CogOptions;
use netcdf_parser::LoaderConfig;
use stac_builder::CollectionOptions;
use storage::StorageConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ukcp18Config {
    pub storage: StorageConfig,
    pub loader: LoaderConfig,
    pub collection: CollectionOptions,
    pub cog: CogOptions,
}

impl Ukcp18Config {
    /// Load `path` when given, then fill storage credentials from the
    /// process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_config(path, |var| std::env::var(var).ok())?,
            None => Self::default(),
        };
        config.storage.apply_env(|var| std::env::var(var).ok());
        Ok(config)
    }
}

/// Read, expand and validate a configuration file.
pub fn load_config<P, F>(path: P, lookup: F) -> Result<Ukcp18Config>
where
    P: AsRef<Path>,
    F: Fn(&str) -> Option<String>,
{
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config from {:?}", path.as_ref()))?;

    parse_config(&content, lookup)
        .with_context(|| format!("Invalid config in {:?}", path.as_ref()))
}

fn parse_config<F>(content: &str, lookup: F) -> Result<Ukcp18Config>
where
    F: Fn(&str) -> Option<String>,
{
    let expanded = expand_env_vars(content, &lookup)?;

    let config: Ukcp18Config =
        serde_yaml::from_str(&expanded).context("Failed to parse config YAML")?;

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Ukcp18Config) -> Result<()> {
    let collection = &config.collection;
    anyhow::ensure!(!collection.id.trim().is_empty(), "Collection id cannot be empty");
    anyhow::ensure!(
        !collection.license.trim().is_empty(),
        "Collection license cannot be empty"
    );
    for field in &collection.custom_fields {
        anyhow::ensure!(
            !field.field.is_empty() && !field.attribute.is_empty(),
            "Custom fields need both a field and an attribute name"
        );
    }

    let block = config.cog.block_size;
    anyhow::ensure!(
        block >= 16 && block.is_power_of_two(),
        "COG block_size must be a power of two of at least 16, got {}",
        block
    );

    for (name, list) in [
        ("x_names", &config.loader.x_names),
        ("y_names", &config.loader.y_names),
        ("time_names", &config.loader.time_names),
    ] {
        anyhow::ensure!(!list.is_empty(), "loader.{} cannot be empty", name);
    }
    Ok(())
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Replace `${VAR}` and `${VAR:-default}` using `lookup`.
fn expand_env_vars<F>(content: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next();

        let mut expr = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) => expr.push(c),
                None => anyhow::bail!("Unclosed variable substitution: ${{{}", expr),
            }
        }
        result.push_str(&resolve_var_expr(&expr, lookup)?);
    }

    Ok(result)
}

fn resolve_var_expr<F>(expr: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match expr.split_once(":-") {
        Some((name, default)) => Ok(lookup(name.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())),
        None => lookup(expr.trim())
            .with_context(|| format!("Environment variable {} not set", expr.trim())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use ukcp18_common::CrsDescriptor;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_expand_env_vars() {
        let lookup = env(&[("ACCOUNT", "ukmet"), ("EMPTY", "")]);

        assert_eq!(
            expand_env_vars("account: ${ACCOUNT}", &lookup).unwrap(),
            "account: ukmet"
        );
        assert_eq!(
            expand_env_vars("region: ${REGION:-eu-west-2}", &lookup).unwrap(),
            "region: eu-west-2"
        );
        assert_eq!(
            expand_env_vars("x: ${EMPTY:-fallback}", &lookup).unwrap(),
            "x: fallback"
        );
        assert_eq!(expand_env_vars("cost: $5", &lookup).unwrap(), "cost: $5");
    }

    #[test]
    fn test_expand_env_vars_errors() {
        let lookup = env(&[]);
        assert!(expand_env_vars("a: ${MISSING}", &lookup).is_err());
        assert!(expand_env_vars("a: ${UNCLOSED", &lookup).is_err());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
storage:
  azure:
    account: ${ACCOUNT}
loader:
  crs_override: EPSG:27700
collection:
  id: ukcp18-land
  custom_fields:
    - field: "ukcp18:scenario"
      attribute: scenario
      mandatory: true
cog:
  compression: ZSTD
  block_size: 256
"#;
        let config = parse_config(yaml, env(&[("ACCOUNT", "ukmet")])).unwrap();

        assert_eq!(config.storage.azure.account.as_deref(), Some("ukmet"));
        assert_eq!(config.loader.crs_override, Some(CrsDescriptor::Epsg(27700)));
        assert_eq!(config.collection.id, "ukcp18-land");
        assert_eq!(config.collection.license, "OGL-UK-3.0");
        assert!(config.collection.custom_fields[0].mandatory);
        assert_eq!(config.cog.block_size, 256);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config = parse_config("{}", env(&[])).unwrap();
        assert_eq!(config, Ukcp18Config::default());
    }

    #[test]
    fn test_invalid_block_size_rejected() {
        let err = parse_config("cog:\n  block_size: 300\n", env(&[])).unwrap_err();
        assert!(err.to_string().contains("block_size"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ukcp18.yaml");
        fs::write(&path, "collection:\n  id: ${ID:-ukcp-18}\n").unwrap();

        let config = load_config(&path, env(&[])).unwrap();
        assert_eq!(config.collection.id, "ukcp-18");

        assert!(load_config(dir.path().join("absent.yaml"), env(&[])).is_err());
    }
}
