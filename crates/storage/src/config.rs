//! Object storage credentials and connection settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for S3-compatible storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// Custom endpoint (MinIO, Ceph, ...); AWS is used when unset
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Allow plain-HTTP endpoints
    pub allow_http: bool,
}

/// Settings for Azure Blob Storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureConfig {
    pub account: Option<String>,
    pub access_key: Option<String>,
    /// SAS token, with or without the leading `?`
    pub sas_token: Option<String>,
}

/// Storage configuration passed explicitly to the resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub s3: S3Config,
    pub azure: AzureConfig,
    /// Directory for fetched granules; the system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Fill credentials from environment variables.
    ///
    /// Values already present in the configuration are overridden.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut Option<String>, var: &str| {
            if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
                *target = Some(value);
            }
        };

        set(&mut self.azure.account, "AZURE_STORAGE_ACCOUNT_NAME");
        set(&mut self.azure.access_key, "AZURE_STORAGE_ACCOUNT_KEY");
        set(&mut self.azure.sas_token, "AZURE_STORAGE_SAS_TOKEN");
        set(&mut self.s3.access_key_id, "AWS_ACCESS_KEY_ID");
        set(&mut self.s3.secret_access_key, "AWS_SECRET_ACCESS_KEY");
        set(&mut self.s3.region, "AWS_REGION");
        set(&mut self.s3.endpoint, "AWS_ENDPOINT_URL");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_apply_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("AZURE_STORAGE_ACCOUNT_NAME", "ukmeteuwest"),
            ("AZURE_STORAGE_SAS_TOKEN", "sv=2021&sig=abc"),
            ("AWS_REGION", ""),
        ]
        .into_iter()
        .collect();

        let mut config = StorageConfig::default();
        config.s3.region = Some("eu-west-2".to_string());
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.azure.account.as_deref(), Some("ukmeteuwest"));
        assert_eq!(config.azure.sas_token.as_deref(), Some("sv=2021&sig=abc"));
        assert_eq!(config.azure.access_key, None);
        // empty variables do not clear configured values
        assert_eq!(config.s3.region.as_deref(), Some("eu-west-2"));
    }
}
