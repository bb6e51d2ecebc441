//! Remote object access (S3, Azure Blob Storage, HTTP) through `object_store`.

use object_store::{
    aws::AmazonS3Builder,
    azure::{AzureConfigKey, MicrosoftAzureBuilder},
    http::HttpBuilder,
    path::Path,
    ObjectStore,
};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::location::SourceLocation;

/// Client for the store a remote [`SourceLocation`] lives in.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    /// Bucket, container or HTTP base URL, for logging
    name: String,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage").field("name", &self.name).finish()
    }
}

impl ObjectStorage {
    /// Create a client for the store holding `location`.
    pub fn for_location(location: &SourceLocation, config: &StorageConfig) -> StorageResult<Self> {
        match location {
            SourceLocation::S3 { bucket, .. } => Self::s3(bucket, config),
            SourceLocation::Azure { container, .. } => Self::azure(container, config),
            SourceLocation::Http { url } => Self::http(url),
            SourceLocation::Local(_) => Err(StorageError::InvalidLocation(location.to_string())),
        }
    }

    fn s3(bucket: &str, config: &StorageConfig) -> StorageResult<Self> {
        let s3 = &config.s3;
        let mut builder = AmazonS3Builder::new().with_bucket_name(bucket);

        if let Some(endpoint) = &s3.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(region) = &s3.region {
            builder = builder.with_region(region);
        }
        if let (Some(key_id), Some(secret)) = (&s3.access_key_id, &s3.secret_access_key) {
            builder = builder
                .with_access_key_id(key_id)
                .with_secret_access_key(secret);
        }
        if s3.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Backend(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            name: bucket.to_string(),
        })
    }

    fn azure(container: &str, config: &StorageConfig) -> StorageResult<Self> {
        let azure = &config.azure;
        let account = azure
            .account
            .as_deref()
            .ok_or_else(|| StorageError::MissingCredentials(format!("az://{}", container)))?;

        let mut builder = MicrosoftAzureBuilder::new()
            .with_account(account)
            .with_container_name(container);

        if let Some(key) = &azure.access_key {
            builder = builder.with_access_key(key);
        } else if let Some(token) = &azure.sas_token {
            builder = builder.with_config(AzureConfigKey::SasKey, token.trim_start_matches('?'));
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::Backend(format!("Failed to create Azure client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            name: format!("{}/{}", account, container),
        })
    }

    fn http(url: &str) -> StorageResult<Self> {
        let base = http_base(url).ok_or_else(|| StorageError::InvalidLocation(url.to_string()))?;
        let store = HttpBuilder::new()
            .with_url(base)
            .build()
            .map_err(|e| StorageError::Backend(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            name: base.to_string(),
        })
    }

    /// Stream an object into a local file, returning the bytes written.
    #[instrument(skip(self, path, dest), fields(store = %self.name, path = %path))]
    pub async fn download(&self, path: &str, dest: &std::path::Path) -> StorageResult<u64> {
        use futures::TryStreamExt;

        let location = Path::from(path);
        let mut stream = self.store.get(&location).await?.into_stream();

        let mut file = tokio::fs::File::create(dest).await?;
        let mut size = 0u64;
        while let Some(chunk) = stream.try_next().await? {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(size, "Downloaded object");
        Ok(size)
    }

    /// List object keys under a prefix.
    #[instrument(skip(self), fields(store = %self.name))]
    pub async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        use futures::TryStreamExt;

        let prefix_path = Path::from(prefix.trim_end_matches('/'));
        let prefix_arg = (!prefix.is_empty()).then_some(&prefix_path);

        let mut paths = Vec::new();
        let mut stream = self.store.list(prefix_arg);
        while let Some(meta) = stream.try_next().await? {
            paths.push(meta.location.to_string());
        }

        debug!(count = paths.len(), prefix, "Listed objects");
        Ok(paths)
    }
}

/// Key of `location` within its store.
pub(crate) fn object_key(location: &SourceLocation) -> StorageResult<String> {
    match location {
        SourceLocation::S3 { key, .. } | SourceLocation::Azure { key, .. } => Ok(key.clone()),
        SourceLocation::Http { url } => {
            let base = http_base(url).ok_or_else(|| StorageError::InvalidLocation(url.clone()))?;
            Ok(url[base.len()..].trim_start_matches('/').to_string())
        }
        SourceLocation::Local(_) => Err(StorageError::InvalidLocation(location.to_string())),
    }
}

/// `scheme://host[:port]` of a URL.
fn http_base(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")? + 3;
    let host_end = url[scheme_end..]
        .find('/')
        .map(|i| i + scheme_end)
        .unwrap_or(url.len());
    (host_end > scheme_end).then(|| &url[..host_end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_base_and_key() {
        assert_eq!(
            http_base("https://example.com/data/tas.nc"),
            Some("https://example.com")
        );
        assert_eq!(http_base("https://"), None);

        let loc = SourceLocation::parse("https://example.com:8080/data/tas.nc").unwrap();
        assert_eq!(object_key(&loc).unwrap(), "data/tas.nc");
    }

    #[test]
    fn test_azure_requires_account() {
        let loc = SourceLocation::parse("az://ukcp18/tas.nc").unwrap();
        let err = ObjectStorage::for_location(&loc, &StorageConfig::default()).unwrap_err();
        assert!(matches!(err, StorageError::MissingCredentials(_)));
    }

    #[tokio::test]
    async fn test_download_writes_whole_object() {
        let store = object_store::memory::InMemory::new();
        let body: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        store
            .put(&Path::from("ukcp18/tas.nc"), body.clone().into())
            .await
            .unwrap();
        let storage = ObjectStorage {
            store: Arc::new(store),
            name: "memory".to_string(),
        };

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("tas.nc");
        let size = storage.download("ukcp18/tas.nc", &dest).await.unwrap();

        assert_eq!(size, body.len() as u64);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let storage = ObjectStorage {
            store: Arc::new(object_store::memory::InMemory::new()),
            name: "memory".to_string(),
        };
        let dir = tempfile::tempdir().unwrap();
        assert!(storage
            .download("ukcp18/none.nc", &dir.path().join("none.nc"))
            .await
            .is_err());
    }

    #[test]
    fn test_local_location_rejected() {
        let loc = SourceLocation::parse("/tmp/tas.nc").unwrap();
        assert!(ObjectStorage::for_location(&loc, &StorageConfig::default()).is_err());
    }
}
