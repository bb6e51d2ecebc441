//! Resolve a source location to local NetCDF files.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::glob::GlobPattern;
use crate::location::SourceLocation;
use crate::object_store::{object_key, ObjectStorage};

/// One granule: where it came from and where it can be read locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Original location, used as the source asset href
    pub href: String,
    pub local_path: PathBuf,
}

impl ResolvedSource {
    /// File name of the original location.
    pub fn file_name(&self) -> Option<&str> {
        self.href.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

/// Resolved granules, sorted by href.
///
/// Remote granules are fetched into a scratch directory that lives as long
/// as this value.
#[derive(Debug)]
pub struct ResolvedSources {
    sources: Vec<ResolvedSource>,
    _scratch: Option<TempDir>,
}

impl ResolvedSources {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn local_paths(&self) -> Vec<&Path> {
        self.sources.iter().map(|s| s.local_path.as_path()).collect()
    }

    /// The granule, if exactly one was resolved.
    pub fn single(&self) -> Option<&ResolvedSource> {
        match self.sources.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// Turns [`SourceLocation`]s into readable local files.
#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    config: StorageConfig,
}

impl SourceResolver {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Resolve `location`, expanding globs and fetching remote objects.
    #[instrument(skip(self, location), fields(location = %location))]
    pub async fn resolve(&self, location: &SourceLocation) -> StorageResult<ResolvedSources> {
        let resolved = match location {
            SourceLocation::Local(path) => self.resolve_local(path)?,
            _ => self.resolve_remote(location).await?,
        };

        if resolved.is_empty() {
            return Err(StorageError::NoMatches(location.to_string()));
        }

        info!(count = resolved.len(), "Resolved source files");
        Ok(resolved)
    }

    /// Parse and resolve a location string.
    pub async fn resolve_str(&self, location: &str) -> StorageResult<ResolvedSources> {
        self.resolve(&SourceLocation::parse(location)?).await
    }

    fn resolve_local(&self, path: &Path) -> StorageResult<ResolvedSources> {
        let as_str = path.to_string_lossy();

        let mut paths = if GlobPattern::is_glob(&as_str) {
            expand_local_glob(&as_str)?
        } else if path.is_file() {
            vec![path.to_path_buf()]
        } else {
            return Err(StorageError::NotFound(as_str.into_owned()));
        };
        paths.sort();

        let sources = paths
            .into_iter()
            .map(|p| ResolvedSource {
                href: p.to_string_lossy().into_owned(),
                local_path: p,
            })
            .collect();

        Ok(ResolvedSources {
            sources,
            _scratch: None,
        })
    }

    async fn resolve_remote(&self, location: &SourceLocation) -> StorageResult<ResolvedSources> {
        let storage = ObjectStorage::for_location(location, &self.config)?;
        let key = object_key(location)?;

        let mut keys = if location.is_glob() {
            let glob = GlobPattern::new(&key)?;
            storage
                .list(glob.literal_prefix())
                .await?
                .into_iter()
                .filter(|k| glob.matches(k))
                .collect()
        } else {
            vec![key]
        };
        keys.sort();

        if keys.is_empty() {
            return Ok(ResolvedSources {
                sources: Vec::new(),
                _scratch: None,
            });
        }

        let scratch = match &self.config.scratch_dir {
            Some(dir) => tempfile::Builder::new().prefix("ukcp18-").tempdir_in(dir)?,
            None => tempfile::Builder::new().prefix("ukcp18-").tempdir()?,
        };

        let mut sources = Vec::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            let remote = match location {
                SourceLocation::Http { .. } => location.clone(),
                _ => location.with_path(key),
            };
            let name = remote
                .file_name()
                .unwrap_or_else(|| format!("granule-{}.nc", index));

            // one subdirectory per object so equal basenames cannot collide
            let dir = scratch.path().join(index.to_string());
            tokio::fs::create_dir_all(&dir).await?;
            let local_path = dir.join(&name);

            let size = storage.download(key, &local_path).await?;
            debug!(href = %remote, local = %local_path.display(), size, "Fetched granule");

            sources.push(ResolvedSource {
                href: remote.to_string(),
                local_path,
            });
        }

        Ok(ResolvedSources {
            sources,
            _scratch: Some(scratch),
        })
    }
}

fn expand_local_glob(pattern: &str) -> StorageResult<Vec<PathBuf>> {
    let glob = GlobPattern::new(pattern)?;
    let prefix = glob.literal_prefix();
    let root = if prefix.is_empty() { "." } else { prefix };

    let mut matches = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| StorageError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let candidate = if prefix.is_empty() {
            path.strip_prefix(".").unwrap_or(path)
        } else {
            path
        };
        if glob.matches(&candidate.to_string_lossy()) {
            matches.push(candidate.to_path_buf());
        }
    }
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single() {
        let one = ResolvedSources {
            sources: vec![ResolvedSource {
                href: "s3://b/tas.nc".to_string(),
                local_path: PathBuf::from("/tmp/0/tas.nc"),
            }],
            _scratch: None,
        };
        assert_eq!(one.single().and_then(|s| s.file_name()), Some("tas.nc"));

        let none = ResolvedSources {
            sources: Vec::new(),
            _scratch: None,
        };
        assert!(none.single().is_none());
    }
}
