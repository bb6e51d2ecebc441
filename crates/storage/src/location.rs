//! Parsing of source locations given on the command line.

use std::fmt;
use std::path::PathBuf;

use crate::error::{StorageError, StorageResult};
use crate::glob::GlobPattern;

/// Where granules live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// A local path or glob
    Local(PathBuf),
    /// `s3://bucket/key`
    S3 { bucket: String, key: String },
    /// `az://container/key` (also `abfs://`)
    Azure { container: String, key: String },
    /// `http(s)://host/path`
    Http { url: String },
}

impl SourceLocation {
    pub fn parse(s: &str) -> StorageResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(StorageError::InvalidLocation(s.to_string()));
        }

        let Some((scheme, rest)) = trimmed.split_once("://") else {
            return Ok(SourceLocation::Local(PathBuf::from(trimmed)));
        };

        match scheme.to_lowercase().as_str() {
            "file" => Ok(SourceLocation::Local(PathBuf::from(rest))),
            "s3" => {
                let (bucket, key) = split_container(rest, s)?;
                Ok(SourceLocation::S3 { bucket, key })
            }
            "az" | "abfs" | "abfss" => {
                // abfs://container@account.dfs.core.windows.net/key
                let (container, key) = split_container(rest, s)?;
                let container = container
                    .split_once('@')
                    .map(|(c, _)| c.to_string())
                    .unwrap_or(container);
                Ok(SourceLocation::Azure { container, key })
            }
            "http" | "https" => Ok(SourceLocation::Http {
                url: trimmed.to_string(),
            }),
            _ => Err(StorageError::InvalidLocation(s.to_string())),
        }
    }

    /// Path or key, the part a glob applies to.
    pub fn path(&self) -> String {
        match self {
            SourceLocation::Local(p) => p.to_string_lossy().into_owned(),
            SourceLocation::S3 { key, .. } | SourceLocation::Azure { key, .. } => key.clone(),
            SourceLocation::Http { url } => url.clone(),
        }
    }

    /// HTTP locations are never globs: `?` starts a query string there and
    /// plain HTTP has no listing.
    pub fn is_glob(&self) -> bool {
        match self {
            SourceLocation::Http { .. } => false,
            _ => GlobPattern::is_glob(&self.path()),
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, SourceLocation::Local(_))
    }

    /// Same location with its path or key replaced, for expanding globs.
    pub fn with_path(&self, path: &str) -> SourceLocation {
        match self {
            SourceLocation::Local(_) => SourceLocation::Local(PathBuf::from(path)),
            SourceLocation::S3 { bucket, .. } => SourceLocation::S3 {
                bucket: bucket.clone(),
                key: path.to_string(),
            },
            SourceLocation::Azure { container, .. } => SourceLocation::Azure {
                container: container.clone(),
                key: path.to_string(),
            },
            SourceLocation::Http { .. } => SourceLocation::Http {
                url: path.to_string(),
            },
        }
    }

    /// File name of the last path segment.
    pub fn file_name(&self) -> Option<String> {
        let path = self.path();
        let name = path.trim_end_matches('/').rsplit('/').next()?;
        let name = name.split(['?', '#']).next()?;
        (!name.is_empty()).then(|| name.to_string())
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::Local(p) => write!(f, "{}", p.display()),
            SourceLocation::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            SourceLocation::Azure { container, key } => write!(f, "az://{}/{}", container, key),
            SourceLocation::Http { url } => write!(f, "{}", url),
        }
    }
}

impl std::str::FromStr for SourceLocation {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceLocation::parse(s)
    }
}

fn split_container(rest: &str, original: &str) -> StorageResult<(String, String)> {
    let (container, key) = rest.split_once('/').unwrap_or((rest, ""));
    if container.is_empty() {
        return Err(StorageError::InvalidLocation(original.to_string()));
    }
    Ok((container.to_string(), key.to_string()))
}
