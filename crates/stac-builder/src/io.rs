//! Persisting records as JSON.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::StacResult;

/// File name used when a collection destination is a directory.
pub const COLLECTION_FILENAME: &str = "collection.json";

/// Serialise `value` as pretty JSON to `path`.
///
/// The document is written to a temporary file next to `path` and renamed
/// into place, so readers never see a partial record.
pub fn write_json<T: Serialize>(value: &T, path: &Path) -> StacResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".stac-")
        .suffix(".json.tmp")
        .tempfile_in(dir)?;
    temp.write_all(&bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    info!(path = %path.display(), size = bytes.len(), "Wrote STAC record");
    Ok(())
}

/// Read a record written by [`write_json`].
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StacResult<T> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Where a collection goes: `destination` itself when it names a `.json`
/// file, otherwise `destination/<output or collection.json>`.
pub fn collection_path(destination: &Path, output: Option<&str>) -> PathBuf {
    let is_json = destination
        .extension()
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    match output {
        Some(name) => destination.join(name),
        None if is_json => destination.to_path_buf(),
        None => destination.join(COLLECTION_FILENAME),
    }
}

/// Where an item goes: `destination/<output or <item id>.json>`.
pub fn item_path(destination: &Path, item_id: &str, output: Option<&str>) -> PathBuf {
    match output {
        Some(name) => destination.join(name),
        None => destination.join(format!("{}.json", item_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("a.json");

        write_json(&json!({"id": "a", "n": [1, 2]}), &path).unwrap();
        let back: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(back["id"], "a");

        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_destination_paths() {
        let dest = Path::new("/out");
        assert_eq!(collection_path(dest, None), Path::new("/out/collection.json"));
        assert_eq!(
            collection_path(Path::new("/out/ukcp18.json"), None),
            Path::new("/out/ukcp18.json")
        );
        assert_eq!(collection_path(dest, Some("c.json")), Path::new("/out/c.json"));
        assert_eq!(item_path(dest, "ukcp18-x", None), Path::new("/out/ukcp18-x.json"));
    }
}
