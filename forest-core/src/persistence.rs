//! Local file persistence: atomic writes and optional JSON/YAML loads.
//!
//! Every pipeline artifact and every object written by the filesystem object
//! store goes through [`atomic_write`], so readers never observe a partially
//! written file.

use std::io;
use std::path::{Path, PathBuf};

/// Pretty-print `data` as JSON and write it with [`atomic_write`].
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(data).map_err(io::Error::other)?;
    atomic_write(path, json.as_bytes())
}

/// Render `data` as YAML and write it with [`atomic_write`].
pub fn atomic_write_yaml<T: serde::Serialize>(path: &Path, data: &T) -> io::Result<()> {
    let yaml = serde_yaml::to_string(data).map_err(io::Error::other)?;
    atomic_write(path, yaml.as_bytes())
}

/// Replace the contents of `path` with `data`.
///
/// The bytes land in `<file name>.tmp` next to the target first and are then
/// renamed over it. Missing parent directories are created.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_sibling(path);
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)
}

/// Deserialize a JSON file; `Ok(None)` when it does not exist.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    read_if_exists(path)?
        .map(|text| serde_json::from_str(&text).map_err(invalid_data))
        .transpose()
}

/// Deserialize a YAML file; `Ok(None)` when it does not exist.
pub fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    read_if_exists(path)?
        .map(|text| serde_yaml::from_str(&text).map_err(invalid_data))
        .transpose()
}

fn read_if_exists(path: &Path) -> io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn invalid_data<E>(e: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, e)
}

// `model.json` -> `model.json.tmp`, so siblings differing only by extension
// never share a temp file.
fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
