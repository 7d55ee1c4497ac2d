//! Atomic artifact writes shared by checkpoints, metrics, experiment records and code exports.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Sibling path used while an artifact is being written (`codes_x.npy` -> `codes_x.npy.partial`).
fn partial_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Write `bytes` next to `path`, then rename over it.
///
/// Readers never observe a half-written artifact. Parent directories are created.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let partial = partial_path(path);
    std::fs::write(&partial, bytes)?;
    std::fs::rename(&partial, path)
}

/// Pretty-print `value` as JSON and write it atomically.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    atomic_write(path, &json)
}

/// Read a JSON artifact, returning `Ok(None)` when it has not been written yet.
pub fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_path_keeps_extension() {
        let p = partial_path(Path::new("/data/codes/codes_run.npy"));
        assert_eq!(p, PathBuf::from("/data/codes/codes_run.npy.partial"));
    }

    #[test]
    fn test_json_written_into_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("exp").join("logs").join("metrics.json");

        atomic_write_json(&path, &vec![1u64, 2, 3]).unwrap();
        let loaded: Option<Vec<u64>> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(vec![1, 2, 3]));
        assert!(!partial_path(&path).exists());
    }

    #[test]
    fn test_missing_json_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded: Option<Vec<u64>> = load_json(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_json_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, b"{not json").unwrap();
        let err = load_json::<Vec<u64>>(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
