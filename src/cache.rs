use crate::error::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Simple file-based cache for API responses.
///
/// Entries are JSON files named by the SHA-256 of the request's cache key and expire
/// `expire` after they were written.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    expire: Duration,
}

impl FileCache {
    pub fn new<P: AsRef<Path>>(dir: P, expire: Duration) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| Error::Cache(format!("create {}: {e}", dir.display())))?;
        Ok(Self { dir, expire })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        self.dir.join(format!("{hex}.json"))
    }

    /// Cached value for `key`, or `None` if absent or expired (expired entries are removed).
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.entry_path(key);
        let meta = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Cache(format!("stat {}: {e}", path.display()))),
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .unwrap_or_default();
        if age >= self.expire {
            log::debug!("cache entry expired: {key}");
            fs::remove_file(&path).ok();
            return Ok(None);
        }
        let bytes = fs::read(&path)
            .map_err(|e| Error::Cache(format!("read {}: {e}", path.display())))?;
        let value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Cache(format!("decode {}: {e}", path.display())))?;
        log::debug!("cache hit: {key}");
        Ok(Some(value))
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.entry_path(key);
        let bytes = serde_json::to_vec(value)
            .map_err(|e| Error::Cache(format!("encode {key}: {e}")))?;
        fs::write(&path, bytes)
            .map_err(|e| Error::Cache(format!("write {}: {e}", path.display())))
    }

    /// Remove every cached entry.
    pub fn clear(&self) -> Result<()> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| Error::Cache(format!("list {}: {e}", self.dir.display())))?;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)
                    .map_err(|e| Error::Cache(format!("remove {}: {e}", path.display())))?;
            }
        }
        Ok(())
    }
}
