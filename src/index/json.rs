//! The published JSON index document.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::{IndexError, IndexResult, IndexStore, LineageIndex};

/// Stores the index at `path` and its fingerprint beside it, in
/// `<path>.fingerprint`.
#[derive(Debug, Clone)]
pub struct JsonIndexStore {
    path: PathBuf,
}

impl JsonIndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn fingerprint_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".fingerprint");
        PathBuf::from(name)
    }

    /// Read the document regardless of fingerprint.
    pub fn read(&self) -> IndexResult<LineageIndex> {
        let text = fs::read_to_string(&self.path).map_err(|e| IndexError::io(&self.path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Write `contents` to a sibling temporary file, then rename it over `path`.
fn write_atomic(path: &Path, contents: &str) -> IndexResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).map_err(|e| IndexError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| IndexError::io(path, e))
}

impl IndexStore for JsonIndexStore {
    fn load(&self, fingerprint: &str) -> IndexResult<Option<LineageIndex>> {
        let stored = match fs::read_to_string(self.fingerprint_path()) {
            Ok(stored) => stored,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IndexError::io(self.fingerprint_path(), e)),
        };
        if stored.trim() != fingerprint || !self.exists() {
            debug!(path = %self.path.display(), "index document is stale");
            return Ok(None);
        }
        self.read().map(Some)
    }

    fn save(&self, fingerprint: &str, index: &LineageIndex) -> IndexResult<()> {
        let mut json = index.to_json_pretty()?;
        json.push('\n');
        write_atomic(&self.path, &json)?;
        write_atomic(&self.fingerprint_path(), fingerprint)?;
        info!(path = %self.path.display(), tables = index.len(), "wrote traceability index");
        Ok(())
    }
}
