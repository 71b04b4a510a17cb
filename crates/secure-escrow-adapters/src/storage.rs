use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;

use secure_escrow_core::{PortError, StoragePort};

#[derive(Debug, Clone, Default)]
pub struct MemoryStorageAdapter {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl StoragePort for MemoryStorageAdapter {
    fn read(&self, key: &str) -> Result<Option<String>, PortError> {
        let g = self
            .inner
            .lock()
            .map_err(|e| PortError::Storage(format!("storage lock poisoned: {e}")))?;
        Ok(g.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PortError> {
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Storage(format!("storage lock poisoned: {e}")))?;
        g.insert(key.to_owned(), value.to_owned());
        Ok(())
    }
}

/// One JSON file per key under `root`, replaced atomically on every write.
#[derive(Debug, Clone)]
pub struct FileStorageAdapter {
    root: PathBuf,
}

impl FileStorageAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }
}

impl StoragePort for FileStorageAdapter {
    fn read(&self, key: &str) -> Result<Option<String>, PortError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(&path, e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), PortError> {
        fs::create_dir_all(&self.root).map_err(|e| storage_err(&self.root, e))?;
        let path = self.path_for(key);

        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| storage_err(&path, e))?;
        tmp.write_all(value.as_bytes())
            .map_err(|e| storage_err(&path, e))?;
        tmp.flush().map_err(|e| storage_err(&path, e))?;
        tmp.persist(&path).map_err(|e| storage_err(&path, e.error))?;
        Ok(())
    }
}

fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn storage_err(path: &Path, e: std::io::Error) -> PortError {
    PortError::Storage(format!("{}: {e}", path.display()))
}
