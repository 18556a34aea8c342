use crate::history::{ HistoryBlob, StoreError };
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// History blob backed by a single JSON file. Writes go through a temp
/// file plus rename so a crash never leaves a half-written history behind.
pub struct FileBlob {
    path: PathBuf,
    max_bytes: usize,
}

impl FileBlob {
    /// `max_bytes` caps the payload size; 0 means unlimited.
    pub fn new(path: PathBuf, max_bytes: usize) -> Self {
        Self { path, max_bytes }
    }
}

impl HistoryBlob for FileBlob {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn store(&self, payload: &str) -> Result<(), StoreError> {
        if self.max_bytes > 0 && payload.len() > self.max_bytes {
            return Err(StoreError::QuotaExceeded);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, payload)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
