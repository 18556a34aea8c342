use crate::history::{ HistoryBlob, StoreError };
use std::sync::Mutex;

/// In-process history blob with the same optional byte cap as the file
/// backend. Backs the `memory` store type and the store tests.
pub struct MemoryBlob {
    slot: Mutex<Option<String>>,
    max_bytes: usize,
}

impl MemoryBlob {
    pub fn new(max_bytes: usize) -> Self {
        Self { slot: Mutex::new(None), max_bytes }
    }
}

impl HistoryBlob for MemoryBlob {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slot.lock().expect("history blob lock poisoned").clone())
    }

    fn store(&self, payload: &str) -> Result<(), StoreError> {
        if self.max_bytes > 0 && payload.len() > self.max_bytes {
            return Err(StoreError::QuotaExceeded);
        }
        *self.slot.lock().expect("history blob lock poisoned") = Some(payload.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot.lock().expect("history blob lock poisoned") = None;
        Ok(())
    }
}
