//! Mirror of the escrow list in durable storage.
//!
//! The whole list lives under a single key and is always rewritten in full.

use crate::domain::EscrowRecord;
use crate::ports::{PortError, StoragePort};

pub const ESCROWS_KEY: &str = "escrows";

#[derive(Debug, Clone)]
pub struct EscrowStore<S: StoragePort> {
    storage: S,
}

impl<S: StoragePort> EscrowStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Reads the persisted list. Missing or unreadable data is an empty registry.
    pub fn load(&self) -> Vec<EscrowRecord> {
        let raw = match self.storage.read(ESCROWS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "escrow storage unreadable, starting empty");
                return Vec::new();
            }
        };
        match decode_records(&raw) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(error = %e, "persisted escrows malformed, starting empty");
                Vec::new()
            }
        }
    }

    pub fn save(&self, records: &[EscrowRecord]) -> Result<(), PortError> {
        let encoded = encode_records(records)?;
        self.storage.write(ESCROWS_KEY, &encoded)?;
        tracing::debug!(count = records.len(), "persisted escrows");
        Ok(())
    }
}

pub fn encode_records(records: &[EscrowRecord]) -> Result<String, PortError> {
    serde_json::to_string(records)
        .map_err(|e| PortError::Storage(format!("escrow serialization failed: {e}")))
}

pub fn decode_records(raw: &str) -> Result<Vec<EscrowRecord>, PortError> {
    // The browser mirror wrote `null` for a never-initialized list.
    if raw.trim().is_empty() || raw.trim() == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw)
        .map_err(|e| PortError::Storage(format!("escrow deserialization failed: {e}")))
}
