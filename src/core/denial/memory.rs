//! In-memory denial ledger for testing.

use super::{DenialLedger, DenialRecord};
use crate::error::StoreError;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::RwLock;

/// In-memory denial ledger
#[derive(Default)]
pub struct InMemoryDenialLedger {
    records: RwLock<HashMap<String, DenialRecord>>,
}

impl InMemoryDenialLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Corrupted {
            path: PathBuf::from("memory"),
        }
    }
}

impl DenialLedger for InMemoryDenialLedger {
    fn get_all_keys(&self) -> Result<HashSet<String>, StoreError> {
        let records = self.records.read().map_err(|_| Self::poisoned())?;
        Ok(records.keys().cloned().collect())
    }

    fn insert(&self, denials: &[DenialRecord]) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        for denial in denials {
            records
                .entry(denial.pair_key.clone())
                .or_insert_with(|| denial.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| Self::poisoned())?;
        records.clear();
        Ok(())
    }
}
