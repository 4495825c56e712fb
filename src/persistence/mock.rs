//! In-memory match store for tests and store-less deployments.

use super::{FinalMatchRecord, MatchStore, StoreError};
use crate::domain::MatchId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureMode {
    None,
    FirstN,
    Always,
    Permanent,
}

/// Keeps records in a map keyed by match id. Can be scripted to fail.
#[derive(Debug)]
pub struct MockMatchStore {
    records: Mutex<HashMap<MatchId, FinalMatchRecord>>,
    calls: AtomicU32,
    remaining_failures: AtomicU32,
    mode: FailureMode,
}

impl MockMatchStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            calls: AtomicU32::new(0),
            remaining_failures: AtomicU32::new(0),
            mode: FailureMode::None,
        }
    }

    /// Fail the first `n` upserts with a transient error.
    pub fn failing_first(mut self, n: u32) -> Self {
        self.mode = FailureMode::FirstN;
        self.remaining_failures = AtomicU32::new(n);
        self
    }

    /// Fail every upsert with a transient error.
    pub fn always_failing(mut self) -> Self {
        self.mode = FailureMode::Always;
        self
    }

    /// Fail every upsert with a permanent error.
    pub fn permanently_failing(mut self) -> Self {
        self.mode = FailureMode::Permanent;
        self
    }

    /// Upserts attempted so far, failed ones included.
    pub fn upsert_calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn get(&self, match_id: MatchId) -> Option<FinalMatchRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&match_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MockMatchStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MatchStore for MockMatchStore {
    async fn upsert_match_result(&self, record: &FinalMatchRecord) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            FailureMode::Always => {
                return Err(StoreError::Transient("store unavailable".to_string()))
            }
            FailureMode::Permanent => {
                return Err(StoreError::Permanent("record rejected".to_string()))
            }
            FailureMode::FirstN => {
                let failed = self
                    .remaining_failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if failed {
                    return Err(StoreError::Transient("store unavailable".to_string()));
                }
            }
            FailureMode::None => {}
        }
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(record.match_id, record.clone());
        Ok(())
    }
}
