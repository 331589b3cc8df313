//! In-memory run store. Used by the binary and by tests; nothing survives
//! a restart.

use std::sync::{Mutex, MutexGuard};
use chrono::Utc;

use super::{HighScore, RunRecord, RunStore, StorageError};

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: Mutex<Vec<RunRecord>>,
    high_score: Mutex<Option<HighScore>>,
}

impl MemoryRunStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of stored runs, oldest first.
    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs.lock().map(|runs| runs.clone()).unwrap_or_default()
    }

}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|_| StorageError::Unavailable("store lock poisoned".to_string()))
}

impl RunStore for MemoryRunStore {
    fn save_run_result(&self, record: RunRecord) -> Result<(), StorageError> {
        lock(&self.runs)?.push(record);
        Ok(())
    }

    fn load_high_score(&self) -> Result<Option<HighScore>, StorageError> {
        Ok(lock(&self.high_score)?.clone())
    }

    fn update_high_score(&self, score: u32, skin: &str) -> Result<bool, StorageError> {
        let mut slot = lock(&self.high_score)?;
        if slot.as_ref().is_some_and(|best| best.score >= score) {
            return Ok(false);
        }
        *slot = Some(HighScore {
            score,
            skin: skin.to_string(),
            achieved_at: Utc::now(),
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_score_only_improves() {
        let store = MemoryRunStore::new();
        assert_eq!(store.load_high_score().unwrap(), None);

        assert!(store.update_high_score(4, "a").unwrap());
        assert!(!store.update_high_score(4, "b").unwrap());
        assert!(!store.update_high_score(2, "c").unwrap());
        assert!(store.update_high_score(9, "d").unwrap());

        let best = store.load_high_score().unwrap().unwrap();
        assert_eq!((best.score, best.skin.as_str()), (9, "d"));
    }


    #[test]
    fn test_runs_kept_in_order() {
        let store = MemoryRunStore::new();
        for level in [3, 7] {
            store
                .save_run_result(RunRecord {
                    player_id: "p".to_string(),
                    mode: "speedrun".to_string(),
                    total_time_ms: 1_000,
                    split_times_ms: Vec::new(),
                    final_level: level,
                    recorded_at: Utc::now(),
                })
                .unwrap();
        }
        let levels: Vec<u32> = store.runs().iter().map(|r| r.final_level).collect();
        assert_eq!(levels, vec![3, 7]);
    }
}
