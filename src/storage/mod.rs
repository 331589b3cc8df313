//! Run Persistence
//!
//! The engine never waits on storage. Jobs go through an unbounded channel
//! to a worker task, which runs each store call on the blocking pool and
//! logs failures.

pub mod memory;

pub use memory::MemoryRunStore;

use std::sync::Arc;
use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::game::player::PlayerId;
use crate::game::session::RunSummary;

// =============================================================================
// RECORDS
// =============================================================================

/// One player's finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Player UUID
    pub player_id: String,
    /// Mode id
    pub mode: String,
    /// Whole run in milliseconds
    pub total_time_ms: u64,
    /// Per-level times in milliseconds
    pub split_times_ms: Vec<u64>,
    /// Last level completed
    pub final_level: u32,
    /// When the run was stored
    pub recorded_at: DateTime<Utc>,
}

impl RunRecord {
    /// Record for one player of a finished run.
    pub fn from_summary(summary: &RunSummary, player: PlayerId) -> Self {
        Self {
            player_id: player.to_uuid_string(),
            mode: summary.mode_id.clone(),
            total_time_ms: millis(summary.total_time),
            split_times_ms: summary.splits.iter().copied().map(millis).collect(),
            final_level: summary.final_level,
            recorded_at: Utc::now(),
        }
    }
}

/// Best lobby level reached on this server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighScore {
    /// Level reached
    pub score: u32,
    /// Skin of the player who reached it
    pub skin: String,
    /// When it was set
    pub achieved_at: DateTime<Utc>,
}

/// Duration in whole milliseconds.
pub fn millis(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Backend unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence collaborator. Calls may block; they run off the engine task.
pub trait RunStore: Send + Sync + 'static {
    /// Append a finished run.
    fn save_run_result(&self, record: RunRecord) -> Result<(), StorageError>;

    /// Current high score, if any.
    fn load_high_score(&self) -> Result<Option<HighScore>, StorageError>;

    /// Replace the high score if `score` beats it. Returns whether it did.
    fn update_high_score(&self, score: u32, skin: &str) -> Result<bool, StorageError>;
}

// =============================================================================
// WORKER
// =============================================================================

/// A queued store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistJob {
    /// Save a run record
    SaveRun(RunRecord),
    /// Offer a new high score
    UpdateHighScore {
        /// Level reached
        score: u32,
        /// Player skin
        skin: String,
    },
}

impl PersistJob {
    fn apply(self, store: &dyn RunStore) -> Result<(), StorageError> {
        match self {
            PersistJob::SaveRun(record) => store.save_run_result(record),
            PersistJob::UpdateHighScore { score, skin } => {
                if store.update_high_score(score, &skin)? {
                    info!(score, %skin, "New high score stored");
                }
                Ok(())
            }
        }
    }
}

/// Fire-and-forget sender for store calls.
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: mpsc::UnboundedSender<PersistJob>,
}

impl PersistenceHandle {
    /// Spawn the worker on the current runtime.
    ///
    /// The worker exits once every handle has been dropped.
    pub fn spawn(store: Arc<dyn RunStore>) -> (Self, JoinHandle<()>) {
        let (handle, rx) = Self::channel();
        let join = tokio::spawn(run_worker(store, rx));
        (handle, join)
    }

    /// Handle plus the raw job receiver, without a worker.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PersistJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a run record.
    pub fn save_run(&self, record: RunRecord) {
        self.submit(PersistJob::SaveRun(record));
    }

    /// Queue a high-score offer.
    pub fn update_high_score(&self, score: u32, skin: impl Into<String>) {
        self.submit(PersistJob::UpdateHighScore { score, skin: skin.into() });
    }

    fn submit(&self, job: PersistJob) {
        if self.tx.send(job).is_err() {
            warn!("Persistence worker stopped, dropping job");
        }
    }
}

async fn run_worker(store: Arc<dyn RunStore>, mut rx: mpsc::UnboundedReceiver<PersistJob>) {
    debug!("Persistence worker started");
    while let Some(job) = rx.recv().await {
        let store = Arc::clone(&store);
        match tokio::task::spawn_blocking(move || job.apply(store.as_ref())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Persistence call failed"),
            Err(e) => error!(error = %e, "Persistence task panicked"),
        }
    }
    debug!("Persistence worker stopped");
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::mode::SessionKind;
    use crate::game::session::SessionId;

    struct BrokenStore;

    impl RunStore for BrokenStore {
        fn save_run_result(&self, _record: RunRecord) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk on fire".into()))
        }

        fn load_high_score(&self) -> Result<Option<HighScore>, StorageError> {
            Err(StorageError::Unavailable("disk on fire".into()))
        }

        fn update_high_score(&self, _score: u32, _skin: &str) -> Result<bool, StorageError> {
            Err(StorageError::Unavailable("disk on fire".into()))
        }
    }

    fn summary() -> RunSummary {
        RunSummary {
            session_id: SessionId([1; 16]),
            mode_id: "speedrun".into(),
            kind: SessionKind::Solo,
            players: vec![PlayerId::new([2; 16])],
            final_level: 3,
            total_time: Duration::from_millis(4_500),
            splits: vec![
                Duration::from_millis(1_000),
                Duration::from_millis(1_500),
                Duration::from_millis(2_000),
            ],
        }
    }

    #[test]
    fn test_record_from_summary() {
        let record = RunRecord::from_summary(&summary(), PlayerId::new([2; 16]));
        assert_eq!(record.total_time_ms, 4_500);
        assert_eq!(record.split_times_ms, vec![1_000, 1_500, 2_000]);
        assert_eq!(record.final_level, 3);
        assert_eq!(record.mode, "speedrun");
    }

    #[test]
    fn test_record_json_shape() {
        let record = RunRecord::from_summary(&summary(), PlayerId::new([2; 16]));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["totalTimeMs"], 4_500);
        assert_eq!(json["splitTimesMs"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_worker_applies_jobs() {
        let store = Arc::new(MemoryRunStore::new());
        let (handle, join) = PersistenceHandle::spawn(store.clone());

        handle.save_run(RunRecord::from_summary(&summary(), PlayerId::new([2; 16])));
        handle.update_high_score(7, "neon");
        handle.update_high_score(5, "plain");
        drop(handle);
        join.await.unwrap();

        assert_eq!(store.runs().len(), 1);
        let best = store.load_high_score().unwrap().unwrap();
        assert_eq!(best.score, 7);
        assert_eq!(best.skin, "neon");
    }

    #[tokio::test]
    async fn test_worker_survives_store_failures() {
        let (handle, join) = PersistenceHandle::spawn(Arc::new(BrokenStore));
        handle.save_run(RunRecord::from_summary(&summary(), PlayerId::new([2; 16])));
        handle.update_high_score(1, "x");
        drop(handle);
        join.await.unwrap();
    }

    #[test]
    fn test_send_after_worker_gone_is_harmless() {
        let (handle, rx) = PersistenceHandle::channel();
        drop(rx);
        handle.update_high_score(3, "x");
    }
}
