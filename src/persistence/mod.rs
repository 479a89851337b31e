//! Campaign progress persistence
//!
//! Progress is a small JSON document stored under a single key in a
//! key-value backend: LocalStorage in the browser, memory elsewhere.

#[cfg(target_arch = "wasm32")]
pub mod local_storage;

#[cfg(target_arch = "wasm32")]
pub use local_storage::LocalStorageStore;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{FIRST_STAGE, MAX_STAGE};
use crate::sim::state::{MissionSummary, Outcome, Rank};

/// Storage key for campaign progress
pub const PROGRESS_KEY: &str = "ninja_stealth_progress";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend is unavailable")]
    Unavailable,
    #[error("failed to serialize progress: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Minimal string key-value backend
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-process store for native builds and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Best results for one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStats {
    pub completed: bool,
    pub best_rank: Rank,
    /// Lowest clear time in milliseconds
    pub best_time: u64,
    /// Detections of the best-ranked clear
    pub detections: u32,
}

/// Persisted campaign progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Progress {
    pub max_unlocked_stage: u8,
    pub stage_stats: BTreeMap<u8, StageStats>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            max_unlocked_stage: FIRST_STAGE,
            stage_stats: BTreeMap::new(),
        }
    }
}

impl Progress {
    /// Load progress, falling back to a fresh campaign when missing or unreadable
    pub fn load<S: KeyValueStore + ?Sized>(store: &S) -> Self {
        let json = match store.get(PROGRESS_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => {
                log::info!("No saved progress, starting fresh");
                return Self::default();
            }
            Err(e) => {
                log::warn!("Could not read progress: {}", e);
                return Self::default();
            }
        };

        match serde_json::from_str::<Progress>(&json) {
            Ok(mut progress) => {
                progress.max_unlocked_stage =
                    progress.max_unlocked_stage.clamp(FIRST_STAGE, MAX_STAGE);
                log::info!(
                    "Loaded progress: stage {} unlocked, {} stages cleared",
                    progress.max_unlocked_stage,
                    progress.stage_stats.len()
                );
                progress
            }
            Err(e) => {
                log::warn!("Saved progress is corrupt, starting fresh: {}", e);
                Self::default()
            }
        }
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), StoreError> {
        let json = serde_json::to_string(self)?;
        store.set(PROGRESS_KEY, &json)?;
        log::info!("Progress saved (stage {} unlocked)", self.max_unlocked_stage);
        Ok(())
    }

    pub fn is_unlocked(&self, stage: u8) -> bool {
        (FIRST_STAGE..=self.max_unlocked_stage).contains(&stage)
    }

    pub fn stats(&self, stage: u8) -> Option<&StageStats> {
        self.stage_stats.get(&stage)
    }

    /// Fold a cleared attempt into the stats and unlock the next stage.
    /// Returns true if a new stage was unlocked.
    pub fn record_clear(&mut self, summary: &MissionSummary) -> bool {
        if summary.outcome != Outcome::Cleared {
            return false;
        }

        let stage = summary.stage;
        self.stage_stats
            .entry(stage)
            .and_modify(|stats| {
                stats.completed = true;
                stats.best_time = stats.best_time.min(summary.elapsed_ms);
                if summary.rank < stats.best_rank {
                    stats.best_rank = summary.rank;
                    stats.detections = summary.detections;
                } else if summary.rank == stats.best_rank {
                    stats.detections = stats.detections.min(summary.detections);
                }
            })
            .or_insert(StageStats {
                completed: true,
                best_rank: summary.rank,
                best_time: summary.elapsed_ms,
                detections: summary.detections,
            });

        if stage >= self.max_unlocked_stage && stage < MAX_STAGE {
            self.max_unlocked_stage = stage + 1;
            log::info!("Stage {} unlocked", self.max_unlocked_stage);
            true
        } else {
            false
        }
    }
}
