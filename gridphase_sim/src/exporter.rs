//! JSON persistence for run artifacts and leaderboard categories.
//!
//! Run files (`<run_id>.json`) are written once and never rewritten.
//! Category files (`leaderboard_<category>.json`) are replaced wholesale on
//! save; a missing or unreadable category file loads as an empty category.

use gridphase_core::{
    AnomalyScoreSet, Event, LeaderboardEntry, Leaderboards, RunConfig, RunRecord, State,
};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::StoreError;

const RUN_PREFIX: &str = "run_";
const CATEGORY_PREFIX: &str = "leaderboard_";

/// Complete artifact of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunExport {
    pub run_id: String,
    pub config: RunConfig,
    pub scores: AnomalyScoreSet,

    /// Event table, ordered by step
    pub events: Vec<Event>,

    /// Every per-step state
    pub trajectory: Vec<State>,
}

/// Borrowed form of `RunExport` used when writing, so a run is serialised
/// without cloning its trajectory.
#[derive(Serialize)]
struct RunExportView<'a> {
    run_id: &'a str,
    config: &'a RunConfig,
    scores: &'a AnomalyScoreSet,
    events: &'a [Event],
    trajectory: &'a [State],
}

impl<'a> RunExportView<'a> {
    fn new(run_id: &'a str, record: &'a RunRecord, scores: &'a AnomalyScoreSet) -> Self {
        Self {
            run_id,
            config: &record.config,
            scores,
            events: &record.events,
            trajectory: &record.trajectory,
        }
    }
}

/// Directory-backed store.
#[derive(Debug, Clone)]
pub struct RunStore {
    dir: PathBuf,
}

impl RunStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn run_path(&self, run_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", run_id))
    }

    pub fn category_path(&self, category: &str) -> PathBuf {
        self.dir.join(format!("{}{}.json", CATEGORY_PREFIX, category))
    }

    /// Writes a completed run. Refuses to overwrite an existing run file.
    ///
    /// The artifact is staged in a temp file and renamed into place, so a
    /// run file is either complete or absent. Assumes one writer per store.
    pub fn write_run(
        &self,
        run_id: &str,
        record: &RunRecord,
        scores: &AnomalyScoreSet,
    ) -> Result<PathBuf, StoreError> {
        let path = self.run_path(run_id);
        if path.exists() {
            return Err(StoreError::already_stored(run_id));
        }

        let json = serde_json::to_string(&RunExportView::new(run_id, record, scores))?;
        self.write_atomic(&path, &json)?;

        debug!("Stored {} ({} bytes)", path.display(), json.len());
        Ok(path)
    }

    /// Reads a stored run back.
    pub fn read_run(&self, run_id: &str) -> Result<RunExport, StoreError> {
        let json = fs::read_to_string(self.run_path(run_id))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Ids of every stored run, ascending.
    pub fn stored_runs(&self) -> Result<Vec<String>, StoreError> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().into_owned();
            if let Some(run_id) = name.strip_suffix(".json") {
                if run_id.starts_with(RUN_PREFIX) {
                    runs.push(run_id.to_string());
                }
            }
        }
        runs.sort();
        Ok(runs)
    }

    /// Replaces a category file with `entries`.
    pub fn save_category(
        &self,
        category: &str,
        entries: &[LeaderboardEntry],
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(entries)?;
        self.write_atomic(&self.category_path(category), &json)
    }

    /// Writes `<path>.tmp`, syncs it, then renames it over `path`.
    fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Loads a category; missing or corrupt files yield an empty category.
    pub fn load_category(&self, category: &str) -> Vec<LeaderboardEntry> {
        let path = self.category_path(category);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read {}: {} - starting empty", path.display(), e);
                return Vec::new();
            }
        };

        serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("Corrupt category file {}: {} - starting empty", path.display(), e);
            Vec::new()
        })
    }

    /// Saves every category of `leaderboards`.
    pub fn save_all(&self, leaderboards: &Leaderboards) -> Result<(), StoreError> {
        for category in leaderboards.categories() {
            if let Some(board) = leaderboards.category(category) {
                self.save_category(category, board.entries())?;
            }
        }
        Ok(())
    }

    /// Restores every category `leaderboards` knows about from disk.
    pub fn load_all(&self, leaderboards: &mut Leaderboards) {
        let categories: Vec<String> = leaderboards.categories().map(str::to_string).collect();
        for category in categories {
            let entries = self.load_category(&category);
            if !entries.is_empty() {
                debug!("Restored {} entries into {}", entries.len(), category);
            }
            leaderboards.restore(&category, entries);
        }
    }

    /// Deletes stored runs no leaderboard references. Returns how many were
    /// removed. Must not run while a run is being written.
    pub fn retain(&self, leaderboards: &Leaderboards) -> Result<usize, StoreError> {
        let keep = leaderboards.referenced_runs();
        let mut removed = 0;
        for run_id in self.stored_runs()? {
            if !keep.contains(&run_id) {
                fs::remove_file(self.run_path(&run_id))?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("Retention removed {} run files", removed);
        }
        Ok(removed)
    }

    /// Next run counter after the highest id on disk or on any board.
    pub fn next_run_counter(&self, leaderboards: &Leaderboards) -> Result<u64, StoreError> {
        let highest = self
            .stored_runs()?
            .into_iter()
            .chain(leaderboards.referenced_runs())
            .filter_map(|run_id| run_id.strip_prefix(RUN_PREFIX)?.parse::<u64>().ok())
            .max();
        Ok(highest.map(|n| n + 1).unwrap_or(0))
    }
}
