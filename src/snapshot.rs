//! Best-effort JSON snapshot per table
//!
//! Written after every state mutation and read once at startup. A failed
//! write is logged and skipped, never retried inline.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::pattern::Outcome;
use crate::signal::{DayTally, SignalMachine};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub table: String,
    pub silent_streak: u32,
    pub gate: String,
    pub remaining_budget: u8,
    pub candidates: Vec<Outcome>,
    pub tally: DayTally,
    pub rounds_today: u32,
    pub timestamp: i64,
}

impl TableSnapshot {
    pub fn capture(table: &str, machine: &SignalMachine, candidates: &[Outcome]) -> Self {
        Self {
            table: table.to_string(),
            silent_streak: machine.silent_streak(),
            gate: machine.gate_label().to_string(),
            remaining_budget: machine.remaining_budget(),
            candidates: candidates.to_vec(),
            tally: machine.tally(),
            rounds_today: machine.rounds_today(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// One JSON file per table under a fixed directory.
pub struct SnapshotSink {
    dir: PathBuf,
}

impl SnapshotSink {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Create the snapshot directory if missing.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    fn path_for(&self, table: &str) -> PathBuf {
        let safe: String = table
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    pub fn save(&self, snapshot: &TableSnapshot) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(self.path_for(&snapshot.table), json)?;
        log::debug!("Saved snapshot for table {}", snapshot.table);
        Ok(())
    }

    pub fn load(&self, table: &str) -> Result<Option<TableSnapshot>, Box<dyn std::error::Error>> {
        let path = self.path_for(table);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}
