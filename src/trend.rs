//! Trend analysis and candidate selection
//!
//! `analyze` scans the rolling history and scores, for every outcome value,
//! how often its appearance was adjacent to a pattern member within the
//! lookback window. `select` filters and ranks those scores into the set of
//! qualifying candidate numbers for the current cycle.

use crate::pattern::{Outcome, Pattern, DOMAIN_SIZE};

/// Window of neighbouring outcomes inspected for each scored occurrence.
pub const LOOKBACK: usize = 3;

/// Per-outcome trend counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutcomeStats {
    /// Occurrences where the lookback window held a pattern member.
    pub preceded: u32,
    /// Total scored occurrences of the value.
    pub total: u32,
    /// `preceded / total`, 0.0 when never observed.
    pub score: f64,
}

/// Trend counters for the whole outcome domain.
#[derive(Debug, Clone)]
pub struct TrendStats {
    entries: [OutcomeStats; DOMAIN_SIZE],
}

impl Default for TrendStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TrendStats {
    pub fn new() -> Self {
        Self {
            entries: [OutcomeStats::default(); DOMAIN_SIZE],
        }
    }

    pub(crate) fn record(&mut self, outcome: Outcome, preceded: bool) {
        let entry = &mut self.entries[outcome as usize];
        entry.total += 1;
        if preceded {
            entry.preceded += 1;
        }
    }

    pub(crate) fn finalize(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.score = if entry.total > 0 {
                f64::from(entry.preceded) / f64::from(entry.total)
            } else {
                0.0
            };
        }
    }

    pub fn get(&self, outcome: Outcome) -> OutcomeStats {
        self.entries[outcome as usize]
    }
}

/// Score every outcome value in `history` (newest-first).
///
/// For each index `i >= LOOKBACK`, the value at `i` is counted once, and
/// counted as preceded when any of the `LOOKBACK` entries at `[i-L, i)`
/// (scanned nearest-first) belongs to the pattern. Pure and deterministic;
/// recomputed from scratch every cycle because the upstream feed may
/// reorder between fetches.
pub fn analyze(history: &[Outcome], pattern: &Pattern) -> TrendStats {
    let mut stats = TrendStats::new();

    for i in LOOKBACK..history.len() {
        let outcome = history[i];
        if (outcome as usize) >= DOMAIN_SIZE {
            continue;
        }
        let preceded = history[i - LOOKBACK..i]
            .iter()
            .rev()
            .any(|&w| pattern.contains(w));
        stats.record(outcome, preceded);
    }

    stats.finalize();
    stats
}

/// Filter to values with enough occurrences and a qualifying score, rank
/// descending by score (ties keep ascending value order for determinism),
/// cap to `top_k`.
pub fn select(stats: &TrendStats, min_occurrences: u32, min_score: f64, top_k: usize) -> Vec<Outcome> {
    let mut qualified: Vec<(Outcome, f64)> = (0..DOMAIN_SIZE as u8)
        .map(|v| (v, stats.get(v)))
        .filter(|(_, s)| s.total >= min_occurrences && s.score >= min_score)
        .map(|(v, s)| (v, s.score))
        .collect();

    qualified.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    qualified.truncate(top_k);
    qualified.into_iter().map(|(v, _)| v).collect()
}
