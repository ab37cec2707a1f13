//! Per-table monitor tasks and supervision
//!
//! One task per table, sharing nothing but the outcome source, the
//! notifier and the snapshot sink. Each cycle pulls the fresh outcome
//! list, replaces the rolling history, recomputes trends and drives the
//! signal machine with the newest outcome. A fetch error is contained to
//! its table and retried after backoff; a crashed monitor is restarted by
//! its supervisor without disturbing the other tables.

use chrono::{Local, NaiveDate};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::backoff::Backoff;
use crate::config::Config;
use crate::history::History;
use crate::notify::Notifier;
use crate::pattern::{Outcome, Pattern};
use crate::signal::{SignalEvent, SignalMachine, SignalParams};
use crate::snapshot::{SnapshotSink, TableSnapshot};
use crate::source::{FetchError, OutcomeSource};
use crate::trend::{analyze, select, TrendStats};

/// Per-table slice of the configuration.
#[derive(Clone)]
pub struct MonitorParams {
    pub pattern: Pattern,
    pub table_link: Option<String>,
    pub history_capacity: usize,
    pub min_rounds: usize,
    pub min_occurrences: u32,
    pub min_score: f64,
    pub top_k: usize,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub max_backoff: Duration,
    pub signal: SignalParams,
}

impl From<&Config> for MonitorParams {
    fn from(config: &Config) -> Self {
        Self {
            pattern: config.pattern.clone(),
            table_link: config.table_link.clone(),
            history_capacity: config.history_capacity,
            min_rounds: config.min_rounds,
            min_occurrences: config.min_occurrences,
            min_score: config.min_score,
            top_k: config.top_k,
            poll_interval: config.poll_interval,
            error_backoff: config.error_backoff,
            max_backoff: config.max_backoff,
            signal: config.signal.clone(),
        }
    }
}

/// Owns all mutable state for one monitored table.
pub struct TableMonitor {
    table: String,
    params: MonitorParams,
    source: Arc<dyn OutcomeSource>,
    notifier: Arc<dyn Notifier>,
    snapshots: Arc<SnapshotSink>,
    history: History,
    machine: SignalMachine,
    stats: TrendStats,
    candidates: Vec<Outcome>,
}

impl TableMonitor {
    pub fn new(
        table: String,
        params: MonitorParams,
        source: Arc<dyn OutcomeSource>,
        notifier: Arc<dyn Notifier>,
        snapshots: Arc<SnapshotSink>,
        today: NaiveDate,
    ) -> Self {
        let history = History::new(params.history_capacity);
        let machine = SignalMachine::new(params.signal.clone(), today);
        Self {
            table,
            params,
            source,
            notifier,
            snapshots,
            history,
            machine,
            stats: TrendStats::new(),
            candidates: Vec::new(),
        }
    }

    /// Poll loop for one table. Never returns; fetch errors back off and
    /// retry indefinitely without touching state.
    pub async fn run(&mut self) {
        log::info!("🎯 Monitoring table: {}", self.table);

        match self.snapshots.load(&self.table) {
            Ok(Some(snapshot)) => log::info!(
                "Previous snapshot for {}: gate={} streak={} wins={} losses={}",
                self.table,
                snapshot.gate,
                snapshot.silent_streak,
                snapshot.tally.wins,
                snapshot.tally.losses
            ),
            Ok(None) => {}
            Err(e) => log::warn!("Could not read snapshot for {}: {}", self.table, e),
        }

        let mut backoff = Backoff::new(self.params.error_backoff, self.params.max_backoff);
        loop {
            match self.cycle(Local::now().date_naive()).await {
                Ok(()) => {
                    backoff.reset();
                    sleep(self.params.poll_interval).await;
                }
                Err(e) => {
                    log::warn!("❌ Fetch failed for {}: {}", self.table, e);
                    backoff.wait().await;
                }
            }
        }
    }

    async fn cycle(&mut self, today: NaiveDate) -> Result<(), FetchError> {
        if self.machine.roll_day(today) {
            log::info!("📅 New day for {}: counters and gate reset", self.table);
        }

        let results = self.source.fetch(&self.table).await?;
        if results.is_empty() {
            log::debug!("No results for {} this cycle", self.table);
            return Ok(());
        }

        self.history.replace(&results);
        self.machine.note_round();

        if self.history.len() < self.params.min_rounds {
            log::debug!(
                "Warming up {}: {}/{} rounds",
                self.table,
                self.history.len(),
                self.params.min_rounds
            );
            return Ok(());
        }

        self.stats = analyze(self.history.as_slice(), &self.params.pattern);
        self.candidates = select(
            &self.stats,
            self.params.min_occurrences,
            self.params.min_score,
            self.params.top_k,
        );

        let newest = match self.history.latest() {
            Some(n) => n,
            None => return Ok(()),
        };

        let events = self.machine.process(
            newest,
            &self.candidates,
            &self.stats,
            &self.params.pattern,
        );

        for event in &events {
            self.log_event(event);
            if event.is_external() {
                let (text, with_link) = format_event(&self.table, event, self.history.as_slice());
                let link = if with_link {
                    self.params.table_link.as_deref()
                } else {
                    None
                };
                self.notifier.notify(&text, link).await;
            }
        }

        let snapshot = TableSnapshot::capture(&self.table, &self.machine, &self.candidates);
        if let Err(e) = self.snapshots.save(&snapshot) {
            log::warn!("Snapshot write failed for {} (skipped): {}", self.table, e);
        }

        Ok(())
    }

    fn log_event(&self, event: &SignalEvent) {
        match event {
            SignalEvent::EntryOpened { target, real, .. } => {
                let kind = if *real { "REAL" } else { "silent" };
                log::info!("[{}] {} entry on {}", self.table, kind, target);
            }
            SignalEvent::Escalated { stage, outcome, .. } => {
                log::info!("[{}] gale {} after {}", self.table, stage, outcome);
            }
            SignalEvent::Success { outcome, stage, real } => {
                let kind = if *real { "REAL" } else { "silent" };
                log::info!(
                    "[{}] {} win on {} (stage {}), streak {}",
                    self.table,
                    kind,
                    outcome,
                    stage,
                    self.machine.silent_streak()
                );
            }
            SignalEvent::Failure { outcome, real } => {
                let kind = if *real { "REAL" } else { "silent" };
                log::info!("[{}] {} loss on {}", self.table, kind, outcome);
            }
            SignalEvent::GateOpened { streak } => {
                log::info!("[{}] gate OPEN after {} consecutive wins", self.table, streak);
            }
        }
    }
}

/// Render an externally visible event as a notification message. The bool
/// asks for the table link to be attached.
pub fn format_event(table: &str, event: &SignalEvent, history: &[Outcome]) -> (String, bool) {
    match event {
        SignalEvent::EntryOpened { target, preceded, total, .. } => (
            format!("🔥 ENTRY {} ({}/{}) on {}", target, preceded, total, table),
            true,
        ),
        SignalEvent::Escalated { stage: 1, outcome, .. } => {
            (format!("🔁 First gale ({})", outcome), false)
        }
        SignalEvent::Escalated { outcome, .. } => {
            (format!("🔁 Second and final gale ({})", outcome), false)
        }
        SignalEvent::Success { .. } => (
            format!("✅✅✅ WIN ✅✅✅\n\n({})", last_three(history)),
            false,
        ),
        SignalEvent::Failure { .. } => (
            format!("❌❌❌ LOSS ❌❌❌\n\n({})", last_three(history)),
            false,
        ),
        SignalEvent::GateOpened { streak } => (
            format!("🚨 {} consecutive wins on {}, signals armed 🚨", streak, table),
            true,
        ),
    }
}

fn last_three(history: &[Outcome]) -> String {
    history
        .iter()
        .take(3)
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

/// Run one table under a restart supervisor. A monitor that exits or
/// panics is rebuilt from scratch after backoff; state is recovered from
/// upstream history on the next warm-up.
pub async fn supervise(
    table: String,
    params: MonitorParams,
    source: Arc<dyn OutcomeSource>,
    notifier: Arc<dyn Notifier>,
    snapshots: Arc<SnapshotSink>,
) {
    let mut backoff = Backoff::new(params.error_backoff, params.max_backoff);
    loop {
        let mut monitor = TableMonitor::new(
            table.clone(),
            params.clone(),
            source.clone(),
            notifier.clone(),
            snapshots.clone(),
            Local::now().date_naive(),
        );
        let handle = tokio::spawn(async move { monitor.run().await });

        match handle.await {
            Ok(()) => log::warn!("Monitor for {} exited unexpectedly", table),
            Err(e) => log::error!("💥 Monitor for {} crashed: {}", table, e),
        }
        backoff.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::GROUP_12;
    use crate::signal::DayBudgetPolicy;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Source that replays a fixed script of fetch responses.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Vec<Outcome>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Vec<Outcome>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl OutcomeSource for ScriptedSource {
        async fn fetch(&self, _table: &str) -> Result<Vec<Outcome>, FetchError> {
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
        }
    }

    struct CollectingNotifier {
        messages: Mutex<Vec<(String, Option<String>)>>,
    }

    impl CollectingNotifier {
        fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }

        fn messages(&self) -> Vec<(String, Option<String>)> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for CollectingNotifier {
        async fn notify(&self, text: &str, link: Option<&str>) {
            self.messages
                .lock()
                .unwrap()
                .push((text.to_string(), link.map(str::to_string)));
        }
    }

    /// 50 outcomes in blocks of [f, f, f, 2, 5]: candidate 5 scores 1.0,
    /// distinct fillers never qualify.
    fn base_history() -> Vec<Outcome> {
        let fillers: Vec<Outcome> = (0..37u8)
            .filter(|v| !GROUP_12.contains(v) && *v != 5)
            .collect();
        let mut history = Vec::new();
        let mut f = fillers.iter().cycle();
        for _ in 0..10 {
            history.push(*f.next().unwrap());
            history.push(*f.next().unwrap());
            history.push(*f.next().unwrap());
            history.push(2);
            history.push(5);
        }
        history
    }

    fn prepend(history: &[Outcome], newest: &[Outcome]) -> Vec<Outcome> {
        let mut out = newest.to_vec();
        out.extend_from_slice(history);
        out
    }

    fn params(signal: SignalParams) -> MonitorParams {
        MonitorParams {
            pattern: Pattern::new("group12", &GROUP_12),
            table_link: Some("https://example.com/table".to_string()),
            history_capacity: 100,
            min_rounds: 50,
            min_occurrences: 5,
            min_score: 0.8,
            top_k: 10,
            poll_interval: Duration::from_millis(1),
            error_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            signal,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn monitor_with(
        responses: Vec<Vec<Outcome>>,
        signal: SignalParams,
        dir: &std::path::Path,
    ) -> (TableMonitor, Arc<CollectingNotifier>) {
        let notifier = Arc::new(CollectingNotifier::new());
        let sink = Arc::new(SnapshotSink::new(dir));
        sink.ensure_dir().unwrap();
        let monitor = TableMonitor::new(
            "Test Table".to_string(),
            params(signal),
            Arc::new(ScriptedSource::new(responses)),
            notifier.clone(),
            sink,
            today(),
        );
        (monitor, notifier)
    }

    #[tokio::test]
    async fn test_empty_fetch_is_a_skipped_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let (mut monitor, notifier) = monitor_with(vec![vec![]], SignalParams::default(), dir.path());

        monitor.cycle(today()).await.unwrap();

        assert!(monitor.history.is_empty());
        assert_eq!(monitor.machine.rounds_today(), 0);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_below_min_rounds_suspends_state_machine() {
        let dir = tempfile::tempdir().unwrap();
        // Newest outcome would be a candidate if analysis ran.
        let (mut monitor, notifier) =
            monitor_with(vec![vec![5, 2, 5, 2]], SignalParams::default(), dir.path());

        monitor.cycle(today()).await.unwrap();

        assert_eq!(monitor.history.len(), 4);
        assert_eq!(monitor.machine.rounds_today(), 1);
        assert!(monitor.candidates.is_empty());
        assert_eq!(monitor.machine.entry(), crate::signal::Entry::Idle);
        assert!(notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_silent_entry_produces_no_notification_but_persists() {
        let dir = tempfile::tempdir().unwrap();
        let base = base_history();
        let with_candidate_newest = prepend(&base, &[5]);
        let (mut monitor, notifier) = monitor_with(
            vec![with_candidate_newest],
            SignalParams::default(),
            dir.path(),
        );

        monitor.cycle(today()).await.unwrap();

        assert_eq!(monitor.candidates, vec![5]);
        assert_eq!(
            monitor.machine.entry(),
            crate::signal::Entry::Open { target: 5, stage: 0 }
        );
        assert!(notifier.messages().is_empty());

        let saved = monitor.snapshots.load("Test Table").unwrap().unwrap();
        assert_eq!(saved.candidates, vec![5]);
        assert_eq!(saved.gate, "closed");
    }

    #[tokio::test]
    async fn test_duplicate_newest_outcome_across_cycles_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let base = base_history();
        let with_candidate_newest = prepend(&base, &[5]);
        let (mut monitor, _notifier) = monitor_with(
            vec![with_candidate_newest.clone(), with_candidate_newest],
            SignalParams::default(),
            dir.path(),
        );

        monitor.cycle(today()).await.unwrap();
        monitor.cycle(today()).await.unwrap();

        // Still stage 0: the repeated spin did not escalate anything.
        assert_eq!(
            monitor.machine.entry(),
            crate::signal::Entry::Open { target: 5, stage: 0 }
        );
        assert_eq!(monitor.machine.rounds_today(), 2);
    }

    #[tokio::test]
    async fn test_gate_open_and_real_entry_notify() {
        let dir = tempfile::tempdir().unwrap();
        // One silent win is enough to open the gate in this deployment.
        let signal = SignalParams {
            streak_to_open: 1,
            ..SignalParams::default()
        };

        let base = base_history();
        let h1 = prepend(&base, &[5]); // silent entry on 5
        let h2 = prepend(&base, &[2, 5]); // pattern hit: win, gate opens
        let h3 = prepend(&base, &[5, 2, 5]); // real entry on 5
        let (mut monitor, notifier) = monitor_with(vec![h1, h2, h3], signal, dir.path());

        monitor.cycle(today()).await.unwrap();
        monitor.cycle(today()).await.unwrap();
        monitor.cycle(today()).await.unwrap();

        let messages = notifier.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].0.contains("consecutive wins"));
        assert_eq!(messages[0].1.as_deref(), Some("https://example.com/table"));
        assert!(messages[1].0.contains("ENTRY 5"));
        assert_eq!(messages[1].1.as_deref(), Some("https://example.com/table"));

        let saved = monitor.snapshots.load("Test Table").unwrap().unwrap();
        assert_eq!(saved.gate, "open");
        assert_eq!(saved.remaining_budget, 3);
        assert_eq!(saved.tally.signals_sent, 1);
    }

    #[tokio::test]
    async fn test_day_rollover_resets_between_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let signal = SignalParams {
            streak_to_open: 1,
            day_budget_policy: DayBudgetPolicy::Close,
            ..SignalParams::default()
        };
        let base = base_history();
        let h1 = prepend(&base, &[5]);
        let h2 = prepend(&base, &[2, 5]);
        let h3 = prepend(&base, &[7, 2, 5]);
        let (mut monitor, _notifier) = monitor_with(vec![h1, h2, h3], signal, dir.path());

        monitor.cycle(today()).await.unwrap();
        monitor.cycle(today()).await.unwrap();
        assert_eq!(monitor.machine.gate_label(), "open");

        monitor.cycle(today().succ_opt().unwrap()).await.unwrap();
        assert_eq!(monitor.machine.gate_label(), "closed");
        assert_eq!(monitor.machine.tally().wins, 0);
        // History reflects upstream truth and is not cleared.
        assert_eq!(monitor.history.len(), 53);
    }

    #[test]
    fn test_format_entry_message() {
        let event = SignalEvent::EntryOpened {
            target: 5,
            real: true,
            preceded: 9,
            total: 10,
        };
        let (text, link) = format_event("Ruby", &event, &[5, 2, 7]);
        assert_eq!(text, "🔥 ENTRY 5 (9/10) on Ruby");
        assert!(link);
    }

    #[test]
    fn test_format_resolution_messages_include_last_three() {
        let success = SignalEvent::Success {
            outcome: 2,
            stage: 0,
            real: true,
        };
        let (text, link) = format_event("Ruby", &success, &[2, 5, 30, 8]);
        assert!(text.contains("(2|5|30)"));
        assert!(!link);

        let failure = SignalEvent::Failure {
            outcome: 17,
            real: true,
        };
        let (text, _) = format_event("Ruby", &failure, &[17, 19, 3]);
        assert!(text.contains("(17|19|3)"));
    }

    #[test]
    fn test_format_gale_messages() {
        let g1 = SignalEvent::Escalated {
            stage: 1,
            outcome: 9,
            real: true,
        };
        assert_eq!(format_event("Ruby", &g1, &[]).0, "🔁 First gale (9)");

        let g2 = SignalEvent::Escalated {
            stage: 2,
            outcome: 9,
            real: true,
        };
        assert_eq!(format_event("Ruby", &g2, &[]).0, "🔁 Second and final gale (9)");
    }
}
