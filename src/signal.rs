//! Per-table signal state machine with a gated trust layer
//!
//! Every newly observed outcome drives one transition. An entry opens when
//! the outcome is in the current candidate set, then resolves over at most
//! three spins (initial bet plus two martingale stages). Resolutions are
//! tracked silently until a run of consecutive wins opens the trust gate,
//! after which a limited budget of entries is surfaced externally. A fully
//! spent gate cannot reopen until at least one failure has been observed.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::pattern::{Outcome, Pattern};
use crate::trend::TrendStats;

/// Martingale escalation cap: initial bet plus two gales.
pub const MAX_STAGE: u8 = 2;

/// Entry lifecycle for a single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Idle,
    Open { target: Outcome, stage: u8 },
}

/// Trust gate controlling external visibility of entries.
///
/// `needs_failure` is the rearm guard: a gate that closed by spending its
/// whole budget on wins stays closed until some failure (silent or real)
/// is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustGate {
    Closed { needs_failure: bool },
    PendingConfirmation { target: Outcome },
    Open { budget: u8 },
}

/// What happens to the gate at the calendar-day boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayBudgetPolicy {
    /// Gate closes; the streak has to be rebuilt from scratch.
    Close,
    /// Gate reopens with a full budget.
    Refill,
}

/// Deployment-tunable thresholds. The observed deployments disagree on the
/// exact streak length and confirmation behaviour, so none of these are
/// hardcoded.
#[derive(Debug, Clone)]
pub struct SignalParams {
    /// Consecutive silent wins required to open the gate.
    pub streak_to_open: u32,
    /// Two-step arming: one short of the streak enters a pending state
    /// that only a further win on the same entry target confirms.
    pub confirmation: bool,
    /// Externally visible entries allowed per gate opening.
    pub external_budget: u8,
    /// Zero the streak as soon as the gate opens.
    pub reset_streak_on_open: bool,
    pub day_budget_policy: DayBudgetPolicy,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            streak_to_open: 7,
            confirmation: false,
            external_budget: 3,
            reset_streak_on_open: true,
            day_budget_policy: DayBudgetPolicy::Close,
        }
    }
}

/// Per-day result counters, reset at the day boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayTally {
    pub wins: u32,
    pub wins_g1: u32,
    pub wins_g2: u32,
    pub losses: u32,
    pub resolved: u32,
    pub signals_sent: u32,
}

/// One transition output. `real` marks events tied to an externally
/// visible entry; gate openings are always external.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalEvent {
    EntryOpened {
        target: Outcome,
        real: bool,
        preceded: u32,
        total: u32,
    },
    Escalated {
        stage: u8,
        outcome: Outcome,
        real: bool,
    },
    Success {
        outcome: Outcome,
        stage: u8,
        real: bool,
    },
    Failure {
        outcome: Outcome,
        real: bool,
    },
    GateOpened {
        streak: u32,
    },
}

impl SignalEvent {
    /// Whether this event should be surfaced through the notifier.
    pub fn is_external(&self) -> bool {
        match self {
            SignalEvent::EntryOpened { real, .. }
            | SignalEvent::Escalated { real, .. }
            | SignalEvent::Success { real, .. }
            | SignalEvent::Failure { real, .. } => *real,
            SignalEvent::GateOpened { .. } => true,
        }
    }
}

/// The authoritative mutable record for one table. Owned exclusively by
/// that table's monitor task.
#[derive(Debug)]
pub struct SignalMachine {
    params: SignalParams,
    entry: Entry,
    gate: TrustGate,
    real_entry: bool,
    silent_streak: u32,
    last_processed: Option<Outcome>,
    day: NaiveDate,
    rounds_today: u32,
    tally: DayTally,
}

impl SignalMachine {
    pub fn new(params: SignalParams, today: NaiveDate) -> Self {
        Self {
            params,
            entry: Entry::Idle,
            gate: TrustGate::Closed { needs_failure: false },
            real_entry: false,
            silent_streak: 0,
            last_processed: None,
            day: today,
            rounds_today: 0,
            tally: DayTally::default(),
        }
    }

    /// Reset counters and the gate when the calendar day has advanced.
    /// History is upstream truth and is left untouched by the caller.
    /// Returns true when a rollover happened.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        if self.day == today {
            return false;
        }
        self.day = today;
        self.entry = Entry::Idle;
        self.real_entry = false;
        self.silent_streak = 0;
        self.rounds_today = 0;
        self.tally = DayTally::default();
        self.gate = match self.params.day_budget_policy {
            DayBudgetPolicy::Close => TrustGate::Closed { needs_failure: false },
            DayBudgetPolicy::Refill => TrustGate::Open {
                budget: self.params.external_budget,
            },
        };
        true
    }

    /// Count one fetch cycle for today.
    pub fn note_round(&mut self) {
        self.rounds_today += 1;
    }

    /// Drive one transition for a newly observed outcome. A repeat of the
    /// last processed outcome is a strict no-op, so polling the same spin
    /// twice cannot double-resolve an entry.
    pub fn process(
        &mut self,
        outcome: Outcome,
        candidates: &[Outcome],
        stats: &TrendStats,
        pattern: &Pattern,
    ) -> Vec<SignalEvent> {
        if self.last_processed == Some(outcome) {
            return Vec::new();
        }
        self.last_processed = Some(outcome);

        match self.entry {
            Entry::Idle => self.try_open_entry(outcome, candidates, stats),
            Entry::Open { target, stage } => {
                if pattern.contains(outcome) {
                    self.resolve_success(outcome, target, stage)
                } else if stage < MAX_STAGE {
                    self.escalate(outcome, target, stage)
                } else {
                    self.resolve_failure(outcome)
                }
            }
        }
    }

    fn try_open_entry(
        &mut self,
        outcome: Outcome,
        candidates: &[Outcome],
        stats: &TrendStats,
    ) -> Vec<SignalEvent> {
        if !candidates.contains(&outcome) {
            return Vec::new();
        }

        let real = matches!(self.gate, TrustGate::Open { .. });
        self.entry = Entry::Open {
            target: outcome,
            stage: 0,
        };
        self.real_entry = real;
        if real {
            self.tally.signals_sent += 1;
        }

        let entry_stats = stats.get(outcome);
        vec![SignalEvent::EntryOpened {
            target: outcome,
            real,
            preceded: entry_stats.preceded,
            total: entry_stats.total,
        }]
    }

    fn escalate(&mut self, outcome: Outcome, target: Outcome, stage: u8) -> Vec<SignalEvent> {
        self.entry = Entry::Open {
            target,
            stage: stage + 1,
        };
        vec![SignalEvent::Escalated {
            stage: stage + 1,
            outcome,
            real: self.real_entry,
        }]
    }

    fn resolve_success(&mut self, outcome: Outcome, target: Outcome, stage: u8) -> Vec<SignalEvent> {
        let real = self.real_entry;

        self.tally.wins += 1;
        self.tally.resolved += 1;
        match stage {
            1 => self.tally.wins_g1 += 1,
            2 => self.tally.wins_g2 += 1,
            _ => {}
        }

        let mut events = vec![SignalEvent::Success {
            outcome,
            stage,
            real,
        }];

        if real {
            self.spend_budget();
        } else {
            self.silent_streak += 1;
            if let Some(streak) = self.try_open_gate(target) {
                events.push(SignalEvent::GateOpened { streak });
            }
        }

        self.entry = Entry::Idle;
        self.real_entry = false;
        events
    }

    fn resolve_failure(&mut self, outcome: Outcome) -> Vec<SignalEvent> {
        let real = self.real_entry;

        self.tally.losses += 1;
        self.tally.resolved += 1;
        self.silent_streak = 0;

        // A failure of either kind satisfies the rearm condition.
        self.gate = match self.gate {
            TrustGate::Open { budget } if real => {
                if budget <= 1 {
                    TrustGate::Closed { needs_failure: false }
                } else {
                    TrustGate::Open { budget: budget - 1 }
                }
            }
            TrustGate::Open { budget } => TrustGate::Open { budget },
            TrustGate::PendingConfirmation { .. } | TrustGate::Closed { .. } => {
                TrustGate::Closed { needs_failure: false }
            }
        };

        self.entry = Entry::Idle;
        self.real_entry = false;
        vec![SignalEvent::Failure { outcome, real }]
    }

    /// Decrement the external budget after a real resolution. Spending the
    /// last unit on a win closes the gate behind the rearm guard.
    fn spend_budget(&mut self) {
        if let TrustGate::Open { budget } = self.gate {
            if budget <= 1 {
                self.gate = TrustGate::Closed { needs_failure: true };
                self.silent_streak = 0;
            } else {
                self.gate = TrustGate::Open { budget: budget - 1 };
            }
        }
    }

    /// Gate opening guard, evaluated after a silent win has been counted.
    /// Returns the streak length that opened the gate, if it did.
    fn try_open_gate(&mut self, target: Outcome) -> Option<u32> {
        match self.gate {
            TrustGate::Closed { needs_failure: true } => None,
            TrustGate::Closed { needs_failure: false } => {
                if self.params.confirmation {
                    if self.silent_streak + 1 == self.params.streak_to_open {
                        self.gate = TrustGate::PendingConfirmation { target };
                    }
                    None
                } else if self.silent_streak >= self.params.streak_to_open {
                    Some(self.open_gate())
                } else {
                    None
                }
            }
            TrustGate::PendingConfirmation { target: armed } => {
                if target == armed && self.silent_streak >= self.params.streak_to_open {
                    Some(self.open_gate())
                } else {
                    None
                }
            }
            // An entry that resolves silently was opened while the gate was
            // closed; the gate cannot be open here.
            TrustGate::Open { .. } => None,
        }
    }

    fn open_gate(&mut self) -> u32 {
        let streak = self.silent_streak;
        self.gate = TrustGate::Open {
            budget: self.params.external_budget,
        };
        if self.params.reset_streak_on_open {
            self.silent_streak = 0;
        }
        streak
    }

    pub fn entry(&self) -> Entry {
        self.entry
    }

    pub fn gate(&self) -> TrustGate {
        self.gate
    }

    pub fn gate_label(&self) -> &'static str {
        match self.gate {
            TrustGate::Closed { needs_failure: false } => "closed",
            TrustGate::Closed { needs_failure: true } => "closed-rearm",
            TrustGate::PendingConfirmation { .. } => "pending",
            TrustGate::Open { .. } => "open",
        }
    }

    pub fn remaining_budget(&self) -> u8 {
        match self.gate {
            TrustGate::Open { budget } => budget,
            _ => 0,
        }
    }

    pub fn silent_streak(&self) -> u32 {
        self.silent_streak
    }

    pub fn tally(&self) -> DayTally {
        self.tally
    }

    pub fn rounds_today(&self) -> u32 {
        self.rounds_today
    }
}
