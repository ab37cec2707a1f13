//! Configuration loaded from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::pattern::Pattern;
use crate::signal::{DayBudgetPolicy, SignalParams};

pub struct Config {
    /// Shared results endpoint serving all tables.
    pub results_url: String,
    /// Table names to monitor, as they appear in the results document.
    pub tables: Vec<String>,
    pub pattern: Pattern,
    /// Link attached to entry and gate-open notifications.
    pub table_link: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub snapshot_dir: PathBuf,

    pub history_capacity: usize,
    pub min_rounds: usize,
    pub min_occurrences: u32,
    pub min_score: f64,
    pub top_k: usize,

    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub max_backoff: Duration,
    pub fetch_timeout: Duration,

    pub signal: SignalParams,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// RESULTS_URL and TABLES are required; everything else has the
    /// standard deployment defaults.
    pub fn from_env() -> Self {
        let results_url = env::var("RESULTS_URL").expect("RESULTS_URL must be set in .env file");

        let tables: Vec<String> = env::var("TABLES")
            .expect("TABLES must be set in .env file (comma-separated)")
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tables.is_empty() {
            panic!("TABLES must name at least one table");
        }

        let pattern_spec = env::var("PATTERN").unwrap_or_else(|_| "group12".to_string());
        let pattern = Pattern::from_spec(&pattern_spec)
            .unwrap_or_else(|| panic!("PATTERN is not a known group or number list: {}", pattern_spec));

        let signal = SignalParams {
            streak_to_open: env_parse("STREAK_TO_OPEN", 7),
            confirmation: env_parse("STREAK_CONFIRMATION", false),
            external_budget: env_parse("EXTERNAL_BUDGET", 3),
            reset_streak_on_open: env_parse("RESET_STREAK_ON_OPEN", true),
            day_budget_policy: match env::var("DAY_BUDGET_POLICY").as_deref() {
                Ok("refill") => DayBudgetPolicy::Refill,
                _ => DayBudgetPolicy::Close,
            },
        };

        Self {
            results_url,
            tables,
            pattern,
            table_link: env::var("TABLE_LINK").ok(),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").ok(),
            snapshot_dir: PathBuf::from(
                env::var("SNAPSHOT_DIR").unwrap_or_else(|_| "snapshots".to_string()),
            ),
            history_capacity: env_parse("HISTORY_CAPACITY", 500),
            min_rounds: env_parse("MIN_ROUNDS", 50),
            min_occurrences: env_parse("MIN_OCCURRENCES", 5),
            min_score: env_parse("MIN_SCORE", 0.80),
            top_k: env_parse("TOP_K", 10),
            poll_interval: Duration::from_secs(env_parse("POLL_INTERVAL_SECS", 2)),
            error_backoff: Duration::from_secs(env_parse("ERROR_BACKOFF_SECS", 5)),
            max_backoff: Duration::from_secs(env_parse("MAX_BACKOFF_SECS", 60)),
            fetch_timeout: Duration::from_secs(env_parse("FETCH_TIMEOUT_SECS", 10)),
            signal,
        }
    }

    /// Telegram credentials are optional; without them notifications go to
    /// the log only.
    pub fn telegram_configured(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}

/// Parse an env var, falling back to the default on absence or garbage
/// (with a warning, so typos don't silently change thresholds).
fn env_parse<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}
