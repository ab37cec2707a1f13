use std::sync::Arc;

use spinwatch::config::Config;
use spinwatch::monitor::{supervise, MonitorParams};
use spinwatch::notify::{LogNotifier, Notifier, TelegramNotifier};
use spinwatch::snapshot::SnapshotSink;
use spinwatch::source::HttpOutcomeSource;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = Config::from_env();

    log::info!("🚀 Starting spinwatch...");
    log::info!("📊 Configuration:");
    log::info!("   Results URL: {}", config.results_url);
    log::info!("   Tables: {:?}", config.tables);
    log::info!(
        "   Pattern: {} ({} numbers)",
        config.pattern.name(),
        config.pattern.len()
    );
    log::info!(
        "   Thresholds: min_rounds={} min_occurrences={} min_score={} top_k={}",
        config.min_rounds,
        config.min_occurrences,
        config.min_score,
        config.top_k
    );
    log::info!(
        "   Gate: streak_to_open={} confirmation={} budget={}",
        config.signal.streak_to_open,
        config.signal.confirmation,
        config.signal.external_budget
    );

    let source = Arc::new(HttpOutcomeSource::new(
        &config.results_url,
        config.fetch_timeout,
    )?);

    let notifier: Arc<dyn Notifier> = if config.telegram_configured() {
        log::info!("📨 Notifications: Telegram");
        Arc::new(TelegramNotifier::new(
            config.telegram_bot_token.as_deref().unwrap_or_default(),
            config.telegram_chat_id.as_deref().unwrap_or_default(),
            config.fetch_timeout,
        )?)
    } else {
        log::info!("📨 Notifications: log only (no Telegram credentials)");
        Arc::new(LogNotifier)
    };

    let snapshots = Arc::new(SnapshotSink::new(&config.snapshot_dir));
    snapshots.ensure_dir()?;

    let params = MonitorParams::from(&config);
    let mut handles = Vec::new();
    for table in &config.tables {
        handles.push(tokio::spawn(supervise(
            table.clone(),
            params.clone(),
            source.clone(),
            notifier.clone(),
            snapshots.clone(),
        )));
    }

    log::info!("✅ {} table monitors running (Ctrl+C to stop)", handles.len());

    tokio::signal::ctrl_c().await?;
    log::info!("🛑 Shutdown requested, stopping all monitors");
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
