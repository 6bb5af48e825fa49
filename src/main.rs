//! Multi Timer - run timers from the terminal with desktop alerts
//!
//! This is the main entry point for the multi-timer application.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use multi_timer::{
    config::Config,
    services::{CommandPlayer, FileStore, KeyValueStore, NotificationService, SystemNotifier},
    state::{AppContext, SettingsStore, TimerEvent},
    utils::{format_time, shutdown_signal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("multi_timer={}", config.log_level()))
        .init();

    info!("Starting multi-timer v1.0.0");
    info!("Configuration: data_dir={}, sounds_dir={}",
          config.data_dir.display(), config.sounds_dir.display());

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.data_dir)?);
    let settings = Arc::new(SettingsStore::load(Arc::clone(&store)));

    let notifier =
        SystemNotifier::detect(Arc::clone(&settings), config.initial_permission()).await;
    if !notifier.request_permission().await {
        warn!("Notifications unavailable, completions will only be logged");
    }

    let ctx = AppContext::new(
        store,
        settings,
        Arc::new(notifier),
        Arc::new(CommandPlayer::paplay(&config.sounds_dir)),
    );
    let registry = &ctx.registry;

    if let Some(mode) = config.requested_mode() {
        registry.add_timer(config.label.as_deref());
        registry.set_mode(mode, None);
        if let Some(seconds) = config.time {
            registry.set_time(seconds, None);
        }
    }

    let mut events = registry.subscribe();
    if !registry.start(None) {
        let timer = registry.active_timer();
        info!("Timer \"{}\" has nothing to run ({})", timer.label, timer.state.formatted());
        ctx.shutdown();
        return Ok(());
    }

    let timer = registry.active_timer();
    info!("Running \"{}\" from {}", timer.label, timer.state.formatted());

    let run = async {
        loop {
            match events.recv().await {
                Ok(TimerEvent::Ticked { id, remaining_seconds }) => {
                    debug!("{}: {}", id, format_time(remaining_seconds));
                }
                Ok(TimerEvent::Completed { label, .. }) => {
                    info!("\"{}\" finished", label);
                    if registry.running_count() == 0 {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} timer events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    tokio::select! {
        _ = run => {
            info!("All timers finished");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    ctx.shutdown();

    let stats = ctx.history.statistics();
    info!("History: {} completed, {} total",
          stats.total_completed, format_time(stats.total_duration));
    info!("Shutdown complete");
    Ok(())
}
