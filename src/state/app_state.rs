//! Explicitly constructed application context

use std::{sync::Arc, time::Instant};

use tracing::info;

use super::{HistoryStore, SettingsStore, TimerRegistry};
use crate::{
    services::{
        notification::NotificationService,
        sound::AlertPlayer,
        storage::{KeyValueStore, MemoryStore},
    },
    utils::format_duration,
};

/// Everything a session needs, wired together once
///
/// Construction restores settings-dependent state, history and timers from
/// `store`. Call [`AppContext::shutdown`] before dropping so no tick task
/// outlives the session and the final state is saved.
pub struct AppContext {
    pub store: Arc<dyn KeyValueStore>,
    pub settings: Arc<SettingsStore>,
    pub history: Arc<HistoryStore>,
    pub notifier: Arc<dyn NotificationService>,
    pub player: Arc<dyn AlertPlayer>,
    pub registry: TimerRegistry,
    pub start_time: Instant,
}

impl AppContext {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        settings: Arc<SettingsStore>,
        notifier: Arc<dyn NotificationService>,
        player: Arc<dyn AlertPlayer>,
    ) -> Self {
        let history = Arc::new(HistoryStore::load(Arc::clone(&store)));
        let registry = TimerRegistry::new(
            Arc::clone(&store),
            Arc::clone(&history),
            Arc::clone(&notifier),
            Arc::clone(&player),
            Arc::clone(&settings),
        );
        registry.load();

        info!(
            "Session ready: {} timers, {} history entries",
            registry.len(),
            history.len()
        );

        Self {
            store,
            settings,
            history,
            notifier,
            player,
            registry,
            start_time: Instant::now(),
        }
    }

    /// A session backed by throwaway in-memory storage
    pub fn in_memory(
        notifier: Arc<dyn NotificationService>,
        player: Arc<dyn AlertPlayer>,
    ) -> Self {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let settings = Arc::new(SettingsStore::load(Arc::clone(&store)));
        Self::new(store, settings, notifier, player)
    }

    /// Retract all tick tasks and persist the final state
    pub fn shutdown(&self) {
        self.registry.shutdown();
        self.settings.save();
        info!("Session closed after {}", self.get_uptime());
    }

    /// Session uptime, e.g. `1時間2分3秒`
    pub fn get_uptime(&self) -> String {
        format_duration(self.start_time.elapsed().as_secs())
    }
}
