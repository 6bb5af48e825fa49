//! Ledger of completed timers, persisted under `timer-history`

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use uuid::Uuid;

use super::TimerMode;
use crate::services::storage::{load_json, save_json, KeyValueStore};

pub const HISTORY_KEY: &str = "timer-history";

/// Oldest entries beyond this count are evicted
pub const MAX_HISTORY_ITEMS: usize = 100;

/// A recorded timer run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerHistoryEntry {
    pub id: String,
    pub label: String,
    pub mode: TimerMode,
    /// Seconds elapsed at completion
    pub duration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<u64>,
    pub completed_at: DateTime<Utc>,
    /// True only for a countdown that ran to zero
    pub completed: bool,
}

/// Entry fields supplied by the caller; id and timestamp are assigned on add
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub label: String,
    pub mode: TimerMode,
    pub duration: u64,
    pub target_duration: Option<u64>,
    pub completed: bool,
}

/// Aggregates over the whole ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HistoryStatistics {
    pub total_completed: usize,
    pub total_duration: u64,
    pub countdown_count: usize,
    pub countup_count: usize,
    pub total_count: usize,
}

/// Append-only history, most recent first
pub struct HistoryStore {
    entries: Mutex<Vec<TimerHistoryEntry>>,
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    /// Restore the ledger; a corrupt blob yields an empty history
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let mut entries = match load_json::<Vec<TimerHistoryEntry>>(store.as_ref(), HISTORY_KEY) {
            Ok(Some(entries)) => entries,
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Failed to load history: {}", e);
                Vec::new()
            }
        };
        entries.truncate(MAX_HISTORY_ITEMS);
        debug!("Loaded {} history entries", entries.len());

        Self {
            entries: Mutex::new(entries),
            store,
        }
    }

    /// Record a run completed now
    pub fn add(&self, entry: NewHistoryEntry) -> TimerHistoryEntry {
        self.add_at(entry, Utc::now())
    }

    /// Record a run completed at `completed_at`
    pub fn add_at(&self, entry: NewHistoryEntry, completed_at: DateTime<Utc>) -> TimerHistoryEntry {
        let entry = TimerHistoryEntry {
            id: format!("history-{}", Uuid::new_v4()),
            label: entry.label,
            mode: entry.mode,
            duration: entry.duration,
            target_duration: entry.target_duration,
            completed_at,
            completed: entry.completed,
        };

        {
            let mut entries = self.lock();
            entries.insert(0, entry.clone());
            entries.truncate(MAX_HISTORY_ITEMS);
        }
        self.save();
        entry
    }

    /// Delete one entry; returns false if no entry has this id
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut entries = self.lock();
            let before = entries.len();
            entries.retain(|entry| entry.id != id);
            entries.len() != before
        };
        self.save();
        removed
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.save();
    }

    /// All entries, most recent first
    pub fn entries(&self) -> Vec<TimerHistoryEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn statistics(&self) -> HistoryStatistics {
        let entries = self.lock();
        HistoryStatistics {
            total_completed: entries.iter().filter(|e| e.completed).count(),
            total_duration: entries.iter().map(|e| e.duration).sum(),
            countdown_count: entries
                .iter()
                .filter(|e| e.mode == TimerMode::Countdown)
                .count(),
            countup_count: entries
                .iter()
                .filter(|e| e.mode == TimerMode::Countup)
                .count(),
            total_count: entries.len(),
        }
    }

    /// Entries completed on `date`, local midnight to midnight
    pub fn on_date(&self, date: NaiveDate) -> Vec<TimerHistoryEntry> {
        self.on_date_in(date, &Local)
    }

    /// Entries completed on `date` in the given time zone
    pub fn on_date_in<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> Vec<TimerHistoryEntry> {
        self.lock()
            .iter()
            .filter(|e| e.completed_at.with_timezone(tz).date_naive() == date)
            .cloned()
            .collect()
    }

    pub fn today(&self) -> Vec<TimerHistoryEntry> {
        self.on_date(Local::now().date_naive())
    }

    /// Entries completed within the seven days before `now`
    pub fn this_week(&self, now: DateTime<Utc>) -> Vec<TimerHistoryEntry> {
        let week_ago = now - Duration::days(7);
        self.lock()
            .iter()
            .filter(|e| e.completed_at >= week_ago)
            .cloned()
            .collect()
    }

    fn save(&self) {
        let entries = self.entries();
        if let Err(e) = save_json(self.store.as_ref(), HISTORY_KEY, &entries) {
            error!("Failed to save history: {}", e);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TimerHistoryEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
