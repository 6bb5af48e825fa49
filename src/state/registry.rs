//! Registry of independent timers and their state transitions

use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    history::{HistoryStore, NewHistoryEntry},
    settings::SettingsStore,
    timer_state::{Timer, TimerMode, TimerSnapshot},
};
use crate::{
    services::{
        notification::{notify_timer_complete, NotificationService},
        sound::{self, AlertPlayer},
        storage::{load_json, save_json, KeyValueStore},
    },
    tasks::tick::spawn_ticker,
};

pub const TIMERS_KEY: &str = "timers";
pub const ACTIVE_INDEX_KEY: &str = "activeTimerIndex";
pub const COUNTER_KEY: &str = "timerCounter";

/// Default labels are `"<prefix> <counter>"`
pub const DEFAULT_LABEL_PREFIX: &str = "タイマー";

/// Interval between ticks of a running timer
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Broadcast to subscribers as timers progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Ticked { id: String, remaining_seconds: u64 },
    /// Sent once history, notification and alert sound are done
    Completed { id: String, label: String },
}

/// Result of applying one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Continue,
    /// Countdown reached zero; the timer is idle again
    Completed(TimerSnapshot),
    /// Timer was removed, stopped or restarted since the task was spawned
    Stale,
}

#[derive(Debug)]
struct RegistryState {
    timers: Vec<Timer>,
    active_index: usize,
    counter: u64,
    next_epoch: u64,
}

impl RegistryState {
    fn resolve(&self, index: Option<usize>) -> Option<usize> {
        let index = index.unwrap_or(self.active_index);
        (index < self.timers.len()).then_some(index)
    }

    fn timer_mut(&mut self, index: Option<usize>) -> Option<&mut Timer> {
        let index = self.resolve(index)?;
        self.timers.get_mut(index)
    }

    fn new_timer(&mut self, label: Option<&str>) -> Timer {
        self.counter += 1;
        let label = match label {
            Some(label) => label.to_string(),
            None => format!("{} {}", DEFAULT_LABEL_PREFIX, self.counter),
        };
        Timer::new(new_timer_id(), label)
    }
}

fn new_timer_id() -> String {
    format!("timer-{}", Uuid::new_v4())
}

/// State shared between the registry handle and its tick tasks
pub(crate) struct RegistryShared {
    state: Mutex<RegistryState>,
    store: Arc<dyn KeyValueStore>,
    history: Arc<HistoryStore>,
    notifier: Arc<dyn NotificationService>,
    player: Arc<dyn AlertPlayer>,
    settings: Arc<SettingsStore>,
    events: broadcast::Sender<TimerEvent>,
}

impl RegistryShared {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Advance the timer `id` if `epoch` still owns its tick
    pub(crate) fn tick(&self, id: &str, epoch: u64) -> TickOutcome {
        let completed = {
            let mut state = self.lock();
            let Some(timer) = state.timers.iter_mut().find(|t| t.id == id) else {
                return TickOutcome::Stale;
            };
            if timer.tick.as_ref().map(|h| h.epoch()) != Some(epoch) {
                return TickOutcome::Stale;
            }

            if !timer.state.advance() {
                debug!("Tick {}: {}", timer.label, timer.state.remaining_seconds);
                // No subscribers is fine
                let _ = self.events.send(TimerEvent::Ticked {
                    id: timer.id.clone(),
                    remaining_seconds: timer.state.remaining_seconds,
                });
                return TickOutcome::Continue;
            }

            timer.state.mark_stopped();
            if let Some(handle) = timer.tick.take() {
                handle.release();
            }
            timer.snapshot()
        };

        self.complete(&completed);
        self.save();
        TickOutcome::Completed(completed)
    }

    /// Record history and notify for a countdown that reached zero
    fn complete(&self, timer: &TimerSnapshot) {
        info!("Timer \"{}\" completed", timer.label);

        self.history.add(NewHistoryEntry {
            label: timer.label.clone(),
            mode: timer.state.mode,
            duration: timer.state.total_seconds,
            target_duration: (timer.state.mode == TimerMode::Countdown)
                .then_some(timer.state.total_seconds),
            completed: true,
        });

        let message = format!("{}が完了しました！", timer.label);
        notify_timer_complete(self.notifier.as_ref(), Some(&message));
    }

    /// Play the completion alert, then announce the completion
    pub(crate) async fn finish_completion(&self, timer: TimerSnapshot) {
        let settings = self.settings.get();
        sound::play_completion_alert(self.player.as_ref(), &settings).await;

        let _ = self.events.send(TimerEvent::Completed {
            id: timer.id,
            label: timer.label,
        });
    }

    fn save(&self) {
        let (snapshots, active_index, counter) = {
            let state = self.lock();
            let snapshots: Vec<TimerSnapshot> = state.timers.iter().map(Timer::snapshot).collect();
            (snapshots, state.active_index, state.counter)
        };

        let store = self.store.as_ref();
        let result = save_json(store, TIMERS_KEY, &snapshots)
            .and_then(|()| store.set(ACTIVE_INDEX_KEY, &active_index.to_string()))
            .and_then(|()| store.set(COUNTER_KEY, &counter.to_string()));
        if let Err(e) = result {
            error!("Failed to save timers: {}", e);
        }
    }
}

/// Ordered collection of timers with one active timer
///
/// Index-taking operations target the active timer when given `None`.
/// Operations that are invalid in the current state return `false` and
/// change nothing.
#[derive(Clone)]
pub struct TimerRegistry {
    shared: Arc<RegistryShared>,
}

impl TimerRegistry {
    /// Create a registry holding a single idle timer
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        history: Arc<HistoryStore>,
        notifier: Arc<dyn NotificationService>,
        player: Arc<dyn AlertPlayer>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(100);
        let mut state = RegistryState {
            timers: Vec::new(),
            active_index: 0,
            counter: 0,
            next_epoch: 0,
        };
        let first = state.new_timer(None);
        state.timers.push(first);

        Self {
            shared: Arc::new(RegistryShared {
                state: Mutex::new(state),
                store,
                history,
                notifier,
                player,
                settings,
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.shared.events.subscribe()
    }

    /// Append a new idle timer and make it active; returns its id
    pub fn add_timer(&self, label: Option<&str>) -> String {
        let id = {
            let mut state = self.shared.lock();
            let timer = state.new_timer(label);
            let id = timer.id.clone();
            info!("Added timer \"{}\"", timer.label);
            state.timers.push(timer);
            state.active_index = state.timers.len() - 1;
            id
        };
        self.save();
        id
    }

    /// Remove a timer; the last remaining timer cannot be removed
    pub fn remove_timer(&self, index: usize) -> bool {
        {
            let mut state = self.shared.lock();
            if state.timers.len() <= 1 || index >= state.timers.len() {
                return false;
            }
            // Dropping the timer retracts its tick
            let removed = state.timers.remove(index);
            info!("Removed timer \"{}\"", removed.label);
            if state.active_index >= state.timers.len() {
                state.active_index = state.timers.len() - 1;
            }
        }
        self.save();
        true
    }

    pub fn switch_timer(&self, index: usize) -> bool {
        {
            let mut state = self.shared.lock();
            if index >= state.timers.len() {
                return false;
            }
            state.active_index = index;
        }
        self.save();
        true
    }

    /// Activate the next timer, wrapping to the first
    pub fn next_timer(&self) {
        {
            let mut state = self.shared.lock();
            state.active_index = (state.active_index + 1) % state.timers.len();
        }
        self.save();
    }

    /// Activate the previous timer, wrapping to the last
    pub fn prev_timer(&self) {
        {
            let mut state = self.shared.lock();
            let len = state.timers.len();
            state.active_index = (state.active_index + len - 1) % len;
        }
        self.save();
    }

    /// Start ticking. Ignored when already running or for a countdown with
    /// nothing left.
    pub fn start(&self, index: Option<usize>) -> bool {
        {
            let mut state = self.shared.lock();
            let Some(i) = state.resolve(index) else {
                return false;
            };
            if !state.timers[i].state.can_start() {
                return false;
            }

            state.next_epoch += 1;
            let epoch = state.next_epoch;
            let timer = &mut state.timers[i];
            let Some(handle) = spawn_ticker(
                Arc::downgrade(&self.shared),
                timer.id.clone(),
                epoch,
                TICK_PERIOD,
            ) else {
                error!("Cannot start \"{}\": no async runtime", timer.label);
                return false;
            };

            timer.tick = Some(handle);
            timer.state.mark_running();
            info!("Started timer \"{}\"", timer.label);
        }
        self.save();
        true
    }

    /// Stop ticking but keep the remaining time
    pub fn pause(&self, index: Option<usize>) -> bool {
        self.mutate(index, |timer| {
            if !timer.state.is_running {
                return false;
            }
            timer.cancel_tick();
            timer.state.mark_paused();
            debug!("Paused timer \"{}\"", timer.label);
            true
        })
    }

    /// Return to idle with the full duration restored
    pub fn reset(&self, index: Option<usize>) -> bool {
        self.mutate(index, |timer| {
            timer.cancel_tick();
            timer.state.mark_stopped();
            timer.state.remaining_seconds = timer.state.total_seconds;
            true
        })
    }

    /// Return to idle keeping the current counter value
    pub fn stop(&self, index: Option<usize>) -> bool {
        self.mutate(index, |timer| {
            timer.cancel_tick();
            timer.state.mark_stopped();
            true
        })
    }

    /// Set the countdown duration; ignored while running
    pub fn set_time(&self, seconds: u64, index: Option<usize>) -> bool {
        self.mutate(index, |timer| {
            if timer.state.is_running {
                return false;
            }
            timer.state.total_seconds = seconds;
            timer.state.remaining_seconds = seconds;
            true
        })
    }

    /// Switch counting direction; ignored while running
    pub fn set_mode(&self, mode: TimerMode, index: Option<usize>) -> bool {
        self.mutate(index, |timer| {
            if timer.state.is_running {
                return false;
            }
            timer.state.mode = mode;
            if mode == TimerMode::Countup {
                timer.state.total_seconds = 0;
                timer.state.remaining_seconds = 0;
            }
            true
        })
    }

    pub fn set_label(&self, label: &str, index: Option<usize>) -> bool {
        self.mutate(index, |timer| {
            timer.label = label.to_string();
            true
        })
    }

    fn mutate(&self, index: Option<usize>, op: impl FnOnce(&mut Timer) -> bool) -> bool {
        let applied = {
            let mut state = self.shared.lock();
            match state.timer_mut(index) {
                Some(timer) => op(timer),
                None => false,
            }
        };
        if applied {
            self.save();
        }
        applied
    }

    pub fn timers(&self) -> Vec<TimerSnapshot> {
        self.shared.lock().timers.iter().map(Timer::snapshot).collect()
    }

    pub fn timer(&self, index: Option<usize>) -> Option<TimerSnapshot> {
        let state = self.shared.lock();
        state.resolve(index).map(|i| state.timers[i].snapshot())
    }

    pub fn active_timer(&self) -> TimerSnapshot {
        let state = self.shared.lock();
        state.timers[state.active_index].snapshot()
    }

    pub fn active_index(&self) -> usize {
        self.shared.lock().active_index
    }

    pub fn counter(&self) -> u64 {
        self.shared.lock().counter
    }

    pub fn len(&self) -> usize {
        self.shared.lock().timers.len()
    }

    /// Always false; the registry keeps at least one timer
    pub fn is_empty(&self) -> bool {
        self.shared.lock().timers.is_empty()
    }

    /// Whether the timer currently owns a live tick task
    pub fn is_ticking(&self, index: Option<usize>) -> bool {
        let state = self.shared.lock();
        state
            .resolve(index)
            .is_some_and(|i| state.timers[i].is_ticking())
    }

    pub fn running_count(&self) -> usize {
        self.shared
            .lock()
            .timers
            .iter()
            .filter(|t| t.state.is_running)
            .count()
    }

    /// Persist timers, active index and counter
    pub fn save(&self) {
        self.shared.save();
    }

    /// Restore persisted timers. Nothing resumes running; malformed or empty
    /// data leaves the current timers in place.
    pub fn load(&self) {
        let store = self.shared.store.as_ref();
        let snapshots = match load_json::<Vec<TimerSnapshot>>(store, TIMERS_KEY) {
            Ok(Some(snapshots)) if !snapshots.is_empty() => snapshots,
            Ok(_) => {
                debug!("No saved timers");
                return;
            }
            Err(e) => {
                error!("Failed to load timers: {}", e);
                return;
            }
        };
        let active_index = read_number::<usize>(store, ACTIVE_INDEX_KEY);
        let counter = read_number::<u64>(store, COUNTER_KEY);

        // Ticks look timers up by id, so restored ids must be unique
        let mut seen = HashSet::new();
        let timers = snapshots
            .into_iter()
            .map(|mut snapshot| {
                if !seen.insert(snapshot.id.clone()) {
                    let id = new_timer_id();
                    warn!("Duplicate timer id {}, reassigned to {}", snapshot.id, id);
                    snapshot.id = id;
                    seen.insert(snapshot.id.clone());
                }
                Timer::restore(snapshot)
            })
            .collect();

        let mut state = self.shared.lock();
        state.timers = timers;
        match active_index {
            Some(i) if i < state.timers.len() => state.active_index = i,
            _ if state.active_index >= state.timers.len() => state.active_index = 0,
            _ => {}
        }
        if let Some(counter) = counter {
            state.counter = state.counter.max(counter);
        }
        info!("Restored {} timers", state.timers.len());
    }

    /// Retract every tick task and persist. Running timers end up paused.
    pub fn shutdown(&self) {
        let retracted = {
            let mut state = self.shared.lock();
            let mut retracted = 0;
            for timer in state.timers.iter_mut().filter(|t| t.is_ticking()) {
                timer.cancel_tick();
                timer.state.mark_paused();
                retracted += 1;
            }
            retracted
        };
        info!("Registry shut down, retracted {} tick tasks", retracted);
        self.save();
    }
}

fn read_number<T: std::str::FromStr>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    match store.get(key) {
        Ok(Some(raw)) => {
            // Accept both `3` and `"3"`
            let parsed = raw.trim().trim_matches('"').parse().ok();
            if parsed.is_none() {
                error!("Ignoring malformed value for {}: {}", key, raw);
            }
            parsed
        }
        Ok(None) => None,
        Err(e) => {
            error!("Failed to read {}: {}", key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        notification::{Permission, COMPLETION_TITLE},
        recording::RecordingNotifier,
        sound::{AlertCall, RecordingPlayer},
        storage::MemoryStore,
    };
    use tokio::time::sleep;

    struct Fixture {
        store: Arc<dyn KeyValueStore>,
        history: Arc<HistoryStore>,
        notifier: Arc<RecordingNotifier>,
        player: Arc<RecordingPlayer>,
        settings: Arc<SettingsStore>,
        registry: TimerRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
            Self::with_store(store)
        }

        fn with_store(store: Arc<dyn KeyValueStore>) -> Self {
            let history = Arc::new(HistoryStore::load(Arc::clone(&store)));
            let notifier = Arc::new(RecordingNotifier::granted());
            let player = Arc::new(RecordingPlayer::new());
            let settings = Arc::new(SettingsStore::load(Arc::clone(&store)));
            let registry = TimerRegistry::new(
                Arc::clone(&store),
                Arc::clone(&history),
                notifier.clone(),
                player.clone(),
                Arc::clone(&settings),
            );
            Self {
                store,
                history,
                notifier,
                player,
                settings,
                registry,
            }
        }
    }

    /// Let `seconds` ticks fire, stopping half a second past the last one
    async fn elapse(seconds: u64) {
        sleep(Duration::from_millis(seconds * 1000 + 500)).await;
    }

    #[test]
    fn test_new_registry_has_one_default_timer() {
        let fx = Fixture::new();
        assert_eq!(fx.registry.len(), 1);
        assert_eq!(fx.registry.active_index(), 0);
        assert_eq!(fx.registry.counter(), 1);
        assert_eq!(fx.registry.active_timer().label, "タイマー 1");
        assert!(fx.registry.active_timer().id.starts_with("timer-"));
    }

    #[test]
    fn test_add_timer_becomes_active() {
        let fx = Fixture::new();
        let id = fx.registry.add_timer(Some("Tea"));
        assert_eq!(fx.registry.len(), 2);
        assert_eq!(fx.registry.active_index(), 1);
        assert_eq!(fx.registry.active_timer().id, id);
        assert_eq!(fx.registry.active_timer().label, "Tea");
    }

    #[test]
    fn test_remove_last_timer_is_rejected() {
        let fx = Fixture::new();
        assert!(!fx.registry.remove_timer(0));
        assert_eq!(fx.registry.len(), 1);
    }

    #[test]
    fn test_remove_clamps_active_index() {
        let fx = Fixture::new();
        fx.registry.add_timer(None);
        fx.registry.add_timer(None);
        assert_eq!(fx.registry.active_index(), 2);

        assert!(fx.registry.remove_timer(2));
        assert_eq!(fx.registry.active_index(), 1);
        assert!(!fx.registry.remove_timer(5));

        // Removing before the active index only clamps when out of range
        assert!(fx.registry.remove_timer(0));
        assert_eq!(fx.registry.active_index(), 0);
        assert_eq!(fx.registry.len(), 1);
    }

    #[test]
    fn test_counter_never_reused() {
        let fx = Fixture::new();
        fx.registry.add_timer(None);
        fx.registry.remove_timer(1);
        fx.registry.add_timer(None);

        let labels: Vec<_> = fx.registry.timers().into_iter().map(|t| t.label).collect();
        assert_eq!(labels, vec!["タイマー 1", "タイマー 3"]);
        assert_eq!(fx.registry.counter(), 3);
    }

    #[test]
    fn test_switch_next_prev_wrap() {
        let fx = Fixture::new();
        fx.registry.add_timer(None);
        fx.registry.add_timer(None);

        assert!(fx.registry.switch_timer(0));
        assert!(!fx.registry.switch_timer(3));
        assert_eq!(fx.registry.active_index(), 0);

        fx.registry.prev_timer();
        assert_eq!(fx.registry.active_index(), 2);
        fx.registry.next_timer();
        assert_eq!(fx.registry.active_index(), 0);
        fx.registry.next_timer();
        assert_eq!(fx.registry.active_index(), 1);
    }

    #[test]
    fn test_start_outside_runtime_is_refused() {
        let fx = Fixture::new();
        fx.registry.set_time(10, None);
        assert!(!fx.registry.start(None));
        assert!(!fx.registry.active_timer().state.is_running);
        assert!(!fx.registry.is_ticking(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_countdown_does_not_start() {
        let fx = Fixture::new();
        assert!(!fx.registry.start(None));
        assert!(!fx.registry.is_ticking(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let fx = Fixture::new();
        fx.registry.set_time(10, None);
        assert!(fx.registry.start(None));
        assert!(!fx.registry.start(None));

        elapse(3).await;
        assert_eq!(fx.registry.active_timer().state.remaining_seconds, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_completes_exactly_once() {
        let fx = Fixture::new();
        let mut events = fx.registry.subscribe();
        fx.registry.set_time(5, None);
        fx.registry.start(None);

        elapse(5).await;
        let timer = fx.registry.active_timer();
        assert!(timer.state.is_idle());
        assert_eq!(timer.state.remaining_seconds, 0);
        assert!(!fx.registry.is_ticking(None));

        let history = fx.history.entries();
        assert_eq!(history.len(), 1);
        assert!(history[0].completed);
        assert_eq!(history[0].duration, 5);
        assert_eq!(history[0].target_duration, Some(5));

        let sent = fx.notifier.sent_notifications();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, COMPLETION_TITLE);
        assert_eq!(
            sent[0].options.body.as_deref(),
            Some("タイマー 1が完了しました！")
        );

        // No further ticks after completion
        elapse(3).await;
        assert_eq!(fx.history.len(), 1);
        assert_eq!(fx.notifier.sent_notifications().len(), 1);

        let mut ticks = 0;
        let mut completions = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                TimerEvent::Ticked { .. } => ticks += 1,
                TimerEvent::Completed { .. } => completions += 1,
            }
        }
        assert_eq!((ticks, completions), (4, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_plays_alert() {
        let fx = Fixture::new();
        fx.player.fail_sounds(true);
        fx.registry.set_time(1, None);
        fx.registry.start(None);

        elapse(1).await;
        assert_eq!(
            fx.player.calls(),
            vec![
                AlertCall::Sound("default".to_string()),
                AlertCall::Tone,
                AlertCall::Vibrate(sound::COMPLETION_VIBRATION.to_vec()),
            ]
        );
        // A failing sound never blocks history or notification
        assert_eq!(fx.history.len(), 1);
        assert_eq!(fx.notifier.sent_notifications().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_permission_still_records_history() {
        let fx = Fixture::new();
        fx.notifier.set_permission(Permission::Denied);
        fx.settings.toggle_sound();
        fx.registry.set_time(2, None);
        fx.registry.start(None);

        elapse(2).await;
        assert_eq!(fx.history.len(), 1);
        assert!(fx.notifier.sent_notifications().is_empty());
        assert!(fx.player.calls().iter().all(|c| matches!(c, AlertCall::Vibrate(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countup_keeps_running() {
        let fx = Fixture::new();
        fx.registry.set_mode(TimerMode::Countup, None);
        assert!(fx.registry.start(None));

        elapse(3).await;
        let timer = fx.registry.active_timer();
        assert_eq!(timer.state.remaining_seconds, 3);
        assert!(timer.state.is_running);
        assert!(fx.history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_preserves_remaining_and_resume_continues() {
        let fx = Fixture::new();
        fx.registry.set_time(10, None);
        fx.registry.start(None);
        elapse(2).await;

        assert!(fx.registry.pause(None));
        assert!(!fx.registry.pause(None));
        let timer = fx.registry.active_timer();
        assert!(timer.state.is_paused && !timer.state.is_running);
        assert_eq!(timer.state.remaining_seconds, 8);
        assert!(!fx.registry.is_ticking(None));

        elapse(5).await;
        assert_eq!(fx.registry.active_timer().state.remaining_seconds, 8);

        assert!(fx.registry.start(None));
        elapse(3).await;
        assert_eq!(fx.registry.active_timer().state.remaining_seconds, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_and_stop() {
        let fx = Fixture::new();
        fx.registry.set_time(10, None);
        fx.registry.start(None);
        elapse(4).await;

        assert!(fx.registry.stop(None));
        let timer = fx.registry.active_timer();
        assert!(timer.state.is_idle());
        assert_eq!(timer.state.remaining_seconds, 6);
        assert!(!fx.registry.is_ticking(None));

        fx.registry.start(None);
        elapse(1).await;
        assert!(fx.registry.reset(None));
        let timer = fx.registry.active_timer();
        assert!(timer.state.is_idle());
        assert_eq!(timer.state.remaining_seconds, 10);

        // Explicit stops never record history
        assert!(fx.history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_ignored_while_running() {
        let fx = Fixture::new();
        fx.registry.set_time(10, None);
        fx.registry.start(None);

        assert!(!fx.registry.set_time(99, None));
        assert!(!fx.registry.set_mode(TimerMode::Countup, None));
        assert!(fx.registry.set_label("Pasta", None));

        let timer = fx.registry.active_timer();
        assert_eq!(timer.state.total_seconds, 10);
        assert_eq!(timer.state.mode, TimerMode::Countdown);
        assert_eq!(timer.label, "Pasta");
    }

    #[test]
    fn test_set_mode_countup_clears_durations() {
        let fx = Fixture::new();
        fx.registry.set_time(300, None);
        assert!(fx.registry.set_mode(TimerMode::Countup, None));

        let state = fx.registry.active_timer().state;
        assert_eq!(state.mode, TimerMode::Countup);
        assert_eq!(state.total_seconds, 0);
        assert_eq!(state.remaining_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_tick_independently() {
        let fx = Fixture::new();
        fx.registry.set_time(2, Some(0));
        fx.registry.add_timer(Some("long"));
        fx.registry.set_time(10, None);

        fx.registry.start(Some(0));
        fx.registry.start(Some(1));
        elapse(3).await;

        let timers = fx.registry.timers();
        assert!(timers[0].state.is_idle());
        assert_eq!(timers[1].state.remaining_seconds, 7);
        assert!(timers[1].state.is_running);
        assert_eq!(fx.registry.running_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removing_running_timer_retracts_tick() {
        let fx = Fixture::new();
        fx.registry.add_timer(Some("doomed"));
        fx.registry.set_time(2, None);
        fx.registry.start(None);

        assert!(fx.registry.remove_timer(1));
        elapse(3).await;
        assert!(fx.history.is_empty());
        assert!(fx.notifier.sent_notifications().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_load_round_trip_forces_idle() {
        let fx = Fixture::new();
        fx.registry.set_time(60, None);
        fx.registry.add_timer(Some("counting"));
        fx.registry.set_mode(TimerMode::Countup, None);
        fx.registry.start(None);
        elapse(2).await;
        fx.registry.save();
        let before = fx.registry.timers();

        let restored = Fixture::with_store(Arc::clone(&fx.store));
        restored.registry.load();

        let after = restored.registry.timers();
        assert_eq!(after.len(), 2);
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.label, b.label);
            assert_eq!(a.state.mode, b.state.mode);
            assert_eq!(a.state.total_seconds, b.state.total_seconds);
            assert_eq!(a.state.remaining_seconds, b.state.remaining_seconds);
            assert!(a.state.is_idle());
        }
        assert_eq!(after[1].state.remaining_seconds, 2);
        assert_eq!(restored.registry.active_index(), 1);
        assert_eq!(restored.registry.counter(), 2);
        assert!(!restored.registry.is_ticking(Some(1)));
    }

    #[test]
    fn test_load_rejects_out_of_range_active_index() {
        let fx = Fixture::new();
        fx.store
            .set(
                TIMERS_KEY,
                r#"[{"id":"timer-a","label":"A","state":{"mode":"countdown","totalSeconds":5,
                    "remainingSeconds":5,"isRunning":true,"isPaused":false}}]"#,
            )
            .unwrap();
        fx.store.set(ACTIVE_INDEX_KEY, "7").unwrap();
        fx.store.set(COUNTER_KEY, "9").unwrap();

        fx.registry.load();
        assert_eq!(fx.registry.active_index(), 0);
        assert_eq!(fx.registry.counter(), 9);
        assert!(fx.registry.active_timer().state.is_idle());
    }

    #[test]
    fn test_load_ignores_corrupt_timers() {
        let fx = Fixture::new();
        let original = fx.registry.active_timer();
        fx.store.set(TIMERS_KEY, "[{broken").unwrap();

        fx.registry.load();
        assert_eq!(fx.registry.timers(), vec![original]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_reassigns_duplicate_ids() {
        let fx = Fixture::new();
        let blob = serde_json::json!([
            {"id": "timer-x", "label": "A", "state": {"mode": "countdown", "totalSeconds": 10, "remainingSeconds": 10, "isRunning": false, "isPaused": false}},
            {"id": "timer-x", "label": "B", "state": {"mode": "countdown", "totalSeconds": 8, "remainingSeconds": 8, "isRunning": false, "isPaused": false}},
        ]);
        fx.store.set(TIMERS_KEY, &blob.to_string()).unwrap();

        fx.registry.load();
        let timers = fx.registry.timers();
        assert_eq!(timers[0].id, "timer-x");
        assert_ne!(timers[1].id, "timer-x");
        assert!(timers[1].id.starts_with("timer-"));

        assert!(fx.registry.start(Some(1)));
        elapse(8).await;

        let b = fx.registry.timer(Some(1)).unwrap();
        assert!(b.state.is_idle());
        assert_eq!(b.state.remaining_seconds, 0);
        assert!(!fx.registry.is_ticking(Some(1)));
        assert_eq!(fx.history.entries()[0].label, "B");
        assert_eq!(fx.registry.timer(Some(0)).unwrap().state.remaining_seconds, 10);
    }

    #[test]
    fn test_saved_keys() {
        let fx = Fixture::new();
        fx.registry.add_timer(None);

        assert_eq!(fx.store.get(ACTIVE_INDEX_KEY).unwrap().as_deref(), Some("1"));
        assert_eq!(fx.store.get(COUNTER_KEY).unwrap().as_deref(), Some("2"));
        let raw = fx.store.get(TIMERS_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(2));
        assert!(json[0].get("tick").is_none());
        assert_eq!(json[1]["state"]["mode"], "countdown");
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_retracts_ticks() {
        let fx = Fixture::new();
        fx.registry.set_time(3, None);
        fx.registry.start(None);

        fx.registry.shutdown();
        assert!(!fx.registry.is_ticking(None));
        assert!(fx.registry.active_timer().state.is_paused);

        elapse(5).await;
        assert!(fx.history.is_empty());
        assert_eq!(fx.registry.active_timer().state.remaining_seconds, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_registry_ends_tick_tasks() {
        let fx = Fixture::new();
        fx.registry.set_time(2, None);
        fx.registry.start(None);
        let Fixture {
            registry, history, ..
        } = fx;
        drop(registry);

        elapse(3).await;
        assert!(history.is_empty());
    }
}
