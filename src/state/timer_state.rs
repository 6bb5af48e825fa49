//! Timer state structure and management

use serde::{Deserialize, Serialize};

use crate::tasks::TickHandle;
use crate::utils::format_time;

/// Direction a timer counts in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    /// Remaining time decreases from a target to zero
    #[default]
    Countdown,
    /// Elapsed time increases without a target
    Countup,
}

/// Per-timer state; `remaining_seconds` holds elapsed time in countup mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub mode: TimerMode,
    pub total_seconds: u64,
    pub remaining_seconds: u64,
    pub is_running: bool,
    pub is_paused: bool,
}

impl TimerState {
    /// Create an idle countdown with no target
    pub fn new() -> Self {
        Self {
            mode: TimerMode::Countdown,
            total_seconds: 0,
            remaining_seconds: 0,
            is_running: false,
            is_paused: false,
        }
    }

    /// Neither running nor paused
    pub fn is_idle(&self) -> bool {
        !self.is_running && !self.is_paused
    }

    /// Whether `start` would be accepted
    pub fn can_start(&self) -> bool {
        !self.is_running && !(self.mode == TimerMode::Countdown && self.remaining_seconds == 0)
    }

    /// Advance by one second. Returns true when a countdown reaches zero.
    pub fn advance(&mut self) -> bool {
        match self.mode {
            TimerMode::Countdown => {
                self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
                self.remaining_seconds == 0
            }
            TimerMode::Countup => {
                self.remaining_seconds = self.remaining_seconds.saturating_add(1);
                false
            }
        }
    }

    pub fn mark_running(&mut self) {
        self.is_running = true;
        self.is_paused = false;
    }

    pub fn mark_paused(&mut self) {
        self.is_running = false;
        self.is_paused = true;
    }

    pub fn mark_stopped(&mut self) {
        self.is_running = false;
        self.is_paused = false;
    }

    /// Countdown progress in percent, 0 for countups or countdowns without a target
    pub fn progress(&self) -> f64 {
        if self.mode == TimerMode::Countdown && self.total_seconds > 0 {
            let done = self.total_seconds.saturating_sub(self.remaining_seconds);
            done as f64 / self.total_seconds as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Display string for the current counter value
    pub fn formatted(&self) -> String {
        format_time(self.remaining_seconds)
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of a timer, also its persisted form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub id: String,
    pub label: String,
    pub state: TimerState,
}

/// A timer owned by the registry
#[derive(Debug)]
pub struct Timer {
    pub id: String,
    pub label: String,
    pub state: TimerState,
    /// Live only while `state.is_running`
    pub(crate) tick: Option<TickHandle>,
}

impl Timer {
    pub fn new(id: String, label: String) -> Self {
        Self {
            id,
            label,
            state: TimerState::new(),
            tick: None,
        }
    }

    /// Rebuild a timer from its persisted form; never resumes ticking
    pub fn restore(snapshot: TimerSnapshot) -> Self {
        let mut state = snapshot.state;
        state.mark_stopped();
        Self {
            id: snapshot.id,
            label: snapshot.label,
            state,
            tick: None,
        }
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            id: self.id.clone(),
            label: self.label.clone(),
            state: self.state.clone(),
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.tick.is_some()
    }

    /// Retract the tick task, if any
    pub(crate) fn cancel_tick(&mut self) {
        self.tick = None;
    }
}
