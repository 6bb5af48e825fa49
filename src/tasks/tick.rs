//! Per-timer tick task

use std::{sync::Weak, time::Duration};

use tokio::{
    runtime::Handle,
    task::AbortHandle,
    time::{interval_at, Instant},
};
use tracing::debug;

use crate::state::registry::{RegistryShared, TickOutcome};

/// Ownership of a running timer's tick task
///
/// Dropping the handle aborts the task. The epoch identifies which start
/// the task belongs to so ticks from a superseded task are discarded.
#[derive(Debug)]
pub struct TickHandle {
    epoch: u64,
    abort: Option<AbortHandle>,
}

impl TickHandle {
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Give up ownership without aborting; the task is finishing on its own
    pub(crate) fn release(mut self) {
        self.abort = None;
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        if let Some(abort) = self.abort.take() {
            abort.abort();
        }
    }
}

/// Spawn the tick task for a timer. Returns `None` outside a tokio runtime.
pub(crate) fn spawn_ticker(
    registry: Weak<RegistryShared>,
    id: String,
    epoch: u64,
    period: Duration,
) -> Option<TickHandle> {
    let runtime = Handle::try_current().ok()?;
    let task = runtime.spawn(tick_task(registry, id, epoch, period));
    Some(TickHandle {
        epoch,
        abort: Some(task.abort_handle()),
    })
}

/// Background task that advances one timer every `period`
async fn tick_task(registry: Weak<RegistryShared>, id: String, epoch: u64, period: Duration) {
    debug!("Starting tick task for {} (epoch {})", id, epoch);

    // First firing one full period after start
    let mut interval = interval_at(Instant::now() + period, period);

    loop {
        interval.tick().await;

        let Some(registry) = registry.upgrade() else {
            debug!("Registry dropped, ending tick task for {}", id);
            break;
        };

        match registry.tick(&id, epoch) {
            TickOutcome::Continue => {}
            TickOutcome::Completed(timer) => {
                registry.finish_completion(timer).await;
                break;
            }
            TickOutcome::Stale => {
                debug!("Tick task for {} (epoch {}) superseded", id, epoch);
                break;
            }
        }
    }
}
