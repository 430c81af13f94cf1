//! One-shot scheduled callbacks
//!
//! Each callback runs on its own tokio task after a sleep. This is not a
//! calendar scheduler: cron expressions are evaluated by the host, which
//! delivers `TimerEvent`s to `TimerRule`s.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::error::{RuleError, RuleResult};

/// When a scheduled callback should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// After a relative delay
    After(Duration),
    /// At an absolute wall-clock time; a time in the past runs immediately
    At(DateTime<Utc>),
}

impl Deadline {
    /// Delay from now until the deadline
    pub fn delay(&self) -> Duration {
        match self {
            Deadline::After(delay) => *delay,
            Deadline::At(when) => (*when - Utc::now()).to_std().unwrap_or(Duration::ZERO),
        }
    }
}

impl From<Duration> for Deadline {
    fn from(delay: Duration) -> Self {
        Deadline::After(delay)
    }
}

impl From<DateTime<Utc>> for Deadline {
    fn from(when: DateTime<Utc>) -> Self {
        Deadline::At(when)
    }
}

/// Handle to a pending callback
///
/// Cancelling is idempotent and safe after the callback has run.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: u64,
    cancelled: Arc<AtomicBool>,
    abort: AbortHandle,
}

impl TimerHandle {
    /// Scheduler-unique identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cancel the callback if it has not started yet
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            trace!(timer = self.id, "Cancelling timer");
        }
        self.abort.abort();
    }

    /// Check if `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Check if the timer task has completed, run or cancelled
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Creates one-shot timers on the current tokio runtime
#[derive(Debug, Default)]
pub struct Scheduler {
    next_id: AtomicU64,
}

impl Scheduler {
    /// Create a new scheduler
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once at `deadline`
    ///
    /// Fails when called outside a tokio runtime.
    pub fn schedule_once<F>(&self, deadline: impl Into<Deadline>, callback: F) -> RuleResult<TimerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = Handle::try_current()
            .map_err(|e| RuleError::Scheduling(format!("no tokio runtime: {}", e)))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let delay = deadline.into().delay();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);

        debug!(timer = id, delay_ms = delay.as_millis() as u64, "Scheduling timer");

        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if flag.load(Ordering::SeqCst) {
                trace!(timer = id, "Timer cancelled before running");
                return;
            }
            trace!(timer = id, "Timer fired");
            callback();
        });

        Ok(TimerHandle {
            id,
            cancelled,
            abort: task.abort_handle(),
        })
    }
}
