//! Timers and blocking work for plugins.
//!
//! Everything runs on the bot's single event loop, so a plugin must never
//! block it. [`run_in_thread`] moves blocking calls to tokio's blocking pool;
//! [`Timer`] schedules delayed or periodic work that can be cancelled.
//!
//! A plugin owns its timers. The old instance's `quit` runs before its
//! successor is created, so it stops the timer and keeps the time left:
//!
//! ```rust,ignore
//! async fn quit(&self) -> Result<(), BoxError> {
//!     *self.left.lock() = self.timer.stop();
//!     Ok(())
//! }
//!
//! // in `create`
//! let delay = old
//!     .as_deref()
//!     .and_then(|old| old.downcast_ref::<Reminder>())
//!     .and_then(|old| *old.left.lock())
//!     .unwrap_or(REMIND_AFTER);
//! timer.start(delay, remind);
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use banter_core::BoxError;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Runs blocking `f` on a worker thread and waits for its result.
pub async fn run_in_thread<F, T>(f: F) -> Result<T, BoxError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}

struct Running {
    token: CancellationToken,
    deadline: Arc<Mutex<Instant>>,
    task: JoinHandle<()>,
}

impl Running {
    fn is_alive(&self) -> bool {
        !self.token.is_cancelled() && !self.task.is_finished()
    }
}

/// A cancellable one-shot or periodic task.
///
/// Starting a timer that is already running does nothing; cancelling is
/// idempotent. Dropping the timer cancels it.
#[derive(Default)]
pub struct Timer {
    running: Mutex<Option<Running>>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` once after `delay`. Returns `false` if the timer was already
    /// running.
    pub fn start<F, Fut>(&self, delay: Duration, f: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(Running::is_alive) {
            return false;
        }

        let token = CancellationToken::new();
        let deadline = Arc::new(Mutex::new(Instant::now() + delay));
        let child = token.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    child.cancel();
                    f().await;
                }
            }
        });

        trace!(delay_ms = delay.as_millis() as u64, "Timer started");
        *running = Some(Running {
            token,
            deadline,
            task,
        });
        true
    }

    /// Runs `f` every `period`, the first time after one period. Returns
    /// `false` if the timer was already running.
    pub fn start_periodic<F, Fut>(&self, period: Duration, mut f: F) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(Running::is_alive) {
            return false;
        }

        let token = CancellationToken::new();
        let deadline = Arc::new(Mutex::new(Instant::now() + period));
        let child = token.clone();
        let next = Arc::clone(&deadline);
        let task = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticks.tick() => {
                        *next.lock() = Instant::now() + period;
                        f().await;
                    }
                }
            }
        });

        trace!(period_ms = period.as_millis() as u64, "Periodic timer started");
        *running = Some(Running {
            token,
            deadline,
            task,
        });
        true
    }

    /// Stops the timer. Returns whether it was running.
    pub fn cancel(&self) -> bool {
        match self.running.lock().take() {
            Some(running) => {
                let was_alive = running.is_alive();
                running.token.cancel();
                was_alive
            }
            None => false,
        }
    }

    /// Stops the timer and returns the time it had left, or `None` if it was
    /// not running.
    pub fn stop(&self) -> Option<Duration> {
        let running = self.running.lock().take()?;
        let left = running
            .is_alive()
            .then(|| running.deadline.lock().saturating_duration_since(Instant::now()));
        running.token.cancel();
        left
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().as_ref().is_some_and(Running::is_alive)
    }

    /// Time until the next run, or `None` if the timer is not running.
    pub fn remaining(&self) -> Option<Duration> {
        let running = self.running.lock();
        let running = running.as_ref().filter(|r| r.is_alive())?;
        let deadline = *running.deadline.lock();
        Some(deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.token.cancel();
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("running", &self.is_running())
            .field("remaining", &self.remaining())
            .finish()
    }
}
