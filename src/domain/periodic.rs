//! Named repeating background tasks with an explicit stop.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// A task that runs `tick` every `period` until [`stop`](Self::stop) is called.
///
/// The first tick fires one full period after start. A tick in progress is
/// allowed to finish before the task exits.
pub struct PeriodicTask {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(task = name, period_secs = period.as_secs(), "Periodic task started");

            loop {
                tokio::select! {
                    _ = interval.tick() => tick().await,
                    _ = stop_rx.changed() => break,
                }
            }

            tracing::debug!(task = name, "Periodic task stopped");
        });

        Self {
            name,
            stop_tx,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signals the task and waits for it to exit.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);

        if let Err(e) = self.handle.await {
            tracing::error!(task = self.name, error = %e, "Periodic task panicked");
        }
    }
}
