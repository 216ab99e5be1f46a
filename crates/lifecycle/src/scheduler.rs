use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use tarif_core::errors::ApplicationError;

/// Work the hosting process runs on a fixed cadence.
#[async_trait]
pub trait RecurringTask: Send + Sync {
    fn name(&self) -> &str;

    async fn run_once(&self) -> Result<(), ApplicationError>;
}

/// Owns one tokio task per registration. A failing run is logged and the task stays scheduled.
pub struct Scheduler {
    shutdown: watch::Sender<bool>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { shutdown, handles: Vec::new() }
    }

    /// Starts `task` immediately and then every `every`. Must be called inside a tokio runtime.
    pub fn register(&mut self, task: Arc<dyn RecurringTask>, every: Duration) {
        let name = task.name().to_string();
        let every = every.max(Duration::from_millis(1));
        let shutdown = self.shutdown.subscribe();

        info!(
            event_name = "scheduler.task.registered",
            task = %name,
            interval_secs = every.as_secs(),
            "recurring task registered"
        );
        let handle = tokio::spawn(drive(task, every, shutdown));
        self.handles.push((name, handle));
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.handles.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Signals every task to stop and waits for in-flight runs to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.handles {
            if let Err(error) = handle.await {
                warn!(
                    event_name = "scheduler.task.aborted",
                    task = %name,
                    error = %error,
                    "recurring task ended abnormally"
                );
            }
        }
    }
}

async fn drive(task: Arc<dyn RecurringTask>, every: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(error) = task.run_once().await {
                    warn!(
                        event_name = "scheduler.task.failed",
                        task = task.name(),
                        error = %error,
                        "recurring task run failed"
                    );
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    debug!(event_name = "scheduler.task.stopped", task = task.name(), "recurring task stopped");
}
