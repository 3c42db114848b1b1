use crate::dashboard::DashboardClient;
use crate::prelude::TriggerEvent;
use crate::shutdown::Shutdown;
use crate::telemetry::log::LogManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio::time::MissedTickBehavior;

/// Watches the dashboard emergency flag and turns it into triggers.
pub struct DashboardPoller {
    dashboard: Arc<dyn DashboardClient>,
    interval: Duration,
    logger: LogManager,
}

impl DashboardPoller {
    pub fn new(dashboard: Arc<dyn DashboardClient>, interval: Duration) -> Self {
        Self {
            dashboard,
            interval,
            logger: LogManager::new("poller"),
        }
    }

    /// One poll. Returns `false` once the coordinator has gone away.
    pub async fn poll_once(&self, tx: &Sender<TriggerEvent>) -> bool {
        let params = match self.dashboard.get_parameters().await {
            Ok(params) => params,
            Err(err) => {
                self.logger.warn(&format!("poll skipped: {}", err));
                return true;
            }
        };
        if !params.emergency_flag_set {
            return true;
        }

        self.logger.record("emergency flag raised on dashboard");
        let open = match tx.try_send(TriggerEvent::dashboard(params)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.logger.trace("coordinator busy, dashboard trigger dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        };

        if let Err(err) = self.dashboard.clear_emergency_flag().await {
            self.logger
                .warn(&format!("could not clear emergency flag: {}", err));
        }
        open
    }

    pub async fn run(self, tx: Sender<TriggerEvent>, shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {
                    if !self.poll_once(&tx).await {
                        self.logger.warn("trigger channel closed");
                        break;
                    }
                }
            }
        }
        self.logger.record("stopped");
    }
}
