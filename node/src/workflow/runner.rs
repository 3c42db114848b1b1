use crate::collaborators::{
    CommandCapture, CommandHazardFeed, CommandScanner, CommandUploader, HttpDashboard,
    MountedStorage,
};
use crate::generator::SimulatedBeacon;
use crate::status_bridge::StatusBridge;
use crate::workflow::config::NodeConfig;
use anyhow::Context;
use log::{info, warn};
use sdrcore::dashboard::DashboardClient;
use sdrcore::listener::{AdvertisementListener, AdvertisementSource, ListenerConfig};
use sdrcore::pipeline::RecordingPipeline;
use sdrcore::poller::DashboardPoller;
use sdrcore::publisher::PeriodicPublisher;
use sdrcore::{Coordinator, Shutdown, TriggerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which optional parts of the node are switched on.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunMode {
    pub simulate: bool,
    pub serve: bool,
    pub once: bool,
}

/// Wires the collaborators together and drives the node until shutdown.
pub struct Runner {
    config: NodeConfig,
    mode: RunMode,
}

impl Runner {
    pub fn new(config: NodeConfig, mode: RunMode) -> Self {
        Self { config, mode }
    }

    fn pipeline(&self) -> RecordingPipeline {
        let capture = &self.config.capture;
        let transfer = &self.config.transfer;
        let storage = MountedStorage::new(
            transfer.device.clone(),
            transfer.mount_point.clone(),
            transfer.mount_command.clone(),
            transfer.unmount_command.clone(),
        )
        .with_mounts_table(transfer.mounts_table.clone());

        RecordingPipeline::with_setup_allowance(
            Arc::new(CommandCapture::new(
                capture.command.clone(),
                capture.recordings_dir.clone(),
            )),
            Arc::new(CommandUploader::new(self.config.upload.command.clone())),
            Arc::new(storage),
            Duration::from_secs(capture.setup_allowance_secs),
        )
    }

    /// Returns the number of completed recordings. Only startup problems are
    /// errors; everything after that is logged and survived.
    pub async fn run(&self, shutdown: Shutdown) -> anyhow::Result<usize> {
        let dashboard: Arc<dyn DashboardClient> = Arc::new(
            HttpDashboard::new(
                &self.config.dashboard.base_url,
                &self.config.dashboard.device_token,
                Duration::from_secs(self.config.dashboard.timeout_secs.max(1)),
            )
            .context("building dashboard client")?,
        );

        let mut coordinator =
            Coordinator::new(dashboard.clone(), self.pipeline(), self.config.cooldown());
        if self.mode.once {
            coordinator = coordinator.with_run_limit(1);
        }
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let mut workers = Vec::new();

        let listener_config = self.config.listener_config();
        let listener = if self.mode.simulate {
            info!("[node] using simulated beacon");
            let beacon = SimulatedBeacon::new(self.config.simulation.clone());
            spawn_listener(beacon, listener_config, tx.clone(), shutdown.child()).await
        } else {
            let scanner = CommandScanner::new(self.config.beacon.scanner.clone());
            spawn_listener(scanner, listener_config, tx.clone(), shutdown.child()).await
        };
        workers.push(listener.context("starting advertisement listener")?);

        let poller = DashboardPoller::new(dashboard.clone(), self.config.poll_interval());
        workers.push(tokio::spawn(poller.run(tx, shutdown.child())));

        let hazards = &self.config.hazards;
        if hazards.enabled {
            let publisher = PeriodicPublisher::new(
                Arc::new(CommandHazardFeed::new(hazards.command.clone())),
                dashboard,
                hazards.filter.clone(),
                Duration::from_secs(hazards.interval_secs.max(1)),
            );
            workers.push(tokio::spawn(publisher.run(shutdown.child())));
        }

        if self.mode.serve {
            let bridge = StatusBridge::new(coordinator.subscribe(), coordinator.metrics());
            let (_, server) = bridge
                .spawn(self.config.status.bind, shutdown.child())
                .context("starting status bridge")?;
            workers.push(server);
        }

        let metrics = coordinator.metrics();
        let runs = coordinator.run(rx, shutdown.child()).await;
        shutdown.trigger();
        for worker in workers {
            if let Err(err) = worker.await {
                warn!("[node] worker ended abnormally: {}", err);
            }
        }
        info!("[node] shut down, metrics {:?}", metrics.snapshot());
        Ok(runs)
    }
}

async fn spawn_listener<S>(
    source: S,
    config: ListenerConfig,
    tx: mpsc::Sender<TriggerEvent>,
    shutdown: Shutdown,
) -> anyhow::Result<JoinHandle<()>>
where
    S: AdvertisementSource + 'static,
{
    let listener = AdvertisementListener::start(source, config).await?;
    Ok(tokio::spawn(listener.run(tx, shutdown)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::command::CommandSpec;
    use crate::generator::BeaconConfig;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use warp::Filter;

    fn dashboard_stub(posted: Arc<Mutex<Vec<Value>>>) -> String {
        let read = warp::path("data").and(warp::get()).map(|| {
            warp::reply::json(&json!({"status": true, "result": [
                {"variable": "frequency", "value": "101.1"},
                {"variable": "seconds", "value": "1"},
                {"variable": "saveMP3", "value": "false"},
                {"variable": "emergency", "value": "false"}
            ]}))
        });
        let write = warp::path("data")
            .and(warp::post())
            .and(warp::body::json())
            .map(move |body: Value| {
                posted.lock().unwrap().push(body);
                warp::reply::json(&json!({"status": true}))
            });
        let (addr, server) = warp::serve(read.or(write)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{}", addr)
    }

    fn bench_config(base_url: String, recordings: &std::path::Path) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.dashboard.base_url = base_url;
        config.dashboard.poll_secs = 60;
        config.capture.command =
            CommandSpec::new("sh", &["-c", "printf audio > \"$0\"", "{output}"]);
        config.capture.recordings_dir = recordings.to_path_buf();
        config.capture.setup_allowance_secs = 0;
        config.upload.command = CommandSpec::new("true", &[]);
        config.hazards.enabled = false;
        config.simulation = BeaconConfig {
            interval_secs: 1,
            burst_len: 3,
            spacing_ms: 10,
            foreign_ratio: 0.0,
            truncated_ratio: 0.0,
            ..Default::default()
        };
        config
    }

    #[tokio::test]
    async fn simulated_beacon_drives_one_recording() {
        let posted = Arc::new(Mutex::new(Vec::new()));
        let base_url = dashboard_stub(posted.clone());
        let recordings = tempfile::tempdir().unwrap();
        let runner = Runner::new(
            bench_config(base_url, recordings.path()),
            RunMode {
                simulate: true,
                serve: false,
                once: true,
            },
        );

        let runs = tokio::time::timeout(Duration::from_secs(20), runner.run(Shutdown::new()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(runs, 1);
        assert_eq!(std::fs::read_dir(recordings.path()).unwrap().count(), 1);
        let variables: Vec<String> = posted
            .lock()
            .unwrap()
            .iter()
            .map(|body| body[0]["variable"].as_str().unwrap_or_default().to_string())
            .collect();
        assert!(variables.contains(&"location".to_string()));
        assert!(variables.contains(&"recording_status".to_string()));
    }

    #[tokio::test]
    async fn missing_scanner_is_a_startup_error() {
        let mut config = NodeConfig::default();
        config.beacon.scanner = CommandSpec::new("/nonexistent/ble-helper", &[]);
        config.hazards.enabled = false;
        let runner = Runner::new(config, RunMode::default());

        let err = runner.run(Shutdown::new()).await.unwrap_err();
        assert!(format!("{:#}", err).contains("starting advertisement listener"));
    }
}
