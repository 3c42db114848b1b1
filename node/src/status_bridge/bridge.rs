use crate::status_bridge::model::StatusModel;
use anyhow::{Context, Result};
use log::info;
use sdrcore::telemetry::MetricsRecorder;
use sdrcore::{CoordinatorStatus, Shutdown};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use warp::Filter;

/// Read-only HTTP view of the coordinator for bench work.
pub struct StatusBridge {
    status: watch::Receiver<CoordinatorStatus>,
    metrics: Arc<MetricsRecorder>,
}

impl StatusBridge {
    pub fn new(status: watch::Receiver<CoordinatorStatus>, metrics: Arc<MetricsRecorder>) -> Self {
        Self { status, metrics }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let status = self.status.clone();
        let metrics = self.metrics.clone();
        warp::path("status")
            .and(warp::path::end())
            .and(warp::get())
            .map(move || {
                let model = StatusModel::capture(&status.borrow(), metrics.snapshot());
                warp::reply::json(&model)
            })
    }

    /// Binds `addr` and serves until `shutdown` fires.
    pub fn spawn(self, addr: SocketAddr, shutdown: Shutdown) -> Result<(SocketAddr, JoinHandle<()>)> {
        let (bound, server) = warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, async move { shutdown.wait().await })
            .with_context(|| format!("failed to bind status bridge on {}", addr))?;
        info!("[status] serving on http://{}/status", bound);
        Ok((bound, tokio::spawn(server)))
    }
}
