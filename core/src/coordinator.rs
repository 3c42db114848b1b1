//! Single decision loop between the trigger sources and the pipeline.
//!
//! The coordinator is the only reader of the trigger channel and the only
//! caller of the pipeline. It awaits each run inline, so two recordings can
//! never overlap, and it alone owns the cooldown state.

use crate::advertisement::Coordinates;
use crate::dashboard::DashboardClient;
use crate::pipeline::Pipeline;
use crate::prelude::{DashboardParameters, PipelineResult, TriggerEvent, TriggerPayload};
use crate::shutdown::Shutdown;
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::MetricsRecorder;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoordinatorState {
    Idle,
    Cooling,
    Recording,
}

/// Time of the last completed recording plus the debounce window.
#[derive(Debug, Clone)]
pub struct CooldownState {
    last_trigger_time: Option<Instant>,
    cooldown: Duration,
}

impl CooldownState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_trigger_time: None,
            cooldown,
        }
    }

    pub fn is_satisfied(&self, at: Instant) -> bool {
        self.remaining(at).is_zero()
    }

    pub fn remaining(&self, at: Instant) -> Duration {
        match self.last_trigger_time {
            None => Duration::ZERO,
            Some(last) => self
                .cooldown
                .saturating_sub(at.saturating_duration_since(last)),
        }
    }

    fn mark(&mut self, at: Instant) {
        self.last_trigger_time = Some(at);
    }

    /// When the current window closes; `None` before the first recording.
    pub fn deadline(&self) -> Option<Instant> {
        self.last_trigger_time.map(|last| last + self.cooldown)
    }
}

/// What observers (status bridge, logs) see of the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub state: CoordinatorState,
    pub last_result: Option<PipelineResult>,
    #[serde(skip)]
    pub cooling_until: Option<Instant>,
}

impl CoordinatorStatus {
    /// State as of `at`: a closed cooldown window reads as `Idle` even if no
    /// trigger has arrived since.
    pub fn state_at(&self, at: Instant) -> CoordinatorState {
        match (self.state, self.cooling_until) {
            (CoordinatorState::Cooling, Some(until)) if at >= until => CoordinatorState::Idle,
            (state, _) => state,
        }
    }

    pub fn current_state(&self) -> CoordinatorState {
        self.state_at(Instant::now())
    }
}

/// Outcome of handling one trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Recorded(PipelineResult),
    Discarded { remaining: Duration },
    ParametersUnavailable,
}

pub struct Coordinator<P: Pipeline> {
    dashboard: Arc<dyn DashboardClient>,
    pipeline: P,
    cooldown: CooldownState,
    state: CoordinatorState,
    last_location: Option<Coordinates>,
    run_limit: Option<usize>,
    metrics: Arc<MetricsRecorder>,
    status: watch::Sender<CoordinatorStatus>,
    logger: LogManager,
}

impl<P: Pipeline> Coordinator<P> {
    pub fn new(dashboard: Arc<dyn DashboardClient>, pipeline: P, cooldown: Duration) -> Self {
        let (status, _) = watch::channel(CoordinatorStatus {
            state: CoordinatorState::Idle,
            last_result: None,
            cooling_until: None,
        });
        Self {
            dashboard,
            pipeline,
            cooldown: CooldownState::new(cooldown),
            state: CoordinatorState::Idle,
            last_location: None,
            run_limit: None,
            metrics: Arc::new(MetricsRecorder::new()),
            status,
            logger: LogManager::new("coordinator"),
        }
    }

    /// Stop after `runs` completed pipeline runs.
    pub fn with_run_limit(mut self, runs: usize) -> Self {
        self.run_limit = Some(runs);
        self
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorStatus> {
        self.status.subscribe()
    }

    pub fn state(&self) -> CoordinatorState {
        match self.state {
            CoordinatorState::Cooling if self.cooldown.is_satisfied(Instant::now()) => {
                CoordinatorState::Idle
            }
            state => state,
        }
    }

    fn set_state(&mut self, state: CoordinatorState, result: Option<PipelineResult>) {
        self.state = state;
        let cooling_until = match state {
            CoordinatorState::Cooling => self.cooldown.deadline(),
            _ => None,
        };
        self.status.send_modify(|status| {
            status.state = state;
            status.cooling_until = cooling_until;
            if result.is_some() {
                status.last_result = result;
            }
        });
    }

    async fn publish_location(&mut self, coords: Coordinates) {
        if self.last_location == Some(coords) {
            return;
        }
        match self.dashboard.publish_location(coords.lat, coords.lon).await {
            Ok(()) => self.last_location = Some(coords),
            Err(err) => self
                .logger
                .warn(&format!("location publish failed: {}", err)),
        }
    }

    async fn resolve_parameters(&self, payload: TriggerPayload) -> Option<DashboardParameters> {
        match payload {
            TriggerPayload::Parameters(params) => Some(params),
            TriggerPayload::Advertisement(_) => match self.dashboard.get_parameters().await {
                Ok(params) => Some(params),
                Err(err) => {
                    self.logger.warn(&format!(
                        "beacon trigger abandoned, no recording parameters: {}",
                        err
                    ));
                    None
                }
            },
        }
    }

    /// Applies the cooldown to one trigger and, if accepted, runs the
    /// pipeline to completion.
    pub async fn handle(&mut self, event: TriggerEvent) -> Decision {
        self.metrics.record_trigger();

        if let TriggerPayload::Advertisement(record) = &event.payload {
            if let Some(coords) = record.decoded_coordinates {
                self.publish_location(coords).await;
            }
        }

        let remaining = self.cooldown.remaining(event.timestamp);
        if !remaining.is_zero() {
            self.metrics.record_discarded(1);
            self.logger.trace(&format!(
                "{:?} trigger inside cooldown, {}s left",
                event.source,
                remaining.as_secs()
            ));
            return Decision::Discarded { remaining };
        }

        let source = event.source;
        let Some(params) = self.resolve_parameters(event.payload).await else {
            self.metrics.record_fetch_failure();
            self.set_state(CoordinatorState::Idle, None);
            return Decision::ParametersUnavailable;
        };

        self.logger.record(&format!(
            "{:?} trigger accepted: {:.1} MHz for {}s, removable copy {}",
            source, params.frequency_mhz, params.duration_secs, params.save_to_removable
        ));
        self.set_state(CoordinatorState::Recording, None);
        let result = self.pipeline.run(&params).await;
        self.cooldown.mark(Instant::now());
        self.metrics.record_recording(result.success);

        if let Err(err) = self.dashboard.publish_result(&result).await {
            self.logger
                .warn(&format!("could not report recording status: {}", err));
        }
        self.set_state(CoordinatorState::Cooling, Some(result.clone()));
        Decision::Recorded(result)
    }

    /// Throws away everything that queued up while a recording ran.
    fn drain(&self, rx: &mut mpsc::Receiver<TriggerEvent>) -> usize {
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            self.metrics.record_discarded(dropped);
            self.logger.trace(&format!(
                "discarded {} triggers received while recording",
                dropped
            ));
        }
        dropped
    }

    /// Returns the number of pipeline runs completed.
    pub async fn run(mut self, mut rx: mpsc::Receiver<TriggerEvent>, shutdown: Shutdown) -> usize {
        let mut runs = 0;
        self.logger.record(&format!(
            "ready, cooldown {}s",
            self.cooldown.cooldown.as_secs()
        ));
        loop {
            let cooled = match self.state {
                CoordinatorState::Cooling => self.cooldown.deadline(),
                _ => None,
            };
            let event = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
                _ = window_closed(cooled) => {
                    self.set_state(CoordinatorState::Idle, None);
                    continue;
                }
            };

            if let Decision::Recorded(_) = self.handle(event).await {
                self.drain(&mut rx);
                runs += 1;
                if self.run_limit.is_some_and(|limit| runs >= limit) {
                    self.logger.record("run limit reached");
                    break;
                }
            }
        }
        self.logger
            .record(&format!("stopped after {} recordings", runs));
        runs
    }
}

async fn window_closed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
