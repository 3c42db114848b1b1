use sdrcore::telemetry::Metrics;
use sdrcore::{CoordinatorState, CoordinatorStatus, PipelineResult};
use serde::Serialize;

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusModel {
    pub state: CoordinatorState,
    pub last_result: Option<PipelineResult>,
    pub metrics: Metrics,
}

impl StatusModel {
    pub fn capture(status: &CoordinatorStatus, metrics: Metrics) -> Self {
        Self {
            state: status.current_state(),
            last_result: status.last_result.clone(),
            metrics,
        }
    }
}
