use crate::prelude::{DashboardParameters, NetworkError, PipelineResult};
use async_trait::async_trait;

/// Narrow view of the remote dashboard. Transport and format are up to the
/// implementation.
#[async_trait]
pub trait DashboardClient: Send + Sync {
    async fn get_parameters(&self) -> Result<DashboardParameters, NetworkError>;

    async fn set_emergency_flag(&self, set: bool) -> Result<(), NetworkError>;

    async fn publish_location(&self, lat: f64, lon: f64) -> Result<(), NetworkError>;

    /// Posts the number of fire and rescue incidents near the node.
    async fn publish_fire_count(&self, count: u32) -> Result<(), NetworkError>;

    async fn publish_summary(&self, items: &[String]) -> Result<(), NetworkError>;

    /// Reports the outcome of a recording run.
    async fn publish_result(&self, result: &PipelineResult) -> Result<(), NetworkError>;

    async fn clear_emergency_flag(&self) -> Result<(), NetworkError> {
        self.set_emergency_flag(false).await
    }
}
