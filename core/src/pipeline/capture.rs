use crate::prelude::{DashboardParameters, StageError, StageResult};
use crate::telemetry::log::LogManager;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Extra seconds granted to the capture command to cover process startup.
pub const DEFAULT_SETUP_ALLOWANCE: Duration = Duration::from_secs(2);

/// Runs the radio capture and encoding; returns the produced artifact.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn capture(&self, frequency_mhz: f64, duration_secs: u32) -> StageResult<PathBuf>;
}

pub struct CaptureStage {
    device: Arc<dyn CaptureDevice>,
    setup_allowance: Duration,
    logger: LogManager,
}

impl CaptureStage {
    pub fn new(device: Arc<dyn CaptureDevice>, setup_allowance: Duration) -> Self {
        Self {
            device,
            setup_allowance,
            logger: LogManager::new("capture"),
        }
    }

    pub fn padded_duration(&self, duration_secs: u32) -> u32 {
        let allowance = u32::try_from(self.setup_allowance.as_secs()).unwrap_or(u32::MAX);
        duration_secs.saturating_add(allowance)
    }

    pub async fn execute(&self, params: &DashboardParameters) -> StageResult<PathBuf> {
        if !params.frequency_mhz.is_finite() || params.frequency_mhz <= 0.0 {
            return Err(StageError::InvalidInput(format!(
                "frequency {} MHz",
                params.frequency_mhz
            )));
        }
        if params.duration_secs == 0 {
            return Err(StageError::InvalidInput("zero-length recording".into()));
        }

        let duration = self.padded_duration(params.duration_secs);
        self.logger.record(&format!(
            "recording {:.1} MHz for {}s ({}s requested)",
            params.frequency_mhz, duration, params.duration_secs
        ));
        let path = self.device.capture(params.frequency_mhz, duration).await?;
        self.logger
            .record(&format!("artifact written to {}", path.display()));
        Ok(path)
    }
}
