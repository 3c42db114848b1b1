use crate::advertisement::AdvertisementRecord;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::time::Instant;

/// Recording parameters and control flags held by the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardParameters {
    pub frequency_mhz: f64,
    pub duration_secs: u32,
    pub save_to_removable: bool,
    pub emergency_flag_set: bool,
}

/// Where a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerSource {
    Beacon,
    Dashboard,
}

#[derive(Debug, Clone)]
pub enum TriggerPayload {
    Advertisement(AdvertisementRecord),
    Parameters(DashboardParameters),
}

/// A candidate event handed to the coordinator. Consumed exactly once.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub source: TriggerSource,
    pub timestamp: Instant,
    pub payload: TriggerPayload,
}

impl TriggerEvent {
    pub fn beacon(record: AdvertisementRecord) -> Self {
        Self {
            source: TriggerSource::Beacon,
            timestamp: Instant::now(),
            payload: TriggerPayload::Advertisement(record),
        }
    }

    pub fn dashboard(params: DashboardParameters) -> Self {
        Self {
            source: TriggerSource::Dashboard,
            timestamp: Instant::now(),
            payload: TriggerPayload::Parameters(params),
        }
    }
}

/// Ordered steps of one recording run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageKind {
    Capture,
    Upload,
    Transfer,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageKind::Capture => "capture",
            StageKind::Upload => "upload",
            StageKind::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

/// Outcome of one pipeline run. `stage` is the last stage attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub stage: StageKind,
    pub success: bool,
    pub error_detail: Option<String>,
    pub output_path: Option<PathBuf>,
}

impl PipelineResult {
    pub fn succeeded(stage: StageKind, output_path: PathBuf) -> Self {
        Self {
            stage,
            success: true,
            error_detail: None,
            output_path: Some(output_path),
        }
    }

    pub fn failed(stage: StageKind, error: &StageError, output_path: Option<PathBuf>) -> Self {
        Self {
            stage,
            success: false,
            error_detail: Some(error.to_string()),
            output_path,
        }
    }

    /// One-line form used for the dashboard status variable.
    pub fn summary(&self) -> String {
        match (self.success, &self.error_detail) {
            (true, _) => format!("{} ok", self.stage),
            (false, Some(detail)) => format!("{} failed: {}", self.stage, detail),
            (false, None) => format!("{} failed", self.stage),
        }
    }
}

/// Failure of a single pipeline stage.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("command failed: {0}")]
    Command(String),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Mount(#[from] MountError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Removable device could not be mounted or released.
#[derive(thiserror::Error, Debug)]
pub enum MountError {
    #[error("mount of {device} at {mount_point} failed: {detail}")]
    Mount {
        device: String,
        mount_point: String,
        detail: String,
    },
    #[error("unmount of {mount_point} failed: {detail}")]
    Unmount { mount_point: String, detail: String },
    #[error("mount table unreadable: {0}")]
    MountTable(String),
}

/// Dashboard could not be reached or answered with garbage.
#[derive(thiserror::Error, Debug)]
pub enum NetworkError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("dashboard returned status {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Malformed(String),
}

pub type StageResult<T> = Result<T, StageError>;
