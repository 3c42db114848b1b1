//! Capture → upload → optional transfer, run strictly in order.
//!
//! A failing stage ends the run and is reported through [`PipelineResult`];
//! nothing here panics or propagates an error to the caller.

pub mod capture;
pub mod transfer;
pub mod upload;

pub use capture::{CaptureDevice, CaptureStage, DEFAULT_SETUP_ALLOWANCE};
pub use transfer::{RemovableStorage, TransferStage};
pub use upload::{UploadStage, Uploader};

use crate::prelude::{DashboardParameters, PipelineResult, StageKind};
use crate::telemetry::log::LogManager;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// What the coordinator invokes once per accepted trigger.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn run(&self, params: &DashboardParameters) -> PipelineResult;
}

#[async_trait]
impl<T: Pipeline + ?Sized> Pipeline for Arc<T> {
    async fn run(&self, params: &DashboardParameters) -> PipelineResult {
        (**self).run(params).await
    }
}

pub struct RecordingPipeline {
    capture: CaptureStage,
    upload: UploadStage,
    transfer: TransferStage,
    logger: LogManager,
}

impl RecordingPipeline {
    pub fn new(
        capture: Arc<dyn CaptureDevice>,
        uploader: Arc<dyn Uploader>,
        storage: Arc<dyn RemovableStorage>,
    ) -> Self {
        Self::with_setup_allowance(capture, uploader, storage, DEFAULT_SETUP_ALLOWANCE)
    }

    pub fn with_setup_allowance(
        capture: Arc<dyn CaptureDevice>,
        uploader: Arc<dyn Uploader>,
        storage: Arc<dyn RemovableStorage>,
        setup_allowance: Duration,
    ) -> Self {
        Self {
            capture: CaptureStage::new(capture, setup_allowance),
            upload: UploadStage::new(uploader),
            transfer: TransferStage::new(storage),
            logger: LogManager::new("pipeline"),
        }
    }

    fn report(&self, result: PipelineResult) -> PipelineResult {
        if result.success {
            self.logger.record(&result.summary());
        } else {
            self.logger.warn(&result.summary());
        }
        result
    }
}

#[async_trait]
impl Pipeline for RecordingPipeline {
    async fn run(&self, params: &DashboardParameters) -> PipelineResult {
        let artifact = match self.capture.execute(params).await {
            Ok(path) => path,
            Err(err) => return self.report(PipelineResult::failed(StageKind::Capture, &err, None)),
        };

        if let Err(err) = self.upload.execute(&artifact).await {
            return self.report(PipelineResult::failed(
                StageKind::Upload,
                &err,
                Some(artifact),
            ));
        }

        if !params.save_to_removable {
            return self.report(PipelineResult::succeeded(StageKind::Upload, artifact));
        }

        match self.transfer.execute(&artifact).await {
            Ok(_) => self.report(PipelineResult::succeeded(StageKind::Transfer, artifact)),
            Err(err) => self.report(PipelineResult::failed(
                StageKind::Transfer,
                &err,
                Some(artifact),
            )),
        }
    }
}
