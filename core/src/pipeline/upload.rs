use crate::prelude::StageResult;
use crate::telemetry::log::LogManager;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Pushes an artifact to the dashboard's file store. Implementations also
/// publish a reference to the uploaded file.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, path: &Path) -> StageResult<()>;
}

pub struct UploadStage {
    uploader: Arc<dyn Uploader>,
    logger: LogManager,
}

impl UploadStage {
    pub fn new(uploader: Arc<dyn Uploader>) -> Self {
        Self {
            uploader,
            logger: LogManager::new("upload"),
        }
    }

    pub async fn execute(&self, path: &Path) -> StageResult<()> {
        self.uploader.upload(path).await?;
        self.logger.record(&format!("uploaded {}", path.display()));
        Ok(())
    }
}
