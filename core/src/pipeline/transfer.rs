use crate::prelude::{MountError, StageResult};
use crate::telemetry::log::LogManager;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Removable device the recording is copied onto.
#[async_trait]
pub trait RemovableStorage: Send + Sync {
    async fn is_mounted(&self) -> Result<bool, MountError>;

    async fn mount(&self) -> Result<(), MountError>;

    /// Copies the artifact onto the mounted device and returns its new path.
    async fn copy_in(&self, artifact: &Path) -> StageResult<PathBuf>;

    async fn unmount(&self) -> Result<(), MountError>;
}

pub struct TransferStage {
    storage: Arc<dyn RemovableStorage>,
    logger: LogManager,
}

impl TransferStage {
    pub fn new(storage: Arc<dyn RemovableStorage>) -> Self {
        Self {
            storage,
            logger: LogManager::new("transfer"),
        }
    }

    /// Mounts if needed, copies, then always attempts to unmount. Unmount
    /// failure leaves the copy result untouched.
    pub async fn execute(&self, artifact: &Path) -> StageResult<PathBuf> {
        let mounted = match self.storage.is_mounted().await {
            Ok(mounted) => mounted,
            Err(err) => {
                self.logger
                    .warn(&format!("mount state unknown ({}), mounting", err));
                false
            }
        };
        if !mounted {
            self.storage.mount().await?;
            self.logger.record("device mounted");
        }

        let copied = self.storage.copy_in(artifact).await;

        match self.storage.unmount().await {
            Ok(()) => self.logger.record("device unmounted"),
            Err(err) => self
                .logger
                .warn(&format!("{}; unmount it manually", err)),
        }

        let destination = copied?;
        self.logger
            .record(&format!("copied to {}", destination.display()));
        Ok(destination)
    }
}
