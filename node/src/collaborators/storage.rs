use crate::collaborators::command::CommandSpec;
use async_trait::async_trait;
use sdrcore::pipeline::RemovableStorage;
use sdrcore::prelude::{MountError, StageError, StageResult};
use std::path::{Path, PathBuf};

/// USB stick (or any block device) mounted through external commands.
pub struct MountedStorage {
    device: String,
    mount_point: PathBuf,
    mount_command: CommandSpec,
    unmount_command: CommandSpec,
    mounts_table: PathBuf,
}

impl MountedStorage {
    pub fn new(
        device: String,
        mount_point: PathBuf,
        mount_command: CommandSpec,
        unmount_command: CommandSpec,
    ) -> Self {
        Self {
            device,
            mount_point,
            mount_command,
            unmount_command,
            mounts_table: PathBuf::from("/proc/mounts"),
        }
    }

    pub fn with_mounts_table(mut self, mounts_table: PathBuf) -> Self {
        self.mounts_table = mounts_table;
        self
    }

    fn vars(&self) -> [(&'static str, String); 2] {
        [
            ("device", self.device.clone()),
            ("mount_point", self.mount_point.display().to_string()),
        ]
    }
}

/// True if any line of a mounts table lists `mount_point` as its target.
pub fn table_lists(table: &str, mount_point: &Path) -> bool {
    table
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .any(|target| Path::new(target) == mount_point)
}

#[async_trait]
impl RemovableStorage for MountedStorage {
    async fn is_mounted(&self) -> Result<bool, MountError> {
        let table = tokio::fs::read_to_string(&self.mounts_table)
            .await
            .map_err(|err| MountError::MountTable(err.to_string()))?;
        Ok(table_lists(&table, &self.mount_point))
    }

    async fn mount(&self) -> Result<(), MountError> {
        let failed = |detail: String| MountError::Mount {
            device: self.device.clone(),
            mount_point: self.mount_point.display().to_string(),
            detail,
        };
        tokio::fs::create_dir_all(&self.mount_point)
            .await
            .map_err(|err| failed(err.to_string()))?;
        self.mount_command
            .run(&self.vars())
            .await
            .map_err(|err| failed(err.to_string()))?;
        Ok(())
    }

    async fn copy_in(&self, artifact: &Path) -> StageResult<PathBuf> {
        let file_name = artifact.file_name().ok_or_else(|| {
            StageError::InvalidInput(format!("{} has no file name", artifact.display()))
        })?;
        let destination = self.mount_point.join(file_name);
        tokio::fs::copy(artifact, &destination).await?;
        Ok(destination)
    }

    async fn unmount(&self) -> Result<(), MountError> {
        self.unmount_command
            .run(&self.vars())
            .await
            .map_err(|err| MountError::Unmount {
                mount_point: self.mount_point.display().to_string(),
                detail: err.to_string(),
            })?;
        Ok(())
    }
}
