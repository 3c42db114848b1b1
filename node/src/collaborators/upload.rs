use crate::collaborators::command::CommandSpec;
use async_trait::async_trait;
use log::debug;
use sdrcore::pipeline::Uploader;
use sdrcore::prelude::{StageError, StageResult};
use std::path::Path;

/// Hands the artifact to the upload program, which also posts the file link
/// to the dashboard.
pub struct CommandUploader {
    command: CommandSpec,
}

impl CommandUploader {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Uploader for CommandUploader {
    async fn upload(&self, path: &Path) -> StageResult<()> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| StageError::InvalidInput(format!("{} has no file name", path.display())))?;
        let output = self
            .command
            .run(&[("path", path.display().to_string()), ("file_name", file_name)])
            .await
            .map_err(|err| StageError::Command(err.to_string()))?;
        debug!("upload stdout: {}", output.stdout.trim());
        if !output.stderr.trim().is_empty() {
            debug!("upload stderr: {}", output.stderr.trim());
        }
        Ok(())
    }
}
