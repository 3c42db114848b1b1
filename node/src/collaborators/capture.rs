use crate::collaborators::command::CommandSpec;
use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use log::debug;
use sdrcore::pipeline::CaptureDevice;
use sdrcore::prelude::{StageError, StageResult};
use std::fmt::Display;
use std::path::{Path, PathBuf};

const STAMP_FORMAT: &str = "%Y-%m-%d_%H.%M.%S";

/// Second-resolution stamp, so recordings within the same minute keep
/// distinct names.
pub fn stamp<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format(STAMP_FORMAT).to_string()
}

/// Runs the configured capture program (tuner, demodulator and encoder) and
/// hands back the encoded recording.
pub struct CommandCapture {
    command: CommandSpec,
    recordings_dir: PathBuf,
}

impl CommandCapture {
    pub fn new(command: CommandSpec, recordings_dir: PathBuf) -> Self {
        Self {
            command,
            recordings_dir,
        }
    }

    pub fn artifact_path(&self, frequency_mhz: f64, stamp: &str) -> PathBuf {
        self.recordings_dir
            .join(format!("Recording_{}_{}MHz.mp3", stamp, frequency_mhz))
    }
}

async fn ensure_artifact(path: &Path) -> StageResult<()> {
    let metadata = tokio::fs::metadata(path).await.map_err(|err| {
        StageError::Command(format!("capture produced no {}: {}", path.display(), err))
    })?;
    if metadata.len() == 0 {
        return Err(StageError::Command(format!(
            "capture produced an empty {}",
            path.display()
        )));
    }
    Ok(())
}

#[async_trait]
impl CaptureDevice for CommandCapture {
    async fn capture(&self, frequency_mhz: f64, duration_secs: u32) -> StageResult<PathBuf> {
        tokio::fs::create_dir_all(&self.recordings_dir).await?;
        let output = self.artifact_path(frequency_mhz, &stamp(&Local::now()));

        let result = self
            .command
            .run(&[
                ("frequency", frequency_mhz.to_string()),
                ("duration", duration_secs.to_string()),
                ("output", output.display().to_string()),
            ])
            .await
            .map_err(|err| StageError::Command(err.to_string()))?;
        debug!("capture stdout: {}", result.stdout.trim());

        ensure_artifact(&output).await?;
        Ok(output)
    }
}
