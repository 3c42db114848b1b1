use crate::collaborators::command::CommandSpec;
use async_trait::async_trait;
use log::debug;
use sdrcore::advertisement::RawAdvertisement;
use sdrcore::listener::{AdvertisementSource, ScanError};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout};

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum LineError {
    #[error("expected '<company id> <payload>', got {0:?}")]
    Shape(String),
    #[error("bad company id: {0}")]
    CompanyId(String),
    #[error("bad payload hex: {0}")]
    Payload(#[from] hex::FromHexError),
}

fn strip_prefix(field: &str) -> &str {
    field
        .strip_prefix("0x")
        .or_else(|| field.strip_prefix("0X"))
        .unwrap_or(field)
}

/// Parses one helper line: `<company id hex> <payload hex>`.
pub fn parse_line(line: &str) -> Result<RawAdvertisement, LineError> {
    let mut fields = line.split_whitespace();
    let (company, payload) = match (fields.next(), fields.next(), fields.next()) {
        (Some(company), Some(payload), None) => (company, payload),
        _ => return Err(LineError::Shape(line.to_string())),
    };
    let company_id = u16::from_str_radix(strip_prefix(company), 16)
        .map_err(|_| LineError::CompanyId(company.to_string()))?;
    let data = hex::decode(strip_prefix(payload))?;
    Ok(RawAdvertisement { company_id, data })
}

/// Scans through an external helper that prints manufacturer data to stdout.
pub struct CommandScanner {
    command: CommandSpec,
    child: Option<Child>,
    lines: Option<Lines<BufReader<ChildStdout>>>,
}

impl CommandScanner {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            child: None,
            lines: None,
        }
    }
}

#[async_trait]
impl AdvertisementSource for CommandScanner {
    async fn start(&mut self) -> Result<(), ScanError> {
        self.stop().await;
        let mut child = self
            .command
            .command(&[])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ScanError::Unavailable(format!("{}: {}", self.command.program, err)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ScanError::Unavailable("helper stdout not captured".into()))?;
        self.lines = Some(BufReader::new(stdout).lines());
        self.child = Some(child);
        Ok(())
    }

    async fn stop(&mut self) {
        self.lines = None;
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill().await {
                debug!("scanner helper already gone: {}", err);
            }
        }
    }

    async fn next_advertisement(&mut self) -> Result<Option<RawAdvertisement>, ScanError> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| ScanError::Unavailable("scan not started".into()))?;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(raw) => return Ok(Some(raw)),
                Err(err) => debug!("ignoring helper output: {}", err),
            }
        }
        Ok(None)
    }
}
