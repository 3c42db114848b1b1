use crate::advertisement::{self, RawAdvertisement};
use crate::prelude::TriggerEvent;
use crate::shutdown::Shutdown;
use crate::telemetry::log::LogManager;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("scanner unavailable: {0}")]
    Unavailable(String),
    #[error("scanner io: {0}")]
    Io(#[from] std::io::Error),
}

/// The only error allowed to terminate the process.
#[derive(thiserror::Error, Debug)]
#[error("cannot start advertisement scanner: {0}")]
pub struct StartupError(#[from] pub ScanError);

/// Delivers raw advertisements from the radio.
#[async_trait]
pub trait AdvertisementSource: Send {
    async fn start(&mut self) -> Result<(), ScanError>;

    async fn stop(&mut self);

    /// Waits for the next advertisement. `Ok(None)` means the transport
    /// ended its scan and needs a restart.
    async fn next_advertisement(&mut self) -> Result<Option<RawAdvertisement>, ScanError>;
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub company_id: u16,
    pub scan_window: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            company_id: advertisement::DEFAULT_COMPANY_ID,
            scan_window: Duration::from_secs(10),
        }
    }
}

pub struct AdvertisementListener<S: AdvertisementSource> {
    source: S,
    config: ListenerConfig,
    logger: LogManager,
}

enum Scan {
    Received(RawAdvertisement),
    Restart,
    Cancelled,
}

impl<S: AdvertisementSource> AdvertisementListener<S> {
    /// Starts the transport; failure here is fatal to the process.
    pub async fn start(mut source: S, config: ListenerConfig) -> Result<Self, StartupError> {
        source.start().await?;
        let logger = LogManager::new("listener");
        logger.record(&format!(
            "scanning for company id 0x{:04X}",
            config.company_id
        ));
        Ok(Self {
            source,
            config,
            logger,
        })
    }

    /// Turns one raw advertisement into a trigger, if it qualifies.
    pub fn qualify(&self, raw: &RawAdvertisement) -> Option<TriggerEvent> {
        if raw.company_id != self.config.company_id {
            return None;
        }
        match advertisement::decode(&raw.data) {
            Ok(record) => {
                self.logger.trace(&format!(
                    "beacon payload flags={:?} coords={:?} custom_id_match={}",
                    record.status_flags, record.decoded_coordinates, record.identifier_matched
                ));
                Some(TriggerEvent::beacon(record))
            }
            Err(err) => {
                self.logger.warn(&format!("dropping advertisement: {}", err));
                None
            }
        }
    }

    async fn next(&mut self, shutdown: &Shutdown) -> Scan {
        let window = self.config.scan_window;
        tokio::select! {
            _ = shutdown.wait() => Scan::Cancelled,
            received = tokio::time::timeout(window, self.source.next_advertisement()) => {
                match received {
                    Ok(Ok(Some(raw))) => Scan::Received(raw),
                    Ok(Ok(None)) => Scan::Restart,
                    Ok(Err(err)) => {
                        self.logger.warn(&format!("scan interrupted: {}", err));
                        Scan::Restart
                    }
                    Err(_) => Scan::Restart,
                }
            }
        }
    }

    async fn restart(&mut self, shutdown: &Shutdown) {
        self.logger.trace("scan window elapsed, restarting scan");
        self.source.stop().await;
        if let Err(err) = self.source.start().await {
            self.logger.warn(&format!("scanner restart failed: {}", err));
            shutdown.sleep(self.config.scan_window).await;
        }
    }

    pub async fn run(mut self, tx: Sender<TriggerEvent>, shutdown: Shutdown) {
        let mut emitted = 0u64;
        loop {
            let raw = match self.next(&shutdown).await {
                Scan::Received(raw) => raw,
                Scan::Restart => {
                    self.restart(&shutdown).await;
                    continue;
                }
                Scan::Cancelled => break,
            };

            let Some(event) = self.qualify(&raw) else {
                continue;
            };
            match tx.try_send(event) {
                Ok(()) => emitted += 1,
                Err(TrySendError::Full(_)) => {
                    self.logger.trace("coordinator busy, beacon trigger dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    self.logger.warn("trigger channel closed");
                    break;
                }
            }
        }
        self.source.stop().await;
        self.logger
            .record(&format!("stopped after {} beacon triggers", emitted));
    }
}
