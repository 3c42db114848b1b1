use async_trait::async_trait;
use rand::{rngs::StdRng, Rng, SeedableRng};
use sdrcore::advertisement::{self, BeaconFields, Coordinates, RawAdvertisement};
use sdrcore::listener::{AdvertisementSource, ScanError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Company id used for packets from unrelated devices.
const FOREIGN_COMPANY_ID: u16 = 0x004C;

/// Shape of the synthetic beacon traffic used with `--simulate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    pub company_id: u16,
    pub interval_secs: u64,
    pub burst_len: usize,
    pub spacing_ms: u64,
    pub lat: f64,
    pub lon: f64,
    pub frequency_hint: u8,
    pub foreign_ratio: f64,
    pub truncated_ratio: f64,
    pub seed: u64,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            company_id: advertisement::DEFAULT_COMPANY_ID,
            interval_secs: 90,
            burst_len: 5,
            spacing_ms: 200,
            lat: -27.469,
            lon: 153.023,
            frequency_hint: 0,
            foreign_ratio: 0.1,
            truncated_ratio: 0.05,
            seed: 0,
        }
    }
}

/// Beacon stand-in that emits bursts of repeated advertisements, as a real
/// node does when its button is pressed.
pub struct SimulatedBeacon {
    config: BeaconConfig,
    rng: StdRng,
    pending: VecDeque<RawAdvertisement>,
    next_burst: Instant,
    scanning: bool,
}

impl SimulatedBeacon {
    pub fn new(config: BeaconConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let next_burst = Instant::now() + Duration::from_secs(config.interval_secs);
        Self {
            config,
            rng,
            pending: VecDeque::new(),
            next_burst,
            scanning: false,
        }
    }

    fn fields(&self) -> BeaconFields {
        BeaconFields {
            status_flags: 0x01,
            coordinates: Some(Coordinates {
                lat: self.config.lat,
                lon: self.config.lon,
            }),
            frequency_hint: self.config.frequency_hint,
        }
    }

    fn packet(&mut self) -> RawAdvertisement {
        let mut data = advertisement::encode(&self.fields());
        data.push(self.rng.gen());

        let mut company_id = self.config.company_id;
        if self.rng.gen_bool(self.config.foreign_ratio.clamp(0.0, 1.0)) {
            company_id = FOREIGN_COMPANY_ID;
        }
        if self.rng.gen_bool(self.config.truncated_ratio.clamp(0.0, 1.0)) {
            let len = self.rng.gen_range(0..advertisement::MIN_PAYLOAD_LEN);
            data.truncate(len);
        }
        RawAdvertisement { company_id, data }
    }

    pub fn burst(&mut self) -> Vec<RawAdvertisement> {
        (0..self.config.burst_len.max(1))
            .map(|_| self.packet())
            .collect()
    }
}

#[async_trait]
impl AdvertisementSource for SimulatedBeacon {
    async fn start(&mut self) -> Result<(), ScanError> {
        self.scanning = true;
        Ok(())
    }

    async fn stop(&mut self) {
        self.scanning = false;
    }

    async fn next_advertisement(&mut self) -> Result<Option<RawAdvertisement>, ScanError> {
        if !self.scanning {
            return Err(ScanError::Unavailable("simulated scan not started".into()));
        }
        if self.pending.is_empty() {
            tokio::time::sleep_until(self.next_burst).await;
            self.next_burst = Instant::now() + Duration::from_secs(self.config.interval_secs);
            let burst = self.burst();
            self.pending.extend(burst);
        } else {
            tokio::time::sleep(Duration::from_millis(self.config.spacing_ms)).await;
        }
        Ok(self.pending.pop_front())
    }
}
