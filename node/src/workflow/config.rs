use crate::collaborators::command::CommandSpec;
use crate::generator::BeaconConfig;
use anyhow::Context;
use sdrcore::advertisement::DEFAULT_COMPANY_ID;
use sdrcore::listener::ListenerConfig;
use sdrcore::publisher::HazardFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconSection {
    pub company_id: u16,
    pub scan_window_secs: u64,
    /// Helper printing `<company id hex> <payload hex>` lines.
    pub scanner: CommandSpec,
}

impl Default for BeaconSection {
    fn default() -> Self {
        Self {
            company_id: DEFAULT_COMPANY_ID,
            scan_window_secs: 10,
            scanner: CommandSpec::new("scripts/ble_scan.py", &[]),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    pub base_url: String,
    pub device_token: String,
    pub poll_secs: u64,
    pub timeout_secs: u64,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.us-e1.tago.io".into(),
            device_token: String::new(),
            poll_secs: 5,
            timeout_secs: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub command: CommandSpec,
    pub recordings_dir: PathBuf,
    pub setup_allowance_secs: u64,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            command: CommandSpec::new(
                "scripts/capture.sh",
                &["{frequency}", "{duration}", "{output}"],
            ),
            recordings_dir: PathBuf::from("Recordings"),
            setup_allowance_secs: 2,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSection {
    pub command: CommandSpec,
}

impl Default for UploadSection {
    fn default() -> Self {
        Self {
            command: CommandSpec::new("scripts/upload.sh", &["{path}", "{file_name}"]),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSection {
    pub device: String,
    pub mount_point: PathBuf,
    pub mount_command: CommandSpec,
    pub unmount_command: CommandSpec,
    pub mounts_table: PathBuf,
}

impl Default for TransferSection {
    fn default() -> Self {
        Self {
            device: "/dev/sda".into(),
            mount_point: PathBuf::from("/mnt/mp3player"),
            mount_command: CommandSpec::new("sudo", &["mount", "{device}", "{mount_point}"]),
            unmount_command: CommandSpec::new("sudo", &["umount", "{mount_point}"]),
            mounts_table: PathBuf::from("/proc/mounts"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardSection {
    pub enabled: bool,
    pub command: CommandSpec,
    pub interval_secs: u64,
    pub filter: HazardFilter,
}

impl Default for HazardSection {
    fn default() -> Self {
        Self {
            enabled: true,
            command: CommandSpec::new("scripts/hazards.sh", &[]),
            interval_secs: 300,
            filter: HazardFilter::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSection {
    pub bind: SocketAddr,
}

impl Default for StatusSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
        }
    }
}

/// Everything the node needs to run, read from YAML. Missing keys fall back
/// to the bench defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub cooldown_secs: u64,
    pub channel_capacity: usize,
    pub beacon: BeaconSection,
    pub dashboard: DashboardSection,
    pub capture: CaptureSection,
    pub upload: UploadSection,
    pub transfer: TransferSection,
    pub hazards: HazardSection,
    pub status: StatusSection,
    pub simulation: BeaconConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 60,
            channel_capacity: 4,
            beacon: BeaconSection::default(),
            dashboard: DashboardSection::default(),
            capture: CaptureSection::default(),
            upload: UploadSection::default(),
            transfer: TransferSection::default(),
            hazards: HazardSection::default(),
            status: StatusSection::default(),
            simulation: BeaconConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub company_id: Option<u16>,
    pub cooldown_secs: Option<u64>,
    pub poll_secs: Option<u64>,
    pub device_token: Option<String>,
}

impl NodeConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading node config {}", path_ref.display()))?;
        let config: NodeConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing node config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(overrides: &Overrides) -> Self {
        let mut config = Self::default();
        config.apply(overrides);
        config
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(company_id) = overrides.company_id {
            self.beacon.company_id = company_id;
            self.simulation.company_id = company_id;
        }
        if let Some(cooldown) = overrides.cooldown_secs {
            self.cooldown_secs = cooldown;
        }
        if let Some(poll) = overrides.poll_secs {
            self.dashboard.poll_secs = poll;
        }
        if let Some(token) = &overrides.device_token {
            self.dashboard.device_token = token.clone();
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.dashboard.poll_secs.max(1))
    }

    pub fn listener_config(&self) -> ListenerConfig {
        ListenerConfig {
            company_id: self.beacon.company_id,
            scan_window: Duration::from_secs(self.beacon.scan_window_secs.max(1)),
        }
    }
}

/// Accepts `0x1279`, `1279` (hex) for the company id flag.
pub fn parse_company_id(text: &str) -> Result<u16, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).map_err(|err| format!("invalid company id {:?}: {}", text, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_overrides_defaults() {
        let cfg = NodeConfig::from_args(&Overrides {
            company_id: Some(0x004c),
            cooldown_secs: Some(120),
            poll_secs: None,
            device_token: Some("token".into()),
        });
        assert_eq!(cfg.listener_config().company_id, 0x004c);
        assert_eq!(cfg.simulation.company_id, 0x004c);
        assert_eq!(cfg.cooldown(), Duration::from_secs(120));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.dashboard.device_token, "token");
    }

    #[test]
    fn config_load_reads_partial_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"cooldown_secs: 90\n\
              dashboard:\n  base_url: http://localhost:8080\n\
              capture:\n  command:\n    program: rtl-capture\n    args: [\"{frequency}\"]\n\
              hazards:\n  filter:\n    regions: [logan]\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = NodeConfig::load(&path).unwrap();
        assert_eq!(cfg.cooldown_secs, 90);
        assert_eq!(cfg.dashboard.base_url, "http://localhost:8080");
        assert_eq!(cfg.dashboard.poll_secs, 5);
        assert_eq!(cfg.capture.command.program, "rtl-capture");
        assert_eq!(cfg.hazards.filter.regions, vec!["logan".to_string()]);
        assert_eq!(cfg.hazards.filter.event_keywords.len(), 3);
        assert_eq!(cfg.transfer.mount_point, PathBuf::from("/mnt/mp3player"));
    }

    #[test]
    fn example_config_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/node.example.yaml");
        let cfg = NodeConfig::load(path).unwrap();
        assert_eq!(cfg.beacon.company_id, DEFAULT_COMPANY_ID);
        assert_eq!(cfg.simulation.seed, 7);
        assert_eq!(cfg.status.bind.port(), 9000);
    }

    #[test]
    fn default_helpers_ship_with_the_node() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..");
        let cfg = NodeConfig::default();
        for program in [
            &cfg.beacon.scanner.program,
            &cfg.capture.command.program,
            &cfg.upload.command.program,
            &cfg.hazards.command.program,
        ] {
            assert!(root.join(program).is_file(), "{} is missing", program);
        }
    }

    #[test]
    fn unreadable_config_names_the_file() {
        let err = NodeConfig::load("/nonexistent/node.yaml").unwrap_err();
        assert!(format!("{:#}", err).contains("/nonexistent/node.yaml"));
    }

    #[test]
    fn company_id_flag_is_hex() {
        assert_eq!(parse_company_id("0x1279"), Ok(0x1279));
        assert_eq!(parse_company_id("1279"), Ok(0x1279));
        assert!(parse_company_id("0xZZ").is_err());
    }
}
