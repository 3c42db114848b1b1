use crate::dashboard::DashboardClient;
use crate::shutdown::Shutdown;
use crate::telemetry::log::LogManager;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One road event from the traffic feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadEvent {
    pub event_type: String,
    #[serde(default)]
    pub event_subtype: String,
    #[serde(default)]
    pub road_name: String,
    #[serde(default)]
    pub locality: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub local_government_area: String,
}

/// What one hazard/traffic fetch produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HazardReport {
    #[serde(default)]
    pub fire_incidents: Option<u32>,
    #[serde(default)]
    pub road_events: Vec<RoadEvent>,
}

#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("fetch command failed: {0}")]
    Command(String),
    #[error("unreadable feed output: {0}")]
    Parse(#[from] serde_json::Error),
}

#[async_trait]
pub trait HazardFeed: Send + Sync {
    async fn fetch(&self) -> Result<HazardReport, FeedError>;
}

/// Which road events are worth showing on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardFilter {
    pub event_keywords: Vec<String>,
    pub regions: Vec<String>,
}

impl Default for HazardFilter {
    fn default() -> Self {
        Self {
            event_keywords: ["Hazard", "Crash", "Flooding"].map(String::from).to_vec(),
            regions: ["brisbane", "logan", "moreton", "ipswich"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl HazardFilter {
    pub fn qualifies(&self, event: &RoadEvent) -> bool {
        let area = event.local_government_area.to_lowercase();
        self.event_keywords
            .iter()
            .any(|keyword| event.event_type.contains(keyword.as_str()))
            && self
                .regions
                .iter()
                .any(|region| area.contains(&region.to_lowercase()))
    }

    /// One line per qualifying road event. The fire count is published as
    /// its own variable and is not part of the summary.
    pub fn summarize(&self, report: &HazardReport) -> Vec<String> {
        report
            .road_events
            .iter()
            .filter(|event| self.qualifies(event))
            .map(|event| {
                format!(
                    "{} on {} - {} {}",
                    event.event_subtype, event.road_name, event.locality, event.postcode
                )
            })
            .collect()
    }
}

/// Fetches hazard data on a fixed interval and posts the summary.
pub struct PeriodicPublisher {
    feed: Arc<dyn HazardFeed>,
    dashboard: Arc<dyn DashboardClient>,
    filter: HazardFilter,
    interval: Duration,
    logger: LogManager,
}

impl PeriodicPublisher {
    pub fn new(
        feed: Arc<dyn HazardFeed>,
        dashboard: Arc<dyn DashboardClient>,
        filter: HazardFilter,
        interval: Duration,
    ) -> Self {
        Self {
            feed,
            dashboard,
            filter,
            interval,
            logger: LogManager::new("publisher"),
        }
    }

    /// Returns how many items were published.
    pub async fn publish_once(&self) -> usize {
        let report = match self.feed.fetch().await {
            Ok(report) => report,
            Err(err) => {
                self.logger.warn(&format!("hazard fetch failed: {}", err));
                return 0;
            }
        };

        let items = self.filter.summarize(&report);
        let total = items.len() + usize::from(report.fire_incidents.is_some());
        let mut published = 0;
        if let Some(count) = report.fire_incidents {
            match self.dashboard.publish_fire_count(count).await {
                Ok(()) => published += 1,
                Err(err) => self
                    .logger
                    .warn(&format!("could not publish fire count {}: {}", count, err)),
            }
        }
        for item in &items {
            match self.dashboard.publish_summary(std::slice::from_ref(item)).await {
                Ok(()) => published += 1,
                Err(err) => self
                    .logger
                    .warn(&format!("could not publish '{}': {}", item, err)),
            }
        }
        self.logger
            .record(&format!("{} of {} items published", published, total));
        published
    }

    pub async fn run(self, shutdown: Shutdown) {
        while shutdown.sleep(self.interval).await {
            self.publish_once().await;
        }
        self.logger.record("stopped");
    }
}
