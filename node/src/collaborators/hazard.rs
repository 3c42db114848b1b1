use crate::collaborators::command::CommandSpec;
use async_trait::async_trait;
use sdrcore::publisher::{FeedError, HazardFeed, HazardReport};

/// Runs the hazard/traffic fetch program; its stdout is a JSON `HazardReport`.
pub struct CommandHazardFeed {
    command: CommandSpec,
}

impl CommandHazardFeed {
    pub fn new(command: CommandSpec) -> Self {
        Self { command }
    }
}

#[async_trait]
impl HazardFeed for CommandHazardFeed {
    async fn fetch(&self) -> Result<HazardReport, FeedError> {
        let output = self
            .command
            .run(&[])
            .await
            .map_err(|err| FeedError::Command(err.to_string()))?;
        Ok(serde_json::from_str(&output.stdout)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parses_feed_output() {
        let script = r#"echo '{"fire_incidents": 2, "road_events": []}'"#;
        let feed = CommandHazardFeed::new(CommandSpec::new("sh", &["-c", script]));
        let report = feed.fetch().await.unwrap();
        assert_eq!(report.fire_incidents, Some(2));
    }

    #[tokio::test]
    async fn garbage_output_is_a_parse_error() {
        let feed = CommandHazardFeed::new(CommandSpec::new("echo", &["Request failed: 503"]));
        assert!(matches!(feed.fetch().await, Err(FeedError::Parse(_))));
    }
}
