//! Platform configuration.

use reprise_core::{EngineResult, Timestamp};
use reprise_dom::EventInterface;
use serde::{Deserialize, Serialize};

/// Default virtual clock start: 2013-01-01T00:26:40Z
pub const DEFAULT_EPOCH_MS: i64 = 1_357_000_000_000;

/// Shape of one simulated platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlatformConfig {
    /// Virtual clock value when the window is created
    pub epoch: Timestamp,
    /// Seed of the native random source
    pub seed: u64,
    /// Event interfaces `createEvent` can allocate
    pub event_interfaces: Vec<String>,
    /// Document URL without fragment
    pub url: String,
    /// Upper bound of tasks `run_until_idle` executes before giving up
    pub max_steps: u64,
}

impl PlatformConfig {
    /// Set the clock start
    #[must_use]
    pub fn with_epoch(mut self, epoch: Timestamp) -> Self {
        self.epoch = epoch;
        self
    }

    /// Set the random seed
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Restrict the interfaces `createEvent` supports
    #[must_use]
    pub fn with_event_interfaces(mut self, interfaces: &[EventInterface]) -> Self {
        self.event_interfaces = interfaces.iter().map(|i| i.name().to_string()).collect();
        self
    }

    /// Set the document URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Interfaces `createEvent` supports, ignoring unknown names
    #[must_use]
    pub fn supported_interfaces(&self) -> Vec<EventInterface> {
        self.event_interfaces
            .iter()
            .filter_map(|name| EventInterface::from_name(name))
            .collect()
    }

    /// Decode from JSON
    ///
    /// # Errors
    ///
    /// Returns error if the document is not a valid config
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            epoch: Timestamp::from_millis(DEFAULT_EPOCH_MS),
            seed: 0,
            event_interfaces: EventInterface::ALL
                .iter()
                .map(|i| i.name().to_string())
                .collect(),
            url: "http://localhost/".to_string(),
            max_steps: 100_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlatformConfig::default();
        assert_eq!(config.supported_interfaces().len(), EventInterface::ALL.len());
        assert_eq!(config.epoch.as_millis(), DEFAULT_EPOCH_MS);
    }

    #[test]
    fn test_from_json() {
        let config =
            PlatformConfig::from_json(r#"{"seed":7,"eventInterfaces":["Event","Bogus"]}"#)
                .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.supported_interfaces(), vec![EventInterface::Event]);
        assert_eq!(config.url, "http://localhost/");
    }
}
