//! Session configuration.
//!
//! Both configs are plain serde structs so a harness can ship them next to
//! a log as JSON.

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};

/// Default prefix of storage keys owned by the engine itself
pub const DEFAULT_BOOKKEEPING_PREFIX: &str = "reprise.";

/// Capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureConfig {
    /// Storage keys starting with this prefix belong to the engine and are
    /// never captured or cleared
    pub bookkeeping_prefix: String,
}

impl CaptureConfig {
    /// Set the bookkeeping prefix
    #[must_use]
    pub fn with_bookkeeping_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bookkeeping_prefix = prefix.into();
        self
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

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            bookkeeping_prefix: DEFAULT_BOOKKEEPING_PREFIX.to_string(),
        }
    }
}

/// Pacing between two replayed events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "DelayRepr", into = "DelayRepr")]
pub enum Delay {
    /// Next event on the next loop turn
    #[default]
    Immediate,
    /// Fixed number of milliseconds between events
    Fixed(u64),
    /// Reproduce the recorded gaps, corrected for replay-induced skew
    Realtime,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DelayRepr {
    Millis(u64),
    Named(String),
}

impl TryFrom<DelayRepr> for Delay {
    type Error = String;

    fn try_from(repr: DelayRepr) -> Result<Self, Self::Error> {
        match repr {
            DelayRepr::Millis(0) => Ok(Delay::Immediate),
            DelayRepr::Millis(ms) => Ok(Delay::Fixed(ms)),
            DelayRepr::Named(name) if name == "realtime" => Ok(Delay::Realtime),
            DelayRepr::Named(name) => Err(format!("unknown delay \"{}\"", name)),
        }
    }
}

impl From<Delay> for DelayRepr {
    fn from(delay: Delay) -> Self {
        match delay {
            Delay::Immediate => DelayRepr::Millis(0),
            Delay::Fixed(ms) => DelayRepr::Millis(ms),
            Delay::Realtime => DelayRepr::Named("realtime".to_string()),
        }
    }
}

/// Replay configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayConfig {
    /// How long to wait before replaying the next event
    pub delay: Delay,
    /// Storage keys starting with this prefix are left alone by replay
    pub bookkeeping_prefix: Option<String>,
}

impl ReplayConfig {
    /// Set the pacing policy
    #[must_use]
    pub fn with_delay(mut self, delay: Delay) -> Self {
        self.delay = delay;
        self
    }

    /// Bookkeeping prefix in effect for this replay
    #[must_use]
    pub fn bookkeeping_prefix(&self) -> &str {
        self.bookkeeping_prefix
            .as_deref()
            .unwrap_or(DEFAULT_BOOKKEEPING_PREFIX)
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

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_delay_forms() {
        let config = ReplayConfig::from_json(r#"{"delay":"realtime"}"#).unwrap();
        assert_eq!(config.delay, Delay::Realtime);

        let config = ReplayConfig::from_json(r#"{"delay":250}"#).unwrap();
        assert_eq!(config.delay, Delay::Fixed(250));

        let config = ReplayConfig::from_json("{}").unwrap();
        assert_eq!(config.delay, Delay::Immediate);
    }

    #[test]
    fn test_unknown_delay_rejected() {
        assert!(ReplayConfig::from_json(r#"{"delay":"slow"}"#).is_err());
    }

    #[test]
    fn test_delay_serializes_back() {
        let json = serde_json::to_string(&ReplayConfig::default().with_delay(Delay::Realtime))
            .unwrap();
        assert!(json.contains("\"realtime\""));
    }

    #[test]
    fn test_capture_config_default_prefix() {
        let config = CaptureConfig::from_json("{}").unwrap();
        assert_eq!(config.bookkeeping_prefix, DEFAULT_BOOKKEEPING_PREFIX);

        let config = CaptureConfig::default().with_bookkeeping_prefix("app.");
        assert_eq!(config.bookkeeping_prefix, "app.");
        assert_eq!(ReplayConfig::default().bookkeeping_prefix(), "reprise.");
    }

    proptest! {
        #[test]
        fn prop_millis_decode_to_fixed(ms in 1u64..=u64::MAX) {
            let delay: Delay = serde_json::from_str(&ms.to_string()).unwrap();
            prop_assert_eq!(delay, Delay::Fixed(ms));
            prop_assert_eq!(serde_json::to_string(&delay).unwrap(), ms.to_string());
        }

        #[test]
        fn prop_unknown_names_rejected(name in "[a-zA-Z_]{0,16}") {
            prop_assume!(name != "realtime");
            let json = serde_json::to_string(&name).unwrap();
            prop_assert!(serde_json::from_str::<Delay>(&json).is_err());
        }
    }

    #[test]
    fn test_zero_is_immediate() {
        assert_eq!(serde_json::from_str::<Delay>("0").unwrap(), Delay::Immediate);
        assert_eq!(serde_json::to_string(&Delay::Immediate).unwrap(), "0");
        assert_eq!(
            serde_json::from_str::<Delay>(&serde_json::to_string(&Delay::Realtime).unwrap()).unwrap(),
            Delay::Realtime
        );
        assert!(serde_json::from_str::<Delay>("-5").is_err());
    }
}
