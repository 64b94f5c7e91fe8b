//! Time types for REPRISE.
//!
//! Timestamps are milliseconds since the Unix epoch, the resolution the
//! host platform exposes to application code.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The epoch itself
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Create from raw milliseconds
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Raw milliseconds
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Signed distance to an earlier timestamp, in milliseconds
    #[must_use]
    pub const fn millis_since(&self, earlier: Timestamp) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Advance by a number of milliseconds
    #[must_use]
    pub const fn add_millis(&self, millis: u64) -> Self {
        Self(self.0.saturating_add(millis as i64))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<i64> for Timestamp {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_arithmetic() {
        let t1 = Timestamp::from_millis(1_000);
        let t2 = t1.add_millis(250);
        assert_eq!(t2.as_millis(), 1_250);
        assert_eq!(t2.millis_since(t1), 250);
        assert_eq!(t1.millis_since(t2), -250);
    }

    #[test]
    fn test_timestamp_ord() {
        assert!(Timestamp::from_millis(1) < Timestamp::from_millis(2));
        assert_eq!(Timestamp::default(), Timestamp::zero());
    }

    #[test]
    fn test_timestamp_json_is_number() {
        let json = serde_json::to_string(&Timestamp::from_millis(1357000000000)).unwrap();
        assert_eq!(json, "1357000000000");
    }
}
