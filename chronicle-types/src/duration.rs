//! Millisecond timeouts for configuration files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A timeout written as a whole number of milliseconds.
///
/// Configuration carries `"timeout": 1500` rather than serde's
/// `{"secs": 1, "nanos": 500000000}` shape for [`Duration`].
///
/// ```
/// use chronicle_types::DurationMs;
///
/// let timeout: DurationMs = serde_json::from_str("1500").unwrap();
/// assert_eq!(timeout.to_std(), std::time::Duration::from_millis(1500));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DurationMs(u64);

impl DurationMs {
    /// No time at all; never a usable timeout.
    pub const ZERO: Self = Self(0);

    /// `ms` milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    /// `secs` seconds, saturating.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Whether this is [`ZERO`](Self::ZERO).
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The same span as a [`Duration`].
    #[must_use]
    pub const fn to_std(self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<DurationMs> for Duration {
    fn from(ms: DurationMs) -> Self {
        ms.to_std()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&DurationMs::from_secs(2)).unwrap(), "2000");
    }

    #[test]
    fn rejects_std_duration_shape() {
        assert!(serde_json::from_str::<DurationMs>(r#"{"secs": 1, "nanos": 0}"#).is_err());
    }
}
