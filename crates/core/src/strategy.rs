//! Strategies for choosing which upstream build to track.

use serde::{Deserialize, Serialize};
use crate::build::BuildRecord;

/// Which build of the source project is "the tracked one".
///
/// Serialized names are the identifiers stored in existing project
/// configurations, so `LastCompleted` persists as `LAST_BUILD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackingStrategy {
    /// Most recent stable build
    #[serde(rename = "LAST_STABLE")]
    LastStable,
    /// Most recent stable or unstable build
    #[serde(rename = "LAST_SUCCESSFUL")]
    LastSuccessful,
    /// Most recent finished build, whatever its outcome
    #[serde(rename = "LAST_BUILD")]
    LastCompleted,
    /// Most recent failed build
    #[serde(rename = "LAST_FAILED_BUILD")]
    LastFailed,
    /// The build whose number is held in an environment variable
    #[serde(rename = "BY_NUMBER")]
    ByNumber,
}

impl TrackingStrategy {
    /// All strategies, in display order.
    pub const ALL: [TrackingStrategy; 5] = [
        Self::LastStable,
        Self::LastSuccessful,
        Self::LastCompleted,
        Self::LastFailed,
        Self::ByNumber,
    ];

    /// Whether the tracked build can be known before a dependent build starts.
    ///
    /// `ByNumber` depends on the dependent build's own environment.
    pub fn can_predict_ahead(self) -> bool {
        match self {
            Self::LastStable | Self::LastSuccessful | Self::LastCompleted | Self::LastFailed => true,
            Self::ByNumber => false,
        }
    }

    /// Build predicate for the history strategies. `None` for `ByNumber`.
    pub fn predicate(self) -> Option<fn(&BuildRecord) -> bool> {
        match self {
            Self::LastStable => Some(|b| b.outcome.is_some_and(|o| o.is_stable())),
            Self::LastSuccessful => Some(|b| b.outcome.is_some_and(|o| o.is_successful())),
            Self::LastCompleted => Some(BuildRecord::is_completed),
            Self::LastFailed => Some(|b| b.outcome.is_some_and(|o| o.is_failed())),
            Self::ByNumber => None,
        }
    }

    /// Persisted identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastStable => "LAST_STABLE",
            Self::LastSuccessful => "LAST_SUCCESSFUL",
            Self::LastCompleted => "LAST_BUILD",
            Self::LastFailed => "LAST_FAILED_BUILD",
            Self::ByNumber => "BY_NUMBER",
        }
    }

    /// Human readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::LastStable => "Last stable build",
            Self::LastSuccessful => "Last successful build",
            Self::LastCompleted => "Last build",
            Self::LastFailed => "Last failed build",
            Self::ByNumber => "By Number",
        }
    }
}

impl std::fmt::Display for TrackingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for TrackingStrategy {
    type Err = String;

    /// Accepts persisted identifiers and kebab-case names (`last-stable`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        match normalized.as_str() {
            "LAST_STABLE" => Ok(Self::LastStable),
            "LAST_SUCCESSFUL" => Ok(Self::LastSuccessful),
            "LAST_BUILD" | "LAST_COMPLETED" => Ok(Self::LastCompleted),
            "LAST_FAILED_BUILD" | "LAST_FAILED" => Ok(Self::LastFailed),
            "BY_NUMBER" => Ok(Self::ByNumber),
            _ => Err(format!("unknown tracking strategy '{s}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_by_number_is_unpredictable() {
        for strategy in TrackingStrategy::ALL {
            assert_eq!(
                strategy.can_predict_ahead(),
                strategy != TrackingStrategy::ByNumber
            );
            assert_eq!(strategy.predicate().is_some(), strategy.can_predict_ahead());
        }
    }

    #[test]
    fn test_persisted_names() {
        let json = serde_json::to_string(&TrackingStrategy::LastCompleted).unwrap();
        assert_eq!(json, "\"LAST_BUILD\"");
        let back: TrackingStrategy = serde_json::from_str("\"LAST_FAILED_BUILD\"").unwrap();
        assert_eq!(back, TrackingStrategy::LastFailed);
        for strategy in TrackingStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<TrackingStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_parse_cli_names() {
        assert_eq!("last-stable".parse::<TrackingStrategy>().unwrap(), TrackingStrategy::LastStable);
        assert_eq!("by-number".parse::<TrackingStrategy>().unwrap(), TrackingStrategy::ByNumber);
        assert!("newest".parse::<TrackingStrategy>().is_err());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(TrackingStrategy::LastStable.to_string(), "Last stable build");
        assert_eq!(TrackingStrategy::ByNumber.to_string(), "By Number");
    }
}
