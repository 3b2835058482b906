//! Result severity levels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Ordered severity of a single result.
///
/// Only `Success` counts as passing; every other level makes the run fail
/// at exit-code granularity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    #[default]
    Success,
    Warning,
    Error,
    Critical,
}

impl Level {
    /// All levels in ascending severity
    pub const ALL: [Level; 4] = [Level::Success, Level::Warning, Level::Error, Level::Critical];

    /// Name used in rendered output
    pub fn name(&self) -> &'static str {
        match self {
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    /// Numeric value, spaced like the classic logging levels
    pub fn value(&self) -> u8 {
        match self {
            Level::Success => 0,
            Level::Warning => 10,
            Level::Error => 20,
            Level::Critical => 30,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Level::Success)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Level {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(Level::Success),
            "WARNING" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" => Ok(Level::Critical),
            _ => Err(CoreError::UnknownLevel(s.to_string())),
        }
    }
}

impl TryFrom<u8> for Level {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, CoreError> {
        Level::ALL
            .into_iter()
            .find(|level| level.value() == value)
            .ok_or_else(|| CoreError::UnknownLevel(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Success < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert!(Level::Error < Level::Critical);
        assert_eq!(Level::ALL.iter().max(), Some(&Level::Critical));
    }

    #[test]
    fn test_level_from_numeric_value() {
        for level in Level::ALL {
            assert_eq!(Level::try_from(level.value()).unwrap(), level);
        }
        assert!(matches!(Level::try_from(7u8), Err(CoreError::UnknownLevel(v)) if v == "7"));
    }

    #[test]
    fn test_level_from_str() {
        assert_eq!(Level::from_str("success").unwrap(), Level::Success);
        assert_eq!(Level::from_str("CRITICAL").unwrap(), Level::Critical);
        assert_eq!(
            Level::from_str("FATAL"),
            Err(CoreError::UnknownLevel("FATAL".to_string()))
        );
    }

    #[test]
    fn test_level_from_value() {
        assert_eq!(Level::try_from(20).unwrap(), Level::Error);
        assert!(Level::try_from(5).is_err());
        assert!(Level::try_from(40).is_err());
    }

    #[test]
    fn test_level_serializes_as_name() {
        let json = serde_json::to_string(&Level::Warning).unwrap();
        assert_eq!(json, "\"WARNING\"");
        let parsed: Level = serde_json::from_str("\"ERROR\"").unwrap();
        assert_eq!(parsed, Level::Error);
    }
}
