//! Identifiers for projects and builds.

use serde::{Deserialize, Serialize};

/// Name of a project in the host's registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a project id from a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The project name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Build number within a project. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BuildNumber(u32);

impl BuildNumber {
    /// The first build of any project.
    pub const FIRST: BuildNumber = BuildNumber(1);

    /// Create a build number, rejecting zero.
    pub fn new(n: u32) -> Option<Self> {
        (n > 0).then_some(Self(n))
    }

    /// Raw numeric value.
    pub fn get(self) -> u32 {
        self.0
    }

    /// The number following this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl std::fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<u32> for BuildNumber {
    type Error = String;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        Self::new(n).ok_or_else(|| "build numbers start at 1".to_string())
    }
}

impl From<BuildNumber> for u32 {
    fn from(n: BuildNumber) -> Self {
        n.0
    }
}

impl std::str::FromStr for BuildNumber {
    type Err = std::num::ParseIntError;

    /// Parses a positive integer; zero is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let n: std::num::NonZeroU32 = s.parse()?;
        Ok(Self(n.get()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_number_rejects_zero() {
        assert!(BuildNumber::new(0).is_none());
        assert!("0".parse::<BuildNumber>().is_err());
        assert!("-3".parse::<BuildNumber>().is_err());
        assert_eq!("42".parse::<BuildNumber>().unwrap().get(), 42);
    }

    #[test]
    fn test_build_number_serde() {
        let n: BuildNumber = serde_json::from_str("7").unwrap();
        assert_eq!(n.get(), 7);
        assert!(serde_json::from_str::<BuildNumber>("0").is_err());
        assert_eq!(serde_json::to_string(&n).unwrap(), "7");
    }

    #[test]
    fn test_project_id_display() {
        let id = ProjectId::new("upstream");
        assert_eq!(id.to_string(), "upstream");
        assert_eq!(id, ProjectId::from("upstream"));
    }
}
