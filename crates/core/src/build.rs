//! Build model - a project's build history as seen by the host.

use serde::{Deserialize, Serialize};
use crate::id::{BuildNumber, ProjectId};
use crate::provenance::ProvenanceRecord;
use crate::revision::BuildData;
use crate::Time;

/// Final result of a completed build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildOutcome {
    /// Stable: everything passed
    Success,
    /// Built, but tests or checks reported problems
    Unstable,
    /// The build failed
    Failure,
    /// Skipped before building
    NotBuilt,
    /// Cancelled while running
    Aborted,
}

impl BuildOutcome {
    /// Best-known-good result.
    pub fn is_stable(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Stable or unstable-but-not-failed.
    pub fn is_successful(self) -> bool {
        matches!(self, Self::Success | Self::Unstable)
    }

    /// The build failed outright.
    pub fn is_failed(self) -> bool {
        matches!(self, Self::Failure)
    }
}

impl std::fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "SUCCESS",
            Self::Unstable => "UNSTABLE",
            Self::Failure => "FAILURE",
            Self::NotBuilt => "NOT_BUILT",
            Self::Aborted => "ABORTED",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for BuildOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SUCCESS" | "STABLE" => Ok(Self::Success),
            "UNSTABLE" => Ok(Self::Unstable),
            "FAILURE" | "FAILED" => Ok(Self::Failure),
            "NOT_BUILT" => Ok(Self::NotBuilt),
            "ABORTED" => Ok(Self::Aborted),
            other => Err(format!("unknown build outcome '{other}'")),
        }
    }
}

/// A reference to a build by value. The build may no longer exist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildReference {
    /// Project the build belongs to
    pub project: ProjectId,
    /// Build number within the project
    pub number: BuildNumber,
}

impl BuildReference {
    /// Create a reference.
    pub fn new(project: impl Into<ProjectId>, number: BuildNumber) -> Self {
        Self {
            project: project.into(),
            number,
        }
    }
}

impl std::fmt::Display for BuildReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{}", self.project, self.number)
    }
}

/// One build of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Owning project
    pub project: ProjectId,

    /// Build number
    pub number: BuildNumber,

    /// Result, `None` while the build is running
    pub outcome: Option<BuildOutcome>,

    /// When the build started
    pub started_at: Time,

    /// When the build finished
    #[serde(default)]
    pub completed_at: Option<Time>,

    /// Source-control data recorded by the checkout
    #[serde(default)]
    pub build_data: Option<BuildData>,

    /// Which upstream build this build tracked, if any
    #[serde(default)]
    pub provenance: Option<ProvenanceRecord>,
}

impl BuildRecord {
    /// Create a running build.
    pub fn running(project: ProjectId, number: BuildNumber) -> Self {
        Self {
            project,
            number,
            outcome: None,
            started_at: chrono::Utc::now(),
            completed_at: None,
            build_data: None,
            provenance: None,
        }
    }

    /// Reference to this build.
    pub fn reference(&self) -> BuildReference {
        BuildReference::new(self.project.clone(), self.number)
    }

    /// Whether the build has finished.
    pub fn is_completed(&self) -> bool {
        self.outcome.is_some()
    }

    /// Path of the build relative to the host's base URL.
    pub fn url(&self) -> String {
        format!("job/{}/{}/", self.project, self.number)
    }

    /// "project #n"
    pub fn full_display_name(&self) -> String {
        format!("{} #{}", self.project, self.number)
    }
}

/// A snapshot of a project's builds, oldest first.
///
/// Snapshots are owned copies: builds that start or finish after the
/// snapshot was taken are not visible through it. The next build number
/// only ever grows, so a number freed by retention is never handed out
/// again.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawHistory", into = "RawHistory")]
pub struct BuildHistory {
    builds: Vec<BuildRecord>,
    next_number: BuildNumber,
}

impl BuildHistory {
    /// Create a history from builds in any order.
    pub fn new(mut builds: Vec<BuildRecord>) -> Self {
        builds.sort_by_key(|b| b.number);
        let next_number = builds
            .last()
            .map(|b| b.number.next())
            .unwrap_or(BuildNumber::FIRST);
        Self {
            builds,
            next_number,
        }
    }

    /// Most recent build satisfying `predicate`.
    pub fn last_build_matching(&self, predicate: impl Fn(&BuildRecord) -> bool) -> Option<&BuildRecord> {
        self.builds.iter().rev().find(|b| predicate(b))
    }

    /// Build with the given number.
    pub fn build_by_number(&self, number: BuildNumber) -> Option<&BuildRecord> {
        self.builds
            .binary_search_by_key(&number, |b| b.number)
            .ok()
            .map(|i| &self.builds[i])
    }

    /// Most recent build, running or not.
    pub fn last_build(&self) -> Option<&BuildRecord> {
        self.builds.last()
    }

    /// Number the next build will get.
    pub fn next_build_number(&self) -> BuildNumber {
        self.next_number
    }

    /// Builds oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &BuildRecord> {
        self.builds.iter()
    }

    /// Number of builds retained.
    pub fn len(&self) -> usize {
        self.builds.len()
    }

    /// Whether no builds are retained.
    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }

    /// Mutable access for the owning host.
    pub fn build_by_number_mut(&mut self, number: BuildNumber) -> Option<&mut BuildRecord> {
        self.builds
            .binary_search_by_key(&number, |b| b.number)
            .ok()
            .map(move |i| &mut self.builds[i])
    }

    /// Append a build. Numbers must increase.
    pub fn push(&mut self, build: BuildRecord) {
        debug_assert!(self.builds.last().map_or(true, |b| b.number < build.number));
        self.next_number = self.next_number.max(build.number.next());
        self.builds.push(build);
    }

    /// Remove a build, returning it.
    pub fn remove(&mut self, number: BuildNumber) -> Option<BuildRecord> {
        let i = self.builds.binary_search_by_key(&number, |b| b.number).ok()?;
        Some(self.builds.remove(i))
    }
}

impl Default for BuildHistory {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// On-disk form of a history.
#[derive(Serialize, Deserialize)]
struct RawHistory {
    #[serde(default)]
    next_build_number: Option<BuildNumber>,
    #[serde(default)]
    builds: Vec<BuildRecord>,
}

impl From<RawHistory> for BuildHistory {
    fn from(raw: RawHistory) -> Self {
        let mut history = Self::new(raw.builds);
        if let Some(next) = raw.next_build_number {
            history.next_number = history.next_number.max(next);
        }
        history
    }
}

impl From<BuildHistory> for RawHistory {
    fn from(history: BuildHistory) -> Self {
        Self {
            next_build_number: Some(history.next_number),
            builds: history.builds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(n: u32, outcome: Option<BuildOutcome>) -> BuildRecord {
        let mut b = BuildRecord::running(ProjectId::new("p"), BuildNumber::new(n).unwrap());
        b.outcome = outcome;
        b
    }

    #[test]
    fn test_outcome_classification() {
        assert!(BuildOutcome::Success.is_stable());
        assert!(BuildOutcome::Success.is_successful());
        assert!(BuildOutcome::Unstable.is_successful());
        assert!(!BuildOutcome::Unstable.is_stable());
        assert!(BuildOutcome::Failure.is_failed());
        assert!(!BuildOutcome::Aborted.is_failed());
        assert!(!BuildOutcome::NotBuilt.is_successful());
    }

    #[test]
    fn test_history_sorted_and_searchable() {
        let history = BuildHistory::new(vec![
            build(3, None),
            build(1, Some(BuildOutcome::Success)),
            build(2, Some(BuildOutcome::Failure)),
        ]);
        assert_eq!(history.last_build().unwrap().number.get(), 3);
        assert_eq!(history.next_build_number().get(), 4);
        let last_done = history.last_build_matching(BuildRecord::is_completed).unwrap();
        assert_eq!(last_done.number.get(), 2);
        assert!(history.build_by_number(BuildNumber::new(5).unwrap()).is_none());
    }

    #[test]
    fn test_remove_build() {
        let mut history = BuildHistory::new(vec![build(1, None), build(2, None)]);
        assert!(history.remove(BuildNumber::FIRST).is_some());
        assert!(history.build_by_number(BuildNumber::FIRST).is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_numbers_are_not_reused_after_retention() {
        let mut history = BuildHistory::new(vec![build(1, None), build(2, None)]);
        history.remove(BuildNumber::new(2).unwrap());
        assert_eq!(history.next_build_number().get(), 3);

        history.remove(BuildNumber::FIRST);
        assert!(history.is_empty());
        assert_eq!(history.next_build_number().get(), 3);
    }

    #[test]
    fn test_next_number_survives_serialization() {
        let mut history = BuildHistory::new(vec![build(1, None), build(2, None)]);
        history.remove(BuildNumber::new(2).unwrap());
        let json = serde_json::to_string(&history).unwrap();
        let back: BuildHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back.next_build_number().get(), 3);
    }

    #[test]
    fn test_build_url() {
        let b = build(12, None);
        assert_eq!(b.url(), "job/p/12/");
        assert_eq!(b.full_display_name(), "p #12");
    }
}
