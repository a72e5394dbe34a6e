//! Provenance record - which upstream build a build tracked.

use serde::{Deserialize, Serialize};
use crate::build::BuildReference;
use crate::id::{BuildNumber, ProjectId};
use crate::Time;

/// Environment variable pointing at the tracked build's URL.
pub const TRACKING_BUILD_ENV: &str = "TRACKING_GIT_BUILD";

/// Attached to a dependent build at start; never modified afterwards.
///
/// Holds the tracked build by value only. Reading the live build goes back
/// through the registry every time, since retention may delete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    tracked: BuildReference,
    attached_at: Time,
}

impl ProvenanceRecord {
    /// Record that `tracked` was the build followed.
    pub fn new(tracked: BuildReference) -> Self {
        Self {
            tracked,
            attached_at: chrono::Utc::now(),
        }
    }

    /// Project of the tracked build.
    pub fn tracked_project_id(&self) -> &ProjectId {
        &self.tracked.project
    }

    /// Number of the tracked build.
    pub fn tracked_build_number(&self) -> BuildNumber {
        self.tracked.number
    }

    /// The tracked build as a reference.
    pub fn tracked(&self) -> &BuildReference {
        &self.tracked
    }

    /// When the record was attached.
    pub fn attached_at(&self) -> Time {
        self.attached_at
    }
}
