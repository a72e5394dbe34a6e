//! Interfaces the host build platform provides.
//!
//! The tracking engine never reaches for a global instance: every entry
//! point receives the registry it should read from.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::build::{BuildHistory, BuildRecord, BuildReference};
use crate::config::TrackingConfiguration;
use crate::error::HostError;
use crate::id::ProjectId;
use crate::provenance::ProvenanceRecord;
use crate::revision::Revision;

/// Resolved environment variables of a build.
pub type EnvVars = BTreeMap<String, String>;

/// Kind of source control a project checks out with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScmKind {
    /// Git checkout, records `BuildData`
    #[default]
    Git,
    /// Some other SCM
    Other,
    /// No checkout
    None,
}

/// A project as returned by the registry, with a history snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Project name
    pub id: ProjectId,

    /// Source control used by the project
    #[serde(default)]
    pub scm: ScmKind,

    /// Tracking settings, if this project follows another one
    #[serde(default)]
    pub tracking: Option<TrackingConfiguration>,

    /// Builds, oldest first
    #[serde(default)]
    pub history: BuildHistory,
}

impl Project {
    /// Create a project with no builds.
    pub fn new(id: impl Into<ProjectId>, scm: ScmKind) -> Self {
        Self {
            id: id.into(),
            scm,
            tracking: None,
            history: BuildHistory::default(),
        }
    }
}

/// The host's project registry.
pub trait ProjectRegistry: Send + Sync {
    /// Look a project up by name. `Ok(None)` when it does not exist.
    fn lookup_project(&self, id: &ProjectId) -> Result<Option<Project>, HostError>;

    /// Names of all known projects.
    fn project_ids(&self) -> Result<Vec<ProjectId>, HostError>;

    /// Base URL of the host, ending in `/`, if configured.
    fn root_url(&self) -> Option<String>;
}

/// Reads the revision the source-control subsystem recorded on a build.
pub trait RevisionSource: Send + Sync {
    /// `None` when the build was not checked out by a compatible SCM.
    fn recorded_revision(&self, build: &BuildRecord) -> Option<Revision>;
}

/// Reads the Git `BuildData` stored on the build record.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedBuildData;

impl RevisionSource for RecordedBuildData {
    fn recorded_revision(&self, build: &BuildRecord) -> Option<Revision> {
        build
            .build_data
            .as_ref()
            .map(|data| data.last_built_revision.clone())
    }
}

/// A build that is starting and has not checked out yet.
pub trait BuildContext {
    /// Which build this is.
    fn build(&self) -> &BuildReference;

    /// Environment the build will run with.
    fn resolved_environment(&self) -> Result<EnvVars, HostError>;

    /// Contribute a variable to the environment later steps see.
    fn set_environment_variable(&mut self, name: &str, value: String);

    /// Write a line to the build's console log.
    fn log(&mut self, message: &str);

    /// Make the checkout use `revision` instead of resolving the branch head.
    fn set_explicit_revision(&mut self, revision: Revision);

    /// Attach the provenance record. Fails if one is already attached.
    fn attach_provenance(&mut self, record: ProvenanceRecord) -> Result<(), HostError>;
}

/// Called synchronously when a build starts, before checkout.
pub trait BuildStartListener: Send + Sync {
    /// Short name used in setup failure messages.
    fn name(&self) -> &str;

    /// Returning an error fails the setup step. The listener writes its
    /// own failure to the build log; the host does not repeat it.
    fn on_started(
        &self,
        build: &mut dyn BuildContext,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
