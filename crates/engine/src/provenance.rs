//! Queries over provenance records.
//!
//! A record only stores `(project, number)`. Everything else is looked up
//! again on each call, and a tracked build deleted by retention simply
//! reads as "not found".

use std::sync::Arc;
use tracing::debug;
use trackgit_core::{
    BuildNumber, BuildRecord, BuildReference, EnvVars, HostError, ProjectId, ProjectRegistry,
    ProvenanceRecord,
};

/// Read access to provenance through a registry.
#[derive(Clone)]
pub struct ProvenanceQuery {
    registry: Arc<dyn ProjectRegistry>,
}

impl ProvenanceQuery {
    /// Create a query over `registry`.
    pub fn new(registry: Arc<dyn ProjectRegistry>) -> Self {
        Self { registry }
    }

    /// The provenance attached to `build`, if the build exists and has one.
    pub fn of_build(&self, build: &BuildReference) -> Result<Option<ProvenanceRecord>, HostError> {
        let project = self.registry.lookup_project(&build.project)?;
        Ok(project
            .and_then(|p| p.history.build_by_number(build.number).cloned())
            .and_then(|b| b.provenance))
    }

    /// Bundle `record` with this query.
    pub fn view<'a>(&'a self, record: &'a ProvenanceRecord) -> TrackedBuild<'a> {
        TrackedBuild {
            record,
            registry: self.registry.as_ref(),
        }
    }
}

/// A provenance record together with the registry to dereference it.
pub struct TrackedBuild<'a> {
    record: &'a ProvenanceRecord,
    registry: &'a dyn ProjectRegistry,
}

impl<'a> TrackedBuild<'a> {
    /// Project of the tracked build.
    pub fn tracked_project_id(&self) -> &ProjectId {
        self.record.tracked_project_id()
    }

    /// Number of the tracked build.
    pub fn tracked_build_number(&self) -> BuildNumber {
        self.record.tracked_build_number()
    }

    /// Look the tracked build up now.
    ///
    /// `Ok(None)` when the project or build is gone. Errors only when the
    /// host itself cannot be read.
    pub fn resolve_tracked_build(&self) -> Result<Option<BuildRecord>, HostError> {
        let tracked = self.record.tracked();
        let Some(project) = self.registry.lookup_project(&tracked.project)? else {
            debug!("Tracked project {} no longer exists", tracked.project);
            return Ok(None);
        };
        Ok(project.history.build_by_number(tracked.number).cloned())
    }

    /// Browsable URL of the tracked build.
    ///
    /// `None` when the build cannot be resolved for any reason or the host
    /// has no base URL.
    pub fn tracked_build_url(&self) -> Option<String> {
        let root = self.registry.root_url()?;
        let build = self.resolve_tracked_build().ok().flatten()?;
        Some(format!("{}{}", root, build.url()))
    }

    /// Add `name` = tracked build URL to `env` (empty when unavailable).
    pub fn build_env_vars(&self, name: &str, env: &mut EnvVars) {
        env.insert(name.to_string(), self.tracked_build_url().unwrap_or_default());
    }
}
