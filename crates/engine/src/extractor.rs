//! Revision extraction from a tracked build.

use std::sync::Arc;
use trackgit_core::{
    BuildReference, ExtractionFailure, ProjectRegistry, RecordedBuildData, Revision,
    RevisionSource,
};

/// What a tracked build says about its checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// The build recorded this revision
    Revision(Revision),
    /// The build was not checked out by a compatible SCM
    NoRevision,
}

/// Reads the revision a tracked build checked out.
#[derive(Clone)]
pub struct RevisionExtractor {
    registry: Arc<dyn ProjectRegistry>,
    source: Arc<dyn RevisionSource>,
}

impl RevisionExtractor {
    /// Extract using the Git build data stored on build records.
    pub fn new(registry: Arc<dyn ProjectRegistry>) -> Self {
        Self::with_source(registry, Arc::new(RecordedBuildData))
    }

    /// Extract using a custom source-control collaborator.
    pub fn with_source(registry: Arc<dyn ProjectRegistry>, source: Arc<dyn RevisionSource>) -> Self {
        Self { registry, source }
    }

    /// Dereference `build` and read its recorded revision.
    ///
    /// A build without recorded source-control data is not an error; it
    /// yields [`Extraction::NoRevision`].
    pub fn extract(&self, build: &BuildReference) -> Result<Extraction, ExtractionFailure> {
        let project = self
            .registry
            .lookup_project(&build.project)
            .map_err(|e| ExtractionFailure::HostUnavailable(e.to_string()))?
            .ok_or_else(|| ExtractionFailure::UnknownProject {
                project: build.project.clone(),
            })?;
        let record = project
            .history
            .build_by_number(build.number)
            .ok_or_else(|| ExtractionFailure::UnknownBuild {
                project: build.project.clone(),
                number: build.number,
            })?;

        Ok(match self.source.recorded_revision(record) {
            Some(revision) => Extraction::Revision(revision),
            None => Extraction::NoRevision,
        })
    }
}
