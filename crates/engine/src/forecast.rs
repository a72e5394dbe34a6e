//! Looking ahead and back: which build will be tracked next, and which
//! one the latest dependent build tracked.

use std::sync::Arc;
use trackgit_core::{
    BuildRecord, BuildReference, ProjectId, ProjectRegistry, ResolutionFailure,
    TrackingConfiguration,
};
use crate::provenance::ProvenanceQuery;
use crate::resolver::TrackingResolver;

/// Result of asking for the next tracked build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prediction {
    /// A dependent build started now would track this build
    Next(BuildReference),
    /// Depends on the starting build's environment
    Unpredictable,
}

/// Forecasts for callers that want to know the tracked build before (or
/// after) a dependent build runs.
#[derive(Clone)]
pub struct TrackingForecast {
    registry: Arc<dyn ProjectRegistry>,
    resolver: TrackingResolver,
}

impl TrackingForecast {
    /// Create a forecast over `registry`.
    pub fn new(registry: Arc<dyn ProjectRegistry>) -> Self {
        Self {
            resolver: TrackingResolver::new(Arc::clone(&registry)),
            registry,
        }
    }

    /// The build a dependent build started now would track.
    ///
    /// Never attempts resolution for strategies that cannot predict ahead.
    pub fn next_tracked_build(
        &self,
        config: &TrackingConfiguration,
    ) -> Result<Prediction, ResolutionFailure> {
        if !config.can_predict_ahead() {
            return Ok(Prediction::Unpredictable);
        }
        self.resolver.resolve(config, None).map(Prediction::Next)
    }

    /// The upstream build tracked by the most recent build of `dependent`.
    ///
    /// `Ok(None)` when `dependent` has no builds, its last build carries no
    /// provenance, or the tracked build has since been deleted.
    pub fn last_tracked_build(
        &self,
        dependent: &ProjectId,
        config: &TrackingConfiguration,
    ) -> Result<Option<BuildRecord>, ResolutionFailure> {
        let host_err = |e: trackgit_core::HostError| ResolutionFailure::HostUnavailable(e.to_string());

        let source = config.source_project();
        if self.registry.lookup_project(source).map_err(host_err)?.is_none() {
            return Err(ResolutionFailure::UnknownProject {
                project: source.clone(),
            });
        }

        let Some(project) = self.registry.lookup_project(dependent).map_err(host_err)? else {
            return Ok(None);
        };
        let Some(record) = project.history.last_build().and_then(|b| b.provenance.clone()) else {
            return Ok(None);
        };

        let query = ProvenanceQuery::new(Arc::clone(&self.registry));
        let tracked = query.view(&record).resolve_tracked_build().map_err(host_err)?;
        Ok(tracked)
    }
}
