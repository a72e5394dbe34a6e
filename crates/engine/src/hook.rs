//! Build-start propagation hook.
//!
//! Runs once, synchronously, when a dependent build starts and before it
//! checks out:
//!
//! ```text
//! NoConfig ─┐
//! Resolving → Extracting → Injecting → ProvenanceOnly
//!                 └── no revision ──────────┘
//! ```

use std::sync::Arc;
use tracing::{debug, error, info, warn};
use trackgit_core::{
    BuildContext, BuildReference, BuildStartListener, ExtractionFailure, HostError,
    ProjectRegistry, ProvenanceRecord, ResolutionFailure, Revision, RevisionSource,
    TRACKING_BUILD_ENV,
};
use crate::extractor::{Extraction, RevisionExtractor};
use crate::provenance::ProvenanceQuery;
use crate::resolver::TrackingResolver;

/// Hook settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookConfig {
    /// Variable set to the tracked build's URL
    pub environment_variable: String,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            environment_variable: TRACKING_BUILD_ENV.to_string(),
        }
    }
}

/// How the hook finished for one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// The project tracks nothing
    NoConfig,
    /// Checkout pinned to the tracked build's revision
    Pinned {
        /// Build that was tracked
        tracked: BuildReference,
        /// Revision the checkout will use
        revision: Revision,
    },
    /// Provenance recorded, but the tracked build had no revision to copy
    ProvenanceOnly {
        /// Build that was tracked
        tracked: BuildReference,
    },
}

impl HookOutcome {
    /// Build that was tracked, if any.
    pub fn tracked(&self) -> Option<&BuildReference> {
        match self {
            Self::NoConfig => None,
            Self::Pinned { tracked, .. } | Self::ProvenanceOnly { tracked } => Some(tracked),
        }
    }
}

/// The hook failed its setup step.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Could not choose a build to track
    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    /// Could not read the chosen build
    #[error(transparent)]
    Extraction(#[from] ExtractionFailure),

    /// Host rejected a read or write
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Pins dependent builds to the revision of the build they track.
#[derive(Clone)]
pub struct PropagationHook {
    registry: Arc<dyn ProjectRegistry>,
    resolver: TrackingResolver,
    extractor: RevisionExtractor,
    provenance: ProvenanceQuery,
    config: HookConfig,
}

impl PropagationHook {
    /// Create a hook reading Git build data through `registry`.
    pub fn new(registry: Arc<dyn ProjectRegistry>) -> Self {
        Self {
            resolver: TrackingResolver::new(Arc::clone(&registry)),
            extractor: RevisionExtractor::new(Arc::clone(&registry)),
            provenance: ProvenanceQuery::new(Arc::clone(&registry)),
            registry,
            config: HookConfig::default(),
        }
    }

    /// Read revisions through a different source-control collaborator.
    pub fn with_revision_source(mut self, source: Arc<dyn RevisionSource>) -> Self {
        self.extractor = RevisionExtractor::with_source(Arc::clone(&self.registry), source);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: HookConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the hook for a starting build.
    ///
    /// Failures are written to the build log before being returned.
    pub fn run(&self, build: &mut dyn BuildContext) -> Result<HookOutcome, HookError> {
        match self.propagate(build) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                error!("Tracking failed for {}: {}", build.build(), err);
                build.log(&format!("ERROR: {err}"));
                Err(err)
            }
        }
    }

    fn propagate(&self, build: &mut dyn BuildContext) -> Result<HookOutcome, HookError> {
        let dependent = build.build().clone();
        let Some(project) = self.registry.lookup_project(&dependent.project)? else {
            return Ok(HookOutcome::NoConfig);
        };
        let Some(config) = project.tracking else {
            debug!("{} tracks nothing", dependent.project);
            return Ok(HookOutcome::NoConfig);
        };

        // Only ByNumber reads the dependent build's environment.
        let environment = if config.can_predict_ahead() {
            None
        } else {
            Some(build.resolved_environment()?)
        };
        let tracked = self.resolver.resolve(&config, environment.as_ref())?;

        info!("{} tracks {} ({})", dependent, tracked, config.strategy());
        build.log(&format!("Tracking Git of {tracked}"));

        let extraction = self.extractor.extract(&tracked)?;

        // The override is only enqueued once provenance is attached.
        let record = ProvenanceRecord::new(tracked.clone());
        build.attach_provenance(record.clone())?;

        let outcome = match extraction {
            Extraction::Revision(revision) => {
                build.log(&format!("Checking out revision {revision} built by {tracked}"));
                build.set_explicit_revision(revision.clone());
                HookOutcome::Pinned { tracked, revision }
            }
            Extraction::NoRevision => {
                warn!("{} has no recorded Git revision; not pinning {}", tracked, dependent);
                build.log("The tracked project doesn't use Git as SCM. Will not set a revision.");
                HookOutcome::ProvenanceOnly { tracked }
            }
        };

        let url = self.provenance.view(&record).tracked_build_url().unwrap_or_default();
        build.set_environment_variable(&self.config.environment_variable, url);

        Ok(outcome)
    }
}

impl BuildStartListener for PropagationHook {
    fn name(&self) -> &str {
        "tracking-git"
    }

    fn on_started(
        &self,
        build: &mut dyn BuildContext,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.run(build).map(|_| ()).map_err(Into::into)
    }
}
