//! Tracking configuration - per-project settings naming the build to follow.

use serde::{Deserialize, Serialize};
use strsim::levenshtein;
use crate::error::ConfigurationError;
use crate::host::ProjectRegistry;
use crate::id::ProjectId;
use crate::strategy::TrackingStrategy;

/// Maximum edit distance, as a percentage of the name length, for a
/// "did you mean" suggestion.
const SIMILARITY_THRESHOLD_PERCENT: usize = 50;

/// Which project to track and how to choose its build.
///
/// Immutable; reconfiguring a project replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingConfiguration {
    source_project: ProjectId,
    strategy: TrackingStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build_number_variable: Option<String>,
}

impl TrackingConfiguration {
    /// Validate and build a configuration.
    ///
    /// The source project must exist in `registry` right now. Blank strings
    /// count as missing. The build number variable is required for
    /// [`TrackingStrategy::ByNumber`] and ignored otherwise.
    pub fn new(
        registry: &dyn ProjectRegistry,
        source_project: &str,
        strategy: TrackingStrategy,
        build_number_variable: Option<&str>,
    ) -> Result<Self, ConfigurationError> {
        let source = fix_empty_and_trim(Some(source_project))
            .ok_or(ConfigurationError::MissingSourceProject)?;
        let build_number_variable = fix_empty_and_trim(build_number_variable);

        if strategy == TrackingStrategy::ByNumber && build_number_variable.is_none() {
            return Err(ConfigurationError::MissingBuildNumberVariable);
        }

        let id = ProjectId::new(source.clone());
        let exists = registry
            .lookup_project(&id)
            .map_err(|e| ConfigurationError::HostUnavailable(e.to_string()))?
            .is_some();
        if !exists {
            let known = registry
                .project_ids()
                .map_err(|e| ConfigurationError::HostUnavailable(e.to_string()))?;
            return Err(ConfigurationError::UnknownSourceProject {
                suggestion: nearest_project(&source, &known),
                project: source,
            });
        }

        Ok(Self {
            source_project: id,
            strategy,
            build_number_variable,
        })
    }

    /// Project being tracked.
    pub fn source_project(&self) -> &ProjectId {
        &self.source_project
    }

    /// How the tracked build is chosen.
    pub fn strategy(&self) -> TrackingStrategy {
        self.strategy
    }

    /// Variable holding the build number, for `ByNumber`.
    pub fn build_number_variable(&self) -> Option<&str> {
        self.build_number_variable.as_deref()
    }

    /// See [`TrackingStrategy::can_predict_ahead`].
    pub fn can_predict_ahead(&self) -> bool {
        self.strategy.can_predict_ahead()
    }
}

fn fix_empty_and_trim(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Closest known project name, if any is close enough.
pub fn nearest_project(name: &str, known: &[ProjectId]) -> Option<String> {
    known
        .iter()
        .map(|id| (id, levenshtein(name, id.as_str())))
        .filter(|(_, dist)| *dist <= name.len() * SIMILARITY_THRESHOLD_PERCENT / 100)
        .min_by_key(|(_, dist)| *dist)
        .map(|(id, _)| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::host::{Project, ScmKind};

    struct FixedRegistry(Vec<&'static str>);

    impl ProjectRegistry for FixedRegistry {
        fn lookup_project(&self, id: &ProjectId) -> Result<Option<Project>, HostError> {
            Ok(self
                .0
                .iter()
                .find(|n| **n == id.as_str())
                .map(|n| Project::new(*n, ScmKind::Git)))
        }

        fn project_ids(&self) -> Result<Vec<ProjectId>, HostError> {
            Ok(self.0.iter().map(|n| ProjectId::new(*n)).collect())
        }

        fn root_url(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_valid_configuration_trims() {
        let registry = FixedRegistry(vec!["upstream"]);
        let config = TrackingConfiguration::new(
            &registry,
            "  upstream ",
            TrackingStrategy::LastStable,
            Some("   "),
        )
        .unwrap();
        assert_eq!(config.source_project().as_str(), "upstream");
        assert_eq!(config.build_number_variable(), None);
        assert!(config.can_predict_ahead());
    }

    /// Finds nothing and cannot list its projects.
    struct ListingDown;

    impl ProjectRegistry for ListingDown {
        fn lookup_project(&self, _: &ProjectId) -> Result<Option<Project>, HostError> {
            Ok(None)
        }

        fn project_ids(&self) -> Result<Vec<ProjectId>, HostError> {
            Err(HostError::Unavailable("shutting down".into()))
        }

        fn root_url(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_suggestion_lookup_failure_is_reported() {
        let err = TrackingConfiguration::new(&ListingDown, "upstream", TrackingStrategy::LastStable, None)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::HostUnavailable(_)));
    }

    #[test]
    fn test_missing_source_project() {
        let registry = FixedRegistry(vec!["upstream"]);
        let err = TrackingConfiguration::new(&registry, " ", TrackingStrategy::LastStable, None)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingSourceProject));
    }

    #[test]
    fn test_unknown_source_project_suggests_nearest() {
        let registry = FixedRegistry(vec!["upstream", "docs"]);
        let err = TrackingConfiguration::new(&registry, "upstraem", TrackingStrategy::LastStable, None)
            .unwrap_err();
        match err {
            ConfigurationError::UnknownSourceProject { project, suggestion } => {
                assert_eq!(project, "upstraem");
                assert_eq!(suggestion.as_deref(), Some("upstream"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = TrackingConfiguration::new(&registry, "ghost", TrackingStrategy::LastStable, None)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnknownSourceProject { suggestion: None, .. }
        ));
    }

    #[test]
    fn test_by_number_requires_variable() {
        let registry = FixedRegistry(vec!["upstream"]);
        let err = TrackingConfiguration::new(&registry, "upstream", TrackingStrategy::ByNumber, None)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingBuildNumberVariable));

        let config =
            TrackingConfiguration::new(&registry, "upstream", TrackingStrategy::ByNumber, Some("REV"))
                .unwrap();
        assert_eq!(config.build_number_variable(), Some("REV"));
        assert!(!config.can_predict_ahead());
    }
}
