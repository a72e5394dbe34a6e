//! Resolution strategy engine - which upstream build to track.

use std::sync::Arc;
use tracing::debug;
use trackgit_core::{
    BuildHistory, BuildNumber, BuildReference, EnvVars, ProjectRegistry, ResolutionFailure,
    TrackingConfiguration, TrackingStrategy,
};
use crate::expand::expand;

/// Pick the tracked build from a snapshot of the source project's history.
///
/// Pure: reads `history` and `context` only. `context` is the dependent
/// build's resolved environment and is only consulted by
/// [`TrackingStrategy::ByNumber`]; pass `None` when no build is starting.
pub fn resolve(
    history: &BuildHistory,
    config: &TrackingConfiguration,
    context: Option<&EnvVars>,
) -> Result<BuildReference, ResolutionFailure> {
    let source = config.source_project();
    let strategy = config.strategy();

    let build = match strategy.predicate() {
        Some(predicate) => history.last_build_matching(predicate),
        None => {
            let number = build_number_from(config, context)?;
            debug!("{} resolved build number {} for {}", strategy, number, source);
            history.build_by_number(number)
        }
    };

    build
        .map(|b| BuildReference::new(source.clone(), b.number))
        .ok_or_else(|| ResolutionFailure::NoSuchBuild {
            project: source.clone(),
            strategy,
            number: requested_number(config, context),
        })
}

fn build_number_from(
    config: &TrackingConfiguration,
    context: Option<&EnvVars>,
) -> Result<BuildNumber, ResolutionFailure> {
    let variable = config
        .build_number_variable()
        .ok_or_else(|| ResolutionFailure::MissingVariable {
            variable: String::new(),
        })?;
    let empty = EnvVars::new();
    let env = context.unwrap_or(&empty);

    let value = expand(variable, env)
        .map_err(|name| ResolutionFailure::MissingVariable { variable: name })?;
    value
        .trim()
        .parse::<BuildNumber>()
        .map_err(|_| ResolutionFailure::UnparsableVariable {
            variable: variable.to_string(),
            value,
        })
}

fn requested_number(config: &TrackingConfiguration, context: Option<&EnvVars>) -> Option<BuildNumber> {
    match config.strategy() {
        TrackingStrategy::ByNumber => build_number_from(config, context).ok(),
        _ => None,
    }
}

/// Resolves tracked builds against a live registry.
#[derive(Clone)]
pub struct TrackingResolver {
    registry: Arc<dyn ProjectRegistry>,
}

impl TrackingResolver {
    /// Create a resolver reading from `registry`.
    pub fn new(registry: Arc<dyn ProjectRegistry>) -> Self {
        Self { registry }
    }

    /// Look the source project up and resolve against one snapshot of its
    /// history.
    pub fn resolve(
        &self,
        config: &TrackingConfiguration,
        context: Option<&EnvVars>,
    ) -> Result<BuildReference, ResolutionFailure> {
        let source = config.source_project();
        let project = self
            .registry
            .lookup_project(source)
            .map_err(|e| ResolutionFailure::HostUnavailable(e.to_string()))?
            .ok_or_else(|| ResolutionFailure::UnknownProject {
                project: source.clone(),
            })?;
        resolve(&project.history, config, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackgit_core::{
        BuildOutcome, BuildRecord, HostError, Project, ProjectId, ResolutionCause, ScmKind,
    };

    struct OneProject(Project);

    impl ProjectRegistry for OneProject {
        fn lookup_project(&self, id: &ProjectId) -> Result<Option<Project>, HostError> {
            Ok((self.0.id == *id).then(|| self.0.clone()))
        }

        fn project_ids(&self) -> Result<Vec<ProjectId>, HostError> {
            Ok(vec![self.0.id.clone()])
        }

        fn root_url(&self) -> Option<String> {
            None
        }
    }

    fn history(outcomes: &[Option<BuildOutcome>]) -> BuildHistory {
        BuildHistory::new(
            outcomes
                .iter()
                .enumerate()
                .map(|(i, outcome)| {
                    let n = BuildNumber::new(i as u32 + 1).unwrap();
                    let mut b = BuildRecord::running(ProjectId::new("a"), n);
                    b.outcome = *outcome;
                    b
                })
                .collect(),
        )
    }

    fn config(strategy: TrackingStrategy, variable: Option<&str>) -> TrackingConfiguration {
        let registry = OneProject(Project::new("a", ScmKind::Git));
        TrackingConfiguration::new(&registry, "a", strategy, variable).unwrap()
    }

    fn number(r: Result<BuildReference, ResolutionFailure>) -> u32 {
        r.unwrap().number.get()
    }

    use BuildOutcome::*;

    #[test]
    fn test_history_strategies() {
        let h = history(&[
            Some(Success),
            Some(Unstable),
            Some(Failure),
            Some(Aborted),
            None,
        ]);
        assert_eq!(number(resolve(&h, &config(TrackingStrategy::LastStable, None), None)), 1);
        assert_eq!(number(resolve(&h, &config(TrackingStrategy::LastSuccessful, None), None)), 2);
        assert_eq!(number(resolve(&h, &config(TrackingStrategy::LastFailed, None), None)), 3);
        assert_eq!(number(resolve(&h, &config(TrackingStrategy::LastCompleted, None), None)), 4);
    }

    #[test]
    fn test_no_qualifying_build() {
        let h = history(&[Some(Failure), None]);
        let err = resolve(&h, &config(TrackingStrategy::LastStable, None), None).unwrap_err();
        assert_eq!(err.cause(), ResolutionCause::NoSuchBuild);

        let empty = BuildHistory::default();
        for strategy in TrackingStrategy::ALL.into_iter().filter(|s| s.can_predict_ahead()) {
            let err = resolve(&empty, &config(strategy, None), None).unwrap_err();
            assert_eq!(err.cause(), ResolutionCause::NoSuchBuild);
        }
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let h = history(&[Some(Success), Some(Unstable), Some(Success)]);
        for strategy in TrackingStrategy::ALL.into_iter().filter(|s| s.can_predict_ahead()) {
            let c = config(strategy, None);
            let first = resolve(&h, &c, None).ok();
            let second = resolve(&h, &c, None).ok();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_by_number() {
        let outcomes = vec![Some(Success); 42];
        let h = history(&outcomes);
        let c = config(TrackingStrategy::ByNumber, Some("REV"));

        let env: EnvVars = [("REV".to_string(), "42".to_string())].into();
        let r = resolve(&h, &c, Some(&env)).unwrap();
        assert_eq!(r, BuildReference::new("a", BuildNumber::new(42).unwrap()));

        let env: EnvVars = [("REV".to_string(), "abc".to_string())].into();
        let err = resolve(&h, &c, Some(&env)).unwrap_err();
        assert_eq!(err.cause(), ResolutionCause::UnparsableVariable);

        let err = resolve(&h, &c, Some(&EnvVars::new())).unwrap_err();
        assert_eq!(err.cause(), ResolutionCause::MissingVariable);

        let err = resolve(&h, &c, None).unwrap_err();
        assert_eq!(err.cause(), ResolutionCause::MissingVariable);
    }

    #[test]
    fn test_by_number_edge_values() {
        let h = history(&[Some(Success), Some(Failure)]);
        let c = config(TrackingStrategy::ByNumber, Some("${REV}"));

        let env: EnvVars = [("REV".to_string(), " 2 ".to_string())].into();
        assert_eq!(number(resolve(&h, &c, Some(&env))), 2);

        let env: EnvVars = [("REV".to_string(), "0".to_string())].into();
        let err = resolve(&h, &c, Some(&env)).unwrap_err();
        assert_eq!(err.cause(), ResolutionCause::UnparsableVariable);

        let env: EnvVars = [("REV".to_string(), "7".to_string())].into();
        match resolve(&h, &c, Some(&env)).unwrap_err() {
            ResolutionFailure::NoSuchBuild { number, .. } => {
                assert_eq!(number, BuildNumber::new(7));
            }
            other => panic!("unexpected failure: {other}"),
        }
    }

    #[test]
    fn test_tracking_resolver_unknown_project() {
        let registry: Arc<dyn ProjectRegistry> =
            Arc::new(OneProject(Project::new("b", ScmKind::Git)));
        let resolver = TrackingResolver::new(registry);
        let err = resolver
            .resolve(&config(TrackingStrategy::LastStable, None), None)
            .unwrap_err();
        assert_eq!(err.cause(), ResolutionCause::UnknownProject);
    }
}
