//! In-memory reference host.
//!
//! Holds projects and their build histories behind a single `RwLock`, so a
//! registry lookup always returns one consistent snapshot of a project:
//! a build that completes concurrently is either fully visible or not.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trackgit_core::{
    BuildContext, BuildData, BuildOutcome, BuildRecord, BuildReference, EnvVars, HostError,
    Project, ProjectId, ProjectRegistry, ProvenanceRecord, Revision, ScmKind,
    TrackingConfiguration, TrackingStrategy,
};
use crate::lifecycle::BuildLifecycle;

/// Host settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Base URL builds are browsable under
    pub base_url: Option<String>,

    /// Fail a build when a start listener fails its setup step
    pub fail_build_on_setup_error: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            fail_build_on_setup_error: true,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct HostState {
    pub(crate) projects: BTreeMap<ProjectId, ProjectState>,
    shut_down: bool,
}

#[derive(Debug)]
pub(crate) struct ProjectState {
    pub(crate) project: Project,
    /// Console output per build number
    pub(crate) logs: BTreeMap<u32, Vec<String>>,
}

impl ProjectState {
    fn new(project: Project) -> Self {
        Self {
            project,
            logs: BTreeMap::new(),
        }
    }
}

fn poison_err<T>(_: PoisonError<T>) -> HostError {
    HostError::Unavailable("lock poisoned".to_string())
}

/// A single-process build host for tests, demos and the CLI.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: RwLock<HostState>,
    config: HostConfig,
}

impl MemoryHost {
    /// Create an empty host.
    pub fn new(config: HostConfig) -> Self {
        Self {
            state: RwLock::new(HostState::default()),
            config,
        }
    }

    /// Host settings.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub(crate) fn from_projects(config: HostConfig, projects: Vec<Project>) -> Self {
        let projects = projects
            .into_iter()
            .map(|p| (p.id.clone(), ProjectState::new(p)))
            .collect();
        Self {
            state: RwLock::new(HostState {
                projects,
                shut_down: false,
            }),
            config,
        }
    }

    pub(crate) fn projects(&self) -> Result<Vec<Project>, HostError> {
        let state = self.read()?;
        Ok(state.projects.values().map(|p| p.project.clone()).collect())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HostState>, HostError> {
        let state = self.state.read().map_err(poison_err)?;
        if state.shut_down {
            return Err(HostError::Unavailable("host is shutting down".to_string()));
        }
        Ok(state)
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HostState>, HostError> {
        let state = self.state.write().map_err(poison_err)?;
        if state.shut_down {
            return Err(HostError::Unavailable("host is shutting down".to_string()));
        }
        Ok(state)
    }

    /// Register a new project. Replaces nothing: an existing name is kept.
    pub fn add_project(&self, id: impl Into<ProjectId>, scm: ScmKind) -> Result<(), HostError> {
        let id = id.into();
        let mut state = self.write()?;
        state
            .projects
            .entry(id.clone())
            .or_insert_with(|| ProjectState::new(Project::new(id.clone(), scm)));
        debug!("Registered project {}", id);
        Ok(())
    }

    /// Delete a project and its builds.
    pub fn remove_project(&self, id: &ProjectId) -> Result<Option<Project>, HostError> {
        let mut state = self.write()?;
        Ok(state.projects.remove(id).map(|p| p.project))
    }

    /// Validate and store a tracking configuration on `project`.
    pub fn configure_tracking(
        &self,
        project: &ProjectId,
        source_project: &str,
        strategy: TrackingStrategy,
        build_number_variable: Option<&str>,
    ) -> Result<TrackingConfiguration, HostError> {
        let config =
            TrackingConfiguration::new(self, source_project, strategy, build_number_variable)?;
        let mut state = self.write()?;
        let entry = state
            .projects
            .get_mut(project)
            .ok_or_else(|| HostError::UnknownProject(project.clone()))?;
        entry.project.tracking = Some(config.clone());
        info!(
            "Project {} now tracks {} ({})",
            project,
            config.source_project(),
            config.strategy()
        );
        Ok(config)
    }

    /// Remove the tracking configuration from `project`.
    pub fn clear_tracking(&self, project: &ProjectId) -> Result<(), HostError> {
        let mut state = self.write()?;
        let entry = state
            .projects
            .get_mut(project)
            .ok_or_else(|| HostError::UnknownProject(project.clone()))?;
        entry.project.tracking = None;
        Ok(())
    }

    /// Record an already finished build, as if it had run without any
    /// start listeners.
    pub fn record_build(
        &self,
        project: &ProjectId,
        outcome: BuildOutcome,
        revision: Option<Revision>,
    ) -> Result<BuildReference, HostError> {
        let mut state = self.write()?;
        let entry = state
            .projects
            .get_mut(project)
            .ok_or_else(|| HostError::UnknownProject(project.clone()))?;
        let number = entry.project.history.next_build_number();
        let mut build = BuildRecord::running(project.clone(), number);
        let now = chrono::Utc::now();
        build.outcome = Some(outcome);
        build.completed_at = Some(now);
        if entry.project.scm == ScmKind::Git {
            build.build_data = revision.map(BuildData::new);
        }
        let reference = build.reference();
        entry.project.history.push(build);
        debug!("Recorded {} as {}", reference, outcome);
        Ok(reference)
    }

    /// Start a build of `project`, firing `lifecycle` before checkout.
    ///
    /// `parameters` are added to the build's environment. When a listener
    /// fails and the host is configured to fail builds on setup errors, the
    /// build is recorded as a failure and the error returned.
    pub fn start_build(
        self: &Arc<Self>,
        lifecycle: &BuildLifecycle,
        project: &ProjectId,
        parameters: EnvVars,
    ) -> Result<PendingBuild, HostError> {
        let reference = {
            let mut state = self.write()?;
            let entry = state
                .projects
                .get_mut(project)
                .ok_or_else(|| HostError::UnknownProject(project.clone()))?;
            let number = entry.project.history.next_build_number();
            let build = BuildRecord::running(project.clone(), number);
            let reference = build.reference();
            entry.project.history.push(build);
            reference
        };
        info!("Started {}", reference);

        let mut environment = parameters;
        environment.insert("JOB_NAME".to_string(), reference.project.to_string());
        environment.insert("BUILD_NUMBER".to_string(), reference.number.to_string());
        if let Some(base) = self.root_url() {
            environment.insert(
                "BUILD_URL".to_string(),
                format!("{}job/{}/{}/", base, reference.project, reference.number),
            );
        }

        let mut pending = PendingBuild {
            host: Arc::clone(self),
            reference,
            environment,
            plan: CheckoutPlan::default(),
        };

        if let Err(err) = lifecycle.fire_started(&mut pending) {
            if self.config.fail_build_on_setup_error {
                self.complete(&pending.reference, BuildOutcome::Failure, None)?;
                return Err(err);
            }
            warn!("Continuing {} after setup failure: {}", pending.reference, err);
        }

        Ok(pending)
    }

    /// Retention: delete one build from a project's history.
    pub fn delete_build(&self, build: &BuildReference) -> Result<Option<BuildRecord>, HostError> {
        let mut state = self.write()?;
        let Some(entry) = state.projects.get_mut(&build.project) else {
            return Ok(None);
        };
        entry.logs.remove(&build.number.get());
        Ok(entry.project.history.remove(build.number))
    }

    /// Look up a single build.
    pub fn build(&self, reference: &BuildReference) -> Result<Option<BuildRecord>, HostError> {
        let state = self.read()?;
        Ok(state
            .projects
            .get(&reference.project)
            .and_then(|p| p.project.history.build_by_number(reference.number))
            .cloned())
    }

    /// Console output of a build.
    pub fn console_log(&self, reference: &BuildReference) -> Result<Vec<String>, HostError> {
        let state = self.read()?;
        Ok(state
            .projects
            .get(&reference.project)
            .and_then(|p| p.logs.get(&reference.number.get()))
            .cloned()
            .unwrap_or_default())
    }

    /// Stop serving lookups. Every later call fails with `Unavailable`.
    pub fn shutdown(&self) {
        match self.state.write() {
            Ok(mut state) => state.shut_down = true,
            Err(poisoned) => poisoned.into_inner().shut_down = true,
        }
        info!("Host shut down");
    }

    fn append_log(&self, reference: &BuildReference, line: &str) -> Result<(), HostError> {
        let mut state = self.write()?;
        let entry = state
            .projects
            .get_mut(&reference.project)
            .ok_or_else(|| HostError::UnknownProject(reference.project.clone()))?;
        entry
            .logs
            .entry(reference.number.get())
            .or_default()
            .push(line.to_string());
        Ok(())
    }

    fn attach(&self, reference: &BuildReference, record: ProvenanceRecord) -> Result<(), HostError> {
        let mut state = self.write()?;
        let build = running_build_mut(&mut state, reference)?;
        if build.provenance.is_some() {
            return Err(HostError::ProvenanceAlreadyAttached {
                project: reference.project.clone(),
                number: reference.number,
            });
        }
        build.provenance = Some(record);
        Ok(())
    }

    fn complete(
        &self,
        reference: &BuildReference,
        outcome: BuildOutcome,
        checkout: Option<Revision>,
    ) -> Result<BuildRecord, HostError> {
        let mut state = self.write()?;
        let scm = state
            .projects
            .get(&reference.project)
            .map(|p| p.project.scm)
            .ok_or_else(|| HostError::UnknownProject(reference.project.clone()))?;
        let build = running_build_mut(&mut state, reference)?;
        build.outcome = Some(outcome);
        build.completed_at = Some(chrono::Utc::now());
        if scm == ScmKind::Git {
            build.build_data = checkout.map(BuildData::new);
        }
        info!("Finished {}: {}", reference, outcome);
        Ok(build.clone())
    }
}

fn running_build_mut<'a>(
    state: &'a mut HostState,
    reference: &BuildReference,
) -> Result<&'a mut BuildRecord, HostError> {
    let build = state
        .projects
        .get_mut(&reference.project)
        .and_then(|p| p.project.history.build_by_number_mut(reference.number))
        .ok_or_else(|| HostError::UnknownBuild {
            project: reference.project.clone(),
            number: reference.number,
        })?;
    if build.is_completed() {
        return Err(HostError::NotRunning {
            project: reference.project.clone(),
            number: reference.number,
        });
    }
    Ok(build)
}

impl ProjectRegistry for MemoryHost {
    fn lookup_project(&self, id: &ProjectId) -> Result<Option<Project>, HostError> {
        let state = self.read()?;
        Ok(state.projects.get(id).map(|p| p.project.clone()))
    }

    fn project_ids(&self) -> Result<Vec<ProjectId>, HostError> {
        let state = self.read()?;
        Ok(state.projects.keys().cloned().collect())
    }

    fn root_url(&self) -> Option<String> {
        self.config.base_url.as_ref().map(|url| {
            if url.ends_with('/') {
                url.clone()
            } else {
                format!("{url}/")
            }
        })
    }
}

/// What the checkout step will do once it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutPlan {
    explicit_revision: Option<Revision>,
}

impl CheckoutPlan {
    /// Pin the checkout to `revision`.
    pub fn set_explicit_revision(&mut self, revision: Revision) {
        self.explicit_revision = Some(revision);
    }

    /// The pinned revision, if any.
    pub fn explicit_revision(&self) -> Option<&Revision> {
        self.explicit_revision.as_ref()
    }
}

/// A started build that has not checked out yet.
///
/// Owns its checkout plan; dropping or aborting the build discards it.
#[derive(Debug)]
pub struct PendingBuild {
    host: Arc<MemoryHost>,
    reference: BuildReference,
    environment: EnvVars,
    plan: CheckoutPlan,
}

impl PendingBuild {
    /// Which build this is.
    pub fn reference(&self) -> &BuildReference {
        &self.reference
    }

    /// Environment later steps of the build see.
    pub fn environment(&self) -> &EnvVars {
        &self.environment
    }

    /// The pending checkout plan.
    pub fn checkout_plan(&self) -> &CheckoutPlan {
        &self.plan
    }

    /// Run the checkout and finish the build.
    ///
    /// The checkout uses the pinned revision when one was set, otherwise
    /// `head` (the branch head the SCM would resolve).
    pub fn finish(self, head: Option<Revision>, outcome: BuildOutcome) -> Result<BuildRecord, HostError> {
        let checkout = match self.plan.explicit_revision {
            Some(pinned) => {
                debug!("Checking out pinned revision {} for {}", pinned, self.reference);
                Some(pinned)
            }
            None => head,
        };
        self.host.complete(&self.reference, outcome, checkout)
    }

    /// Abort before checkout; the plan is dropped with the build.
    pub fn abort(self) -> Result<BuildRecord, HostError> {
        self.host.complete(&self.reference, BuildOutcome::Aborted, None)
    }
}

impl BuildContext for PendingBuild {
    fn build(&self) -> &BuildReference {
        &self.reference
    }

    fn resolved_environment(&self) -> Result<EnvVars, HostError> {
        Ok(self.environment.clone())
    }

    fn set_environment_variable(&mut self, name: &str, value: String) {
        self.environment.insert(name.to_string(), value);
    }

    fn log(&mut self, message: &str) {
        if let Err(err) = self.host.append_log(&self.reference, message) {
            warn!("Dropping log line for {}: {}", self.reference, err);
        }
    }

    fn set_explicit_revision(&mut self, revision: Revision) {
        self.plan.set_explicit_revision(revision);
    }

    fn attach_provenance(&mut self, record: ProvenanceRecord) -> Result<(), HostError> {
        self.host.attach(&self.reference, record)
    }
}
