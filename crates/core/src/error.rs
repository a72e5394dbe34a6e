//! Error types shared by the tracking engine and hosts.

use crate::id::{BuildNumber, ProjectId};
use crate::strategy::TrackingStrategy;
use thiserror::Error;

/// Failures talking to the host platform.
#[derive(Error, Debug)]
pub enum HostError {
    /// Host is shutting down or its state is unusable
    #[error("host unavailable: {0}")]
    Unavailable(String),

    /// Project not in the registry
    #[error("unknown project '{0}'")]
    UnknownProject(ProjectId),

    /// Build not in the project's history
    #[error("unknown build {project} #{number}")]
    UnknownBuild {
        /// Owning project
        project: ProjectId,
        /// Missing build number
        number: BuildNumber,
    },

    /// A build already carries provenance
    #[error("build {project} #{number} already has a provenance record")]
    ProvenanceAlreadyAttached {
        /// Owning project
        project: ProjectId,
        /// Build that already has a record
        number: BuildNumber,
    },

    /// Build already finished
    #[error("build {project} #{number} is not running")]
    NotRunning {
        /// Owning project
        project: ProjectId,
        /// Finished build
        number: BuildNumber,
    },

    /// Configuration rejected
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A build-start listener failed the setup step
    #[error("setup step '{listener}' failed: {source}")]
    SetupFailed {
        /// Name of the failing listener
        listener: String,
        /// What the listener reported
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Raised when building a tracking configuration.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Source project left blank
    #[error("'project to track' is required")]
    MissingSourceProject,

    /// Source project not in the registry
    #[error("Project to track unknown: {project}{}", suggestion_suffix(.suggestion))]
    UnknownSourceProject {
        /// Name as given
        project: String,
        /// Closest known project name
        suggestion: Option<String>,
    },

    /// `ByNumber` needs a variable to read
    #[error("strategy '{}' requires a build number variable", TrackingStrategy::ByNumber)]
    MissingBuildNumberVariable,

    /// Registry could not be consulted
    #[error("cannot validate configuration: {0}")]
    HostUnavailable(String),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(". Did you mean '{name}'?"),
        None => String::new(),
    }
}

/// Tag for the cause of a [`ResolutionFailure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionCause {
    /// Source project no longer exists
    UnknownProject,
    /// No build qualifies
    NoSuchBuild,
    /// Build number variable not set
    MissingVariable,
    /// Build number variable not an integer
    UnparsableVariable,
    /// Host could not be read
    HostUnavailable,
}

/// Could not decide which upstream build to track.
#[derive(Error, Debug)]
pub enum ResolutionFailure {
    /// Source project vanished since configuration
    #[error("Unknown source project for tracking-git : {project}")]
    UnknownProject {
        /// Missing project
        project: ProjectId,
    },

    /// Strategy matched nothing
    #[error("{strategy} not found for project {project}{}", number_suffix(.number))]
    NoSuchBuild {
        /// Source project
        project: ProjectId,
        /// Strategy that found nothing
        strategy: TrackingStrategy,
        /// Requested number, for `ByNumber`
        number: Option<BuildNumber>,
    },

    /// Variable absent from the build environment
    #[error("build number variable '{variable}' is not set")]
    MissingVariable {
        /// Variable name as configured
        variable: String,
    },

    /// Variable present but not a build number
    #[error("build number variable '{variable}' expanded to '{value}', which is not a build number")]
    UnparsableVariable {
        /// Variable name as configured
        variable: String,
        /// Expanded value
        value: String,
    },

    /// Host could not be read
    #[error("cannot resolve tracked build: {0}")]
    HostUnavailable(String),
}

fn number_suffix(number: &Option<BuildNumber>) -> String {
    match number {
        Some(n) => format!(" (build #{n})"),
        None => String::new(),
    }
}

impl ResolutionFailure {
    /// The cause tag.
    pub fn cause(&self) -> ResolutionCause {
        match self {
            Self::UnknownProject { .. } => ResolutionCause::UnknownProject,
            Self::NoSuchBuild { .. } => ResolutionCause::NoSuchBuild,
            Self::MissingVariable { .. } => ResolutionCause::MissingVariable,
            Self::UnparsableVariable { .. } => ResolutionCause::UnparsableVariable,
            Self::HostUnavailable(_) => ResolutionCause::HostUnavailable,
        }
    }
}

/// Could not dereference a tracked build.
#[derive(Error, Debug)]
pub enum ExtractionFailure {
    /// Project missing
    #[error("tracked project '{project}' no longer exists")]
    UnknownProject {
        /// Missing project
        project: ProjectId,
    },

    /// Build missing
    #[error("tracked build {project} #{number} no longer exists")]
    UnknownBuild {
        /// Owning project
        project: ProjectId,
        /// Missing build number
        number: BuildNumber,
    },

    /// Host could not be read
    #[error("cannot read tracked build: {0}")]
    HostUnavailable(String),
}
