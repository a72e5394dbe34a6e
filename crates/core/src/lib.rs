//! trackgit core data models.
//!
//! Projects, builds and revisions as the host platform exposes them, the
//! tracking configuration a dependent project carries, the provenance
//! record attached to the builds it starts, and the host-facing traits the
//! tracking engine reads through.

#![warn(missing_docs)]

// Identities
mod id;

// Builds and source control
mod build;
mod revision;

// Tracking
mod strategy;
mod config;
mod provenance;

// Host interfaces
mod host;
mod error;

pub use id::{BuildNumber, ProjectId};
pub use build::{BuildHistory, BuildOutcome, BuildRecord, BuildReference};
pub use revision::{BuildData, Revision, RevisionError};
pub use strategy::TrackingStrategy;
pub use config::{nearest_project, TrackingConfiguration};
pub use provenance::{ProvenanceRecord, TRACKING_BUILD_ENV};
pub use host::{
    BuildContext, BuildStartListener, EnvVars, Project, ProjectRegistry, RecordedBuildData,
    RevisionSource, ScmKind,
};
pub use error::{
    ConfigurationError, ExtractionFailure, HostError, ResolutionCause, ResolutionFailure,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
