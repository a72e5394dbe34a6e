//! Build tracking engine.
//!
//! Decides which upstream build a dependent build follows, reads the
//! revision it checked out, and pins the dependent build to it at start.

#![warn(missing_docs)]

pub mod expand;
pub mod resolver;
pub mod extractor;
pub mod provenance;
pub mod hook;
pub mod forecast;

pub use resolver::{resolve, TrackingResolver};
pub use extractor::{Extraction, RevisionExtractor};
pub use provenance::{ProvenanceQuery, TrackedBuild};
pub use hook::{HookConfig, HookError, HookOutcome, PropagationHook};
pub use forecast::{Prediction, TrackingForecast};
