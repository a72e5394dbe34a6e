//! Reference host for trackgit.
//!
//! An in-memory build host implementing the registry and build-context
//! interfaces from `trackgit-core`, an explicit build lifecycle event
//! source, and JSON snapshots so the state survives between CLI runs.

#![warn(missing_docs)]

pub mod lifecycle;
pub mod memory;
pub mod snapshot;

pub use lifecycle::BuildLifecycle;
pub use memory::{CheckoutPlan, HostConfig, MemoryHost, PendingBuild};
pub use snapshot::{HostSnapshot, SnapshotError};
