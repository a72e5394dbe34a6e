//! JSON snapshots of a [`MemoryHost`].
//!
//! Lets the CLI keep a host between invocations. The file holds the host
//! settings and every project with its builds, provenance and tracking
//! configuration. Console logs are not kept.

use std::collections::HashSet;
use std::path::Path;
use serde::{Deserialize, Serialize};
use tokio::fs;
use trackgit_core::{HostError, Project};
use crate::memory::{HostConfig, MemoryHost};

/// Result type for snapshot operations.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Errors reading or writing a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Same project listed twice
    #[error("project '{0}' appears more than once")]
    DuplicateProject(String),

    /// Host refused the read
    #[error(transparent)]
    Host(#[from] HostError),
}

/// On-disk form of a host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostSnapshot {
    /// Host settings
    #[serde(default)]
    pub settings: HostConfig,

    /// All projects
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl HostSnapshot {
    /// Capture the current state of `host`.
    pub fn capture(host: &MemoryHost) -> Result<Self> {
        Ok(Self {
            settings: host.config().clone(),
            projects: host.projects()?,
        })
    }

    /// Build a host from this snapshot.
    pub fn into_host(self) -> Result<MemoryHost> {
        let mut seen = HashSet::new();
        for project in &self.projects {
            if !seen.insert(project.id.clone()) {
                return Err(SnapshotError::DuplicateProject(project.id.to_string()));
            }
        }
        Ok(MemoryHost::from_projects(self.settings, self.projects))
    }

    /// Read a snapshot file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref()).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Write this snapshot, creating parent directories as needed.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).await?;
        Ok(())
    }
}
