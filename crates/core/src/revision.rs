//! Source-control revisions recorded on builds.

use serde::{Deserialize, Serialize};

/// Error parsing a revision.
#[derive(Debug, thiserror::Error)]
pub enum RevisionError {
    /// Not a hex object id
    #[error("invalid commit id '{sha1}': {source}")]
    InvalidSha1 {
        /// Text that was given
        sha1: String,
        /// Why git rejected it
        #[source]
        source: git2::Error,
    },

    /// Abbreviated ids are not accepted
    #[error("commit id '{0}' is abbreviated; a full 40 character id is required")]
    Abbreviated(String),
}

/// A commit a build checked out, plus the branches it was reached from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRevision", into = "RawRevision")]
pub struct Revision {
    oid: git2::Oid,
    branches: Vec<String>,
}

impl Revision {
    /// Parse a full commit id.
    pub fn parse(sha1: &str) -> Result<Self, RevisionError> {
        let sha1 = sha1.trim();
        if sha1.len() != 40 {
            return Err(RevisionError::Abbreviated(sha1.to_string()));
        }
        let oid = git2::Oid::from_str(sha1).map_err(|source| RevisionError::InvalidSha1 {
            sha1: sha1.to_string(),
            source,
        })?;
        Ok(Self {
            oid,
            branches: Vec::new(),
        })
    }

    /// Record a branch this revision was built from.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branches.push(branch.into());
        self
    }

    /// Lowercase hex commit id.
    pub fn sha1_string(&self) -> String {
        self.oid.to_string()
    }

    /// Abbreviated id for log lines.
    pub fn short(&self) -> String {
        let mut s = self.sha1_string();
        s.truncate(7);
        s
    }

    /// Branches the commit was reached from.
    pub fn branches(&self) -> &[String] {
        &self.branches
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.oid)?;
        if !self.branches.is_empty() {
            write!(f, " ({})", self.branches.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct RawRevision {
    sha1: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    branches: Vec<String>,
}

impl TryFrom<RawRevision> for Revision {
    type Error = RevisionError;

    fn try_from(raw: RawRevision) -> Result<Self, Self::Error> {
        let mut revision = Revision::parse(&raw.sha1)?;
        revision.branches = raw.branches;
        Ok(revision)
    }
}

impl From<Revision> for RawRevision {
    fn from(revision: Revision) -> Self {
        Self {
            sha1: revision.sha1_string(),
            branches: revision.branches,
        }
    }
}

/// Source-control data the checkout step leaves on a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildData {
    /// The revision the build checked out
    pub last_built_revision: Revision,
}

impl BuildData {
    /// Create build data for a checked out revision.
    pub fn new(revision: Revision) -> Self {
        Self {
            last_built_revision: revision,
        }
    }
}
