use chrono::{DateTime, Utc};
use git2::Oid;

/// A commit as seen by the version engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: Oid,
    /// First parent first; two or more parents make a merge commit
    pub parents: Vec<Oid>,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl Commit {
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn first_parent(&self) -> Option<Oid> {
        self.parents.first().copied()
    }

    /// The merged-in side of a merge commit
    pub fn second_parent(&self) -> Option<Oid> {
        self.parents.get(1).copied()
    }

    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn sha(&self) -> String {
        self.id.to_string()
    }

    pub fn short_sha(&self) -> String {
        short_sha(self.id)
    }
}

/// First seven hex characters of an object id
pub fn short_sha(id: Oid) -> String {
    let mut sha = id.to_string();
    sha.truncate(7);
    sha
}
