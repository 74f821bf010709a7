use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{TimeZone, Utc};
use git2::{BranchType, ErrorCode, ObjectType, Oid, Repository as Git2Repo};
use tracing::debug;

use crate::domain::{Branch, Commit, Tag};
use crate::error::{GitverError, Result};

/// Wrapper around git2::Repository with our trait interface
///
/// `git2::Repository` is `Send` but not `Sync`; queries serialise on a mutex
/// so one backend can be shared by calculations running on several threads.
pub struct Git2Repository {
    repo: Mutex<Git2Repo>,
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let repo = Git2Repo::discover(path)?;
        debug!(path = %repo.path().display(), "opened repository");
        Ok(Git2Repository::from_git2(repo))
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository {
            repo: Mutex::new(repo),
        }
    }

    fn repo(&self) -> Result<MutexGuard<'_, Git2Repo>> {
        self.repo
            .lock()
            .map_err(|_| GitverError::graph("repository handle poisoned by a panicked reader"))
    }

    /// Resolve a revision (sha, abbreviated sha, ref name) to a commit id
    pub fn resolve_commit(&self, spec: &str) -> Result<Oid> {
        let repo = self.repo()?;
        let object = repo.revparse_single(spec)?;
        let commit = object.peel_to_commit()?;
        Ok(commit.id())
    }
}

fn not_found(e: &git2::Error) -> bool {
    e.code() == ErrorCode::NotFound
}

impl super::Repository for Git2Repository {
    fn commit(&self, id: Oid) -> Result<Commit> {
        let repo = self.repo()?;
        let commit = repo.find_commit(id).map_err(|e| {
            if not_found(&e) {
                GitverError::graph(format!("Commit not found: {}", id))
            } else {
                GitverError::Git(e)
            }
        })?;
        let timestamp = Utc
            .timestamp_opt(commit.time().seconds(), 0)
            .single()
            .unwrap_or_default();
        Ok(Commit {
            id,
            parents: commit.parent_ids().collect(),
            timestamp,
            message: commit.message().unwrap_or("").to_string(),
        })
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        let repo = self.repo()?;
        let names = repo.tag_names(None)?;
        let mut tags = Vec::new();

        for name in names.iter().flatten() {
            let reference = repo.find_reference(&format!("refs/tags/{}", name))?;
            let annotated = reference
                .peel(ObjectType::Tag)
                .map(|object| object.kind() == Some(ObjectType::Tag))
                .unwrap_or(false);
            // Tags on trees or blobs carry no version information
            let Ok(commit) = reference.peel_to_commit() else {
                debug!(tag = name, "skipping tag that does not point at a commit");
                continue;
            };
            let tag = Tag::new(name, commit.id());
            tags.push(if annotated { tag.annotated() } else { tag });
        }

        Ok(tags)
    }

    fn branches(&self) -> Result<Vec<Branch>> {
        let repo = self.repo()?;
        let mut branches = Vec::new();

        for entry in repo.branches(None)? {
            let (branch, kind) = entry?;
            let Some(name) = branch.name()? else {
                continue;
            };
            if kind == BranchType::Remote && name.ends_with("/HEAD") {
                continue;
            }
            let Some(tip) = branch.get().target() else {
                continue;
            };
            let item = Branch::new(name, tip);
            branches.push(match kind {
                BranchType::Remote => item.remote(),
                BranchType::Local if branch.is_head() => item.current(),
                BranchType::Local => item,
            });
        }

        Ok(branches)
    }

    fn current_branch(&self) -> Result<Branch> {
        let repo = self.repo()?;
        let head = repo.head()?;
        let tip = head.peel_to_commit()?.id();

        if repo.head_detached()? {
            return Ok(Branch::new("HEAD", tip).current());
        }
        let name = head.shorthand().unwrap_or("HEAD");
        Ok(Branch::new(name, tip).current())
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        let repo = self.repo()?;
        Ok(repo.graph_descendant_of(descendant, ancestor)?)
    }

    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>> {
        let repo = self.repo()?;
        match repo.merge_base(a, b) {
            Ok(base) => Ok(Some(base)),
            Err(e) if not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
