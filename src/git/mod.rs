//! Repository graph abstraction layer
//!
//! This module provides a read-only, trait-based view over a commit graph,
//! allowing the version engine to run against a real git repository or an
//! in-memory graph for testing.
//!
//! # Overview
//!
//! The primary abstraction is the [Repository] trait. The concrete
//! implementations include:
//!
//! - [repository::Git2Repository]: A real implementation using the `git2` crate
//! - [mock::MockRepository]: An in-memory graph for tests and pre-materialised histories
//!
//! Only four methods are required; traversal helpers (ancestry, merge bases,
//! commit walks) have default implementations built on [Repository::commit],
//! which backends may override with native equivalents.
//!
//! # Usage
//!
//! ```rust
//! use gitver::git::{MockRepository, Repository};
//!
//! let mut repo = MockRepository::new();
//! let first = (&mut repo).commit("initial");
//! let second = (&mut repo).commit("second");
//!
//! assert!(repo.is_ancestor(first, second).unwrap());
//! let walked: Vec<_> = repo
//!     .commits_between(Some(first), second, true)
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(walked.len(), 1);
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use std::collections::{BinaryHeap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use git2::Oid;

use crate::domain::{Branch, Commit, SemanticVersion, Tag, TagParser};
use crate::error::Result;

/// Read-only view over commits, tags and branches
///
/// ## Thread Safety
///
/// All implementors must be `Send + Sync` so independent calculations can share
/// one snapshot across threads.
///
/// ## Error Handling
///
/// A lookup of a commit that is not in the graph must fail with
/// [crate::error::GitverError::GraphInconsistency] (or the backend's own error);
/// the engine never retries.
///
/// ## Implementations
///
/// - [Git2Repository](repository::Git2Repository): Real Git implementation using the `git2` crate
/// - [MockRepository](mock::MockRepository): In-memory graph
pub trait Repository: Send + Sync {
    /// Look up a single commit
    fn commit(&self, id: Oid) -> Result<Commit>;

    /// All tags, peeled to the commits they point at
    fn tags(&self) -> Result<Vec<Tag>>;

    /// All branches, local and remote-tracking
    fn branches(&self) -> Result<Vec<Branch>>;

    /// The branch HEAD points at
    ///
    /// A detached HEAD is reported as a branch named `HEAD` at the checked-out commit.
    fn current_branch(&self) -> Result<Branch>;

    /// Parents of a commit, first parent first
    fn parents_of(&self, id: Oid) -> Result<Vec<Oid>> {
        Ok(self.commit(id)?.parents)
    }

    /// Tags pointing at the given commit
    fn tags_on(&self, id: Oid) -> Result<Vec<Tag>> {
        Ok(self
            .tags()?
            .into_iter()
            .filter(|tag| tag.target == id)
            .collect())
    }

    /// Every tag that parses as a version, with its parsed version
    fn version_tags(&self, parser: &TagParser) -> Result<Vec<(Tag, SemanticVersion)>> {
        Ok(self
            .tags()?
            .into_iter()
            .filter_map(|tag| parser.parse(&tag.name).map(|version| (tag, version)))
            .collect())
    }

    /// Whether `ancestor` is reachable from `descendant` (or equal to it)
    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([descendant]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            for parent in self.parents_of(id)? {
                if parent == ancestor {
                    return Ok(true);
                }
                queue.push_back(parent);
            }
        }
        Ok(false)
    }

    /// Best common ancestor of two commits
    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>> {
        let reachable_from_a = ancestors(self, a)?;
        let mut walk = DateOrderWalk::new(self, b)?;
        while let Some(commit) = walk.next_commit()? {
            if reachable_from_a.contains(&commit.id) {
                return Ok(Some(commit.id));
            }
        }
        Ok(None)
    }

    /// Commits after `from_exclusive` up to and including `to_inclusive`, newest first
    ///
    /// With `first_parent_only` the walk follows first parents and stops at the
    /// first commit already contained in `from_exclusive`'s history. Otherwise it
    /// yields every commit reachable from `to_inclusive` but not from
    /// `from_exclusive` (git's `from..to`). `None` walks to the root.
    fn commits_between(
        &self,
        from_exclusive: Option<Oid>,
        to_inclusive: Oid,
        first_parent_only: bool,
    ) -> CommitWalk<'_, Self>
    where
        Self: Sized,
    {
        CommitWalk::new(self, from_exclusive, to_inclusive, first_parent_only)
    }
}

/// Every commit reachable from `id`, including `id`
pub fn ancestors<R: Repository + ?Sized>(repo: &R, id: Oid) -> Result<HashSet<Oid>> {
    let mut seen = HashSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        if seen.insert(current) {
            stack.extend(repo.parents_of(current)?);
        }
    }
    Ok(seen)
}

/// Walks history newest-first by commit time, like `git log --date-order`
struct DateOrderWalk<'a, R: Repository + ?Sized> {
    repo: &'a R,
    heap: BinaryHeap<(DateTime<Utc>, Oid)>,
    seen: HashSet<Oid>,
}

impl<'a, R: Repository + ?Sized> DateOrderWalk<'a, R> {
    fn new(repo: &'a R, start: Oid) -> Result<Self> {
        let mut heap = BinaryHeap::new();
        heap.push((repo.commit(start)?.timestamp, start));
        Ok(DateOrderWalk {
            repo,
            heap,
            seen: HashSet::new(),
        })
    }

    fn next_commit(&mut self) -> Result<Option<Commit>> {
        while let Some((_, id)) = self.heap.pop() {
            if !self.seen.insert(id) {
                continue;
            }
            let commit = self.repo.commit(id)?;
            for parent in &commit.parents {
                if !self.seen.contains(parent) {
                    self.heap.push((self.repo.commit(*parent)?.timestamp, *parent));
                }
            }
            return Ok(Some(commit));
        }
        Ok(None)
    }
}

/// Lazy walk returned by [Repository::commits_between]
///
/// Cloning restarts the walk from the top of the range, so a range can be
/// traversed more than once.
pub struct CommitWalk<'a, R: Repository> {
    repo: &'a R,
    from_exclusive: Option<Oid>,
    to_inclusive: Oid,
    first_parent_only: bool,
    state: Option<WalkState>,
    done: bool,
}

struct WalkState {
    hidden: HashSet<Oid>,
    next_first_parent: Option<Oid>,
    heap: BinaryHeap<(DateTime<Utc>, Oid)>,
    seen: HashSet<Oid>,
}

impl<'a, R: Repository> Clone for CommitWalk<'a, R> {
    fn clone(&self) -> Self {
        CommitWalk::new(
            self.repo,
            self.from_exclusive,
            self.to_inclusive,
            self.first_parent_only,
        )
    }
}

impl<'a, R: Repository> CommitWalk<'a, R> {
    fn new(
        repo: &'a R,
        from_exclusive: Option<Oid>,
        to_inclusive: Oid,
        first_parent_only: bool,
    ) -> Self {
        CommitWalk {
            repo,
            from_exclusive,
            to_inclusive,
            first_parent_only,
            state: None,
            done: false,
        }
    }

    fn init(&self) -> Result<WalkState> {
        let hidden = match self.from_exclusive {
            Some(from) => ancestors(self.repo, from)?,
            None => HashSet::new(),
        };
        let mut heap = BinaryHeap::new();
        if !self.first_parent_only && !hidden.contains(&self.to_inclusive) {
            heap.push((
                self.repo.commit(self.to_inclusive)?.timestamp,
                self.to_inclusive,
            ));
        }
        Ok(WalkState {
            hidden,
            next_first_parent: Some(self.to_inclusive),
            heap,
            seen: HashSet::new(),
        })
    }

    fn advance(&mut self) -> Result<Option<Commit>> {
        if self.state.is_none() {
            self.state = Some(self.init()?);
        }
        let repo = self.repo;
        let first_parent_only = self.first_parent_only;
        let Some(state) = self.state.as_mut() else {
            return Ok(None);
        };

        if first_parent_only {
            let Some(id) = state.next_first_parent.take() else {
                return Ok(None);
            };
            if state.hidden.contains(&id) {
                return Ok(None);
            }
            let commit = repo.commit(id)?;
            state.next_first_parent = commit.first_parent();
            return Ok(Some(commit));
        }

        while let Some((_, id)) = state.heap.pop() {
            if !state.seen.insert(id) {
                continue;
            }
            let commit = repo.commit(id)?;
            for parent in &commit.parents {
                if !state.seen.contains(parent) && !state.hidden.contains(parent) {
                    state.heap.push((repo.commit(*parent)?.timestamp, *parent));
                }
            }
            return Ok(Some(commit));
        }
        Ok(None)
    }
}

impl<'a, R: Repository> Iterator for CommitWalk<'a, R> {
    type Item = Result<Commit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(commit)) => Some(Ok(commit)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(walk: CommitWalk<'_, MockRepository>) -> Vec<Oid> {
        walk.map(|c| c.unwrap().id).collect()
    }

    #[test]
    fn test_first_parent_walk_skips_merged_side() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.branch("feature/x");
        repo.checkout("feature/x");
        let b = (&mut repo).commit("B");
        repo.checkout("main");
        let m = repo.merge("feature/x");

        assert_eq!(ids(repo.commits_between(Some(a), m, true)), vec![m]);
        let mut full = ids(repo.commits_between(Some(a), m, false));
        full.sort();
        let mut expected = vec![m, b];
        expected.sort();
        assert_eq!(full, expected);
    }

    #[test]
    fn test_walk_to_root() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        let b = (&mut repo).commit("B");
        assert_eq!(ids(repo.commits_between(None, b, true)), vec![b, a]);
    }

    #[test]
    fn test_walk_is_restartable() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("A");
        let b = (&mut repo).commit("B");
        let walk = repo.commits_between(None, b, false);
        let again = walk.clone();
        assert_eq!(walk.count(), 2);
        assert_eq!(again.count(), 2);
    }

    #[test]
    fn test_is_ancestor_and_merge_base() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.branch("feature/x");
        let b = (&mut repo).commit("B");
        repo.checkout("feature/x");
        let c = (&mut repo).commit("C");

        assert!(repo.is_ancestor(a, b).unwrap());
        assert!(repo.is_ancestor(a, a).unwrap());
        assert!(!repo.is_ancestor(b, c).unwrap());
        assert_eq!(repo.merge_base(b, c).unwrap(), Some(a));
    }

    #[test]
    fn test_version_tags_skips_non_versions() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.tag("v1.0.0", a);
        repo.tag("nightly", a);
        let tags = repo.version_tags(&TagParser::default()).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].1, SemanticVersion::new(1, 0, 0));
    }
}
