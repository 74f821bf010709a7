use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, TimeZone, Utc};
use git2::Oid;
use indexmap::IndexMap;

use crate::domain::{Branch, Commit, Tag};
use crate::error::{GitverError, Result};
use crate::git::Repository;

const EPOCH: i64 = 1_700_000_000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Head {
    Branch(String),
    Detached(Oid),
}

/// In-memory commit graph for tests and pre-materialised histories
///
/// Commits get deterministic ids and strictly increasing timestamps, one
/// minute apart. A fresh repository has an unborn `main` branch checked out.
#[derive(Debug, Clone)]
pub struct MockRepository {
    commits: HashMap<Oid, Commit>,
    tags: Vec<Tag>,
    branch_heads: IndexMap<String, Oid>,
    remote_branches: IndexMap<String, Oid>,
    head: Head,
    counter: u64,
}

impl MockRepository {
    /// Create a new empty mock repository with `main` checked out
    pub fn new() -> Self {
        Self::with_initial_branch("main")
    }

    /// Create an empty repository with the given unborn branch checked out
    pub fn with_initial_branch(name: impl Into<String>) -> Self {
        MockRepository {
            commits: HashMap::new(),
            tags: Vec::new(),
            branch_heads: IndexMap::new(),
            remote_branches: IndexMap::new(),
            head: Head::Branch(name.into()),
            counter: 0,
        }
    }

    fn next_id(&mut self, message: &str) -> (Oid, DateTime<Utc>) {
        self.counter += 1;
        let mut hasher = DefaultHasher::new();
        self.counter.hash(&mut hasher);
        message.hash(&mut hasher);
        let mut bytes = [0u8; 20];
        bytes[..8].copy_from_slice(&hasher.finish().to_be_bytes());
        bytes[8..16].copy_from_slice(&self.counter.to_be_bytes());
        let id = Oid::from_bytes(&bytes).unwrap_or_else(|_| Oid::zero());
        let timestamp = Utc
            .timestamp_opt(EPOCH + 60 * self.counter as i64, 0)
            .single()
            .unwrap_or_default();
        (id, timestamp)
    }

    /// Commit id HEAD points at, if any
    pub fn head(&self) -> Option<Oid> {
        match &self.head {
            Head::Branch(name) => self.branch_heads.get(name).copied(),
            Head::Detached(id) => Some(*id),
        }
    }

    /// Add a commit with explicit parents without moving any branch
    pub fn add_commit(&mut self, parents: &[Oid], message: impl Into<String>) -> Oid {
        let message = message.into();
        let (id, timestamp) = self.next_id(&message);
        self.commits.insert(
            id,
            Commit {
                id,
                parents: parents.to_vec(),
                timestamp,
                message,
            },
        );
        id
    }

    fn advance_head(&mut self, id: Oid) {
        match &self.head {
            Head::Branch(name) => {
                self.branch_heads.insert(name.clone(), id);
            }
            Head::Detached(_) => self.head = Head::Detached(id),
        }
    }

    /// Commit on top of HEAD and advance the checked-out branch
    pub fn commit(&mut self, message: impl Into<String>) -> Oid {
        let parents: Vec<Oid> = self.head().into_iter().collect();
        let id = self.add_commit(&parents, message);
        self.advance_head(id);
        id
    }

    /// Make `count` commits on top of HEAD, returning the last one
    pub fn commits(&mut self, count: usize) -> Option<Oid> {
        (0..count).map(|i| self.commit(format!("commit {}", i + 1))).last()
    }

    /// Merge a branch into HEAD with git's default merge message
    pub fn merge(&mut self, branch: &str) -> Oid {
        let message = match &self.head {
            Head::Branch(target) if target != "main" && target != "master" => {
                format!("Merge branch '{}' into {}", branch, target)
            }
            _ => format!("Merge branch '{}'", branch),
        };
        self.merge_with_message(branch, message)
    }

    /// Merge a branch into HEAD with a custom message
    ///
    /// A branch that does not exist leaves HEAD untouched and returns its id.
    pub fn merge_with_message(&mut self, branch: &str, message: impl Into<String>) -> Oid {
        let Some(theirs) = self.branch_tip(branch) else {
            return self.head().unwrap_or_else(Oid::zero);
        };
        let parents: Vec<Oid> = self.head().into_iter().chain([theirs]).collect();
        let id = self.add_commit(&parents, message);
        self.advance_head(id);
        id
    }

    /// Create a branch at HEAD (or move it there)
    pub fn branch(&mut self, name: impl Into<String>) {
        if let Some(head) = self.head() {
            self.branch_heads.insert(name.into(), head);
        }
    }

    /// Create or move a branch to an arbitrary commit
    pub fn set_branch_head(&mut self, name: impl Into<String>, id: Oid) {
        self.branch_heads.insert(name.into(), id);
    }

    /// Create or move a remote-tracking branch such as `origin/main`
    pub fn set_remote_branch(&mut self, name: impl Into<String>, id: Oid) {
        self.remote_branches.insert(name.into(), id);
    }

    pub fn delete_branch(&mut self, name: &str) {
        self.branch_heads.shift_remove(name);
    }

    /// Check out an existing branch, or create it at HEAD first
    pub fn checkout(&mut self, name: &str) {
        if !self.branch_heads.contains_key(name) {
            self.branch(name);
        }
        self.head = Head::Branch(name.to_string());
    }

    /// Detach HEAD at a commit
    pub fn detach(&mut self, id: Oid) {
        self.head = Head::Detached(id);
    }

    pub fn branch_tip(&self, name: &str) -> Option<Oid> {
        self.branch_heads.get(name).copied()
    }

    /// Lightweight tag on a commit (the commit need not exist)
    pub fn tag(&mut self, name: impl Into<String>, id: Oid) {
        self.tags.push(Tag::new(name, id));
    }

    /// Tag HEAD
    pub fn tag_head(&mut self, name: impl Into<String>) {
        if let Some(head) = self.head() {
            self.tag(name, head);
        }
    }

    pub fn remove_tag(&mut self, name: &str) {
        self.tags.retain(|tag| tag.name != name);
    }

    /// Merge `source` into `target` on a pull-request ref and check it out
    ///
    /// Mirrors what hosting providers do: the merge commit lives only on
    /// `pull/<number>/merge`, never on `target`.
    pub fn create_pull_request_ref(&mut self, source: &str, target: &str, number: u64) -> Oid {
        let parents: Vec<Oid> = [self.branch_tip(target), self.branch_tip(source)]
            .into_iter()
            .flatten()
            .collect();
        let id = self.add_commit(&parents, format!("Merge {} into {}", source, target));
        let name = format!("pull/{}/merge", number);
        self.branch_heads.insert(name.clone(), id);
        self.head = Head::Branch(name);
        id
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MockRepository {
    fn commit(&self, id: Oid) -> Result<Commit> {
        self.commits
            .get(&id)
            .cloned()
            .ok_or_else(|| GitverError::graph(format!("Commit not found: {}", id)))
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        Ok(self.tags.clone())
    }

    fn branches(&self) -> Result<Vec<Branch>> {
        let current = match &self.head {
            Head::Branch(name) => Some(name.as_str()),
            Head::Detached(_) => None,
        };
        let local = self.branch_heads.iter().map(|(name, tip)| {
            let branch = Branch::new(name.clone(), *tip);
            if Some(name.as_str()) == current {
                branch.current()
            } else {
                branch
            }
        });
        let remote = self
            .remote_branches
            .iter()
            .map(|(name, tip)| Branch::new(name.clone(), *tip).remote());
        Ok(local.chain(remote).collect())
    }

    fn current_branch(&self) -> Result<Branch> {
        match &self.head {
            Head::Branch(name) => self
                .branch_heads
                .get(name)
                .map(|tip| Branch::new(name.clone(), *tip).current())
                .ok_or_else(|| GitverError::graph(format!("Branch '{}' has no commits", name))),
            Head::Detached(id) => Ok(Branch::new("HEAD", *id).current()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_repository_basic() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("initial");

        assert_eq!(repo.branch_tip("main"), Some(a));
        assert_eq!(repo.current_branch().unwrap().name, "main");
        assert!(repo.commit(a).unwrap().is_root());
    }

    #[test]
    fn test_commit_ids_are_unique_and_ordered_in_time() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("same");
        let b = (&mut repo).commit("same");
        assert_ne!(a, b);
        assert!(repo.commit(a).unwrap().timestamp < repo.commit(b).unwrap().timestamp);
        assert_eq!(repo.commit(b).unwrap().parents, vec![a]);
    }

    #[test]
    fn test_mock_repository_tags() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("initial");
        repo.tag("v1.0.0", a);

        assert_eq!(repo.tags_on(a).unwrap().len(), 1);
        repo.remove_tag("v1.0.0");
        assert!(repo.tags().unwrap().is_empty());
    }

    #[test]
    fn test_merge_records_both_parents() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.checkout("feature/x");
        let b = (&mut repo).commit("B");
        repo.checkout("main");
        let m = repo.merge("feature/x");

        let merge = repo.commit(m).unwrap();
        assert_eq!(merge.parents, vec![a, b]);
        assert_eq!(merge.message, "Merge branch 'feature/x'");
    }

    #[test]
    fn test_merge_into_non_main_mentions_target() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("A");
        repo.checkout("develop");
        repo.checkout("feature/x");
        (&mut repo).commit("B");
        repo.checkout("develop");
        let m = repo.merge("feature/x");
        assert_eq!(
            repo.commit(m).unwrap().message,
            "Merge branch 'feature/x' into develop"
        );
    }

    #[test]
    fn test_pull_request_ref() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.checkout("feature/foo");
        let b = (&mut repo).commit("B");
        let m = repo.create_pull_request_ref("feature/foo", "main", 2);

        let current = repo.current_branch().unwrap();
        assert_eq!(current.name, "pull/2/merge");
        assert_eq!(current.tip, m);
        assert_eq!(repo.commit(m).unwrap().parents, vec![a, b]);
        assert_eq!(repo.branch_tip("main"), Some(a));
    }

    #[test]
    fn test_detached_head() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        (&mut repo).commit("B");
        repo.detach(a);
        let current = repo.current_branch().unwrap();
        assert_eq!(current.name, "HEAD");
        assert_eq!(current.tip, a);
    }

    #[test]
    fn test_missing_commit_is_graph_inconsistency() {
        let repo = MockRepository::new();
        let err = repo.commit(Oid::from_bytes(&[9; 20]).unwrap()).unwrap_err();
        assert!(matches!(err, GitverError::GraphInconsistency(_)));
    }

    #[test]
    fn test_unborn_branch_has_no_current_branch() {
        let repo = MockRepository::default();
        assert!(repo.current_branch().is_err());
    }

    #[test]
    fn test_remote_branches_listed() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.set_remote_branch("origin/release/1.0.0", a);
        let branches = repo.branches().unwrap();
        let remote = branches.iter().find(|b| b.is_remote).unwrap();
        assert_eq!(remote.friendly_name(), "release/1.0.0");
    }
}
