//! Merge-aware traversal of a branch's first-parent history
//!
//! [MergeWalker] classifies each commit on a first-parent chain as a plain
//! commit, a merge from a tracked branch type, or a merge it cannot attribute.
//! Attribution first looks for a live branch at (or descending from) the merged
//! parent and, when the walking branch type tracks merge messages, falls back to
//! parsing the merge message. The fallback and any failed attribution are
//! reported as diagnostics.

use git2::Oid;
use regex::Regex;
use tracing::trace;

use crate::config::{BranchMatcher, Configuration};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::{friendly_name, Branch, Commit};
use crate::error::{ConfigurationError, Result};
use crate::git::Repository;

/// Merge message formats understood out of the box, in the order they are tried
const BUILT_IN_FORMATS: &[(&str, &str)] = &[
    (
        "Default",
        r"^Merge (branch|tag) '(?<SourceBranch>[^']*)'(?: into (?<TargetBranch>[^\s]*))*",
    ),
    (
        "SmartGit",
        r"^Finish (?<SourceBranch>[^\s]*)(?: into (?<TargetBranch>[^\s]*))*",
    ),
    (
        "BitBucketPull",
        r"^Merge pull request #(?<PullRequestNumber>\d+) (from|in) (?<Source>.*) from (?<SourceBranch>[^\s]*) to (?<TargetBranch>[^\s]*)",
    ),
    (
        "GitHubPull",
        r"^Merge pull request #(?<PullRequestNumber>\d+) (from|in) (?:[^\s/]+/)?(?<SourceBranch>[^\s]*)(?: into (?<TargetBranch>[^\s]*))*",
    ),
    (
        "RemoteTracking",
        r"^Merge remote-tracking branch '(?<SourceBranch>[^\s]*)'(?: into (?<TargetBranch>[^\s]*))*",
    ),
    (
        "AzureDevOps",
        r"^Merged (PR|pull request) (?<PullRequestNumber>\d+): Merge (?<SourceBranch>[^\s]*) to (?<TargetBranch>[^\s]*)",
    ),
];

/// What a merge message says about a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeMessage {
    pub format: String,
    pub merged_branch: String,
    pub target_branch: Option<String>,
    pub pull_request_number: Option<u64>,
}

/// Compiled merge message formats, configured ones first
#[derive(Debug, Clone)]
pub struct MergeMessageParser {
    formats: Vec<(String, Regex)>,
}

impl MergeMessageParser {
    pub fn new(config: &Configuration) -> Result<Self> {
        let configured = config
            .merge_message_formats
            .iter()
            .map(|(name, pattern)| (name.as_str(), pattern.as_str()));
        let mut formats = Vec::new();
        for (name, pattern) in configured.chain(BUILT_IN_FORMATS.iter().copied()) {
            let regex = Regex::new(pattern).map_err(|source| ConfigurationError::InvalidPattern {
                key: format!("merge_message_formats.{}", name),
                source,
            })?;
            formats.push((name.to_string(), regex));
        }
        Ok(MergeMessageParser { formats })
    }

    /// Parse the first line of a merge commit message
    pub fn parse(&self, message: &str) -> Option<MergeMessage> {
        let summary = message.lines().next().unwrap_or("").trim();
        self.formats.iter().find_map(|(name, regex)| {
            let captures = regex.captures(summary)?;
            let source = captures.name("SourceBranch")?.as_str();
            if source.is_empty() {
                return None;
            }
            let merged_branch = if name == "RemoteTracking" {
                friendly_name(source, true)
            } else {
                friendly_name(source, false)
            };
            Some(MergeMessage {
                format: name.clone(),
                merged_branch: merged_branch.to_string(),
                target_branch: captures
                    .name("TargetBranch")
                    .map(|m| m.as_str().to_string()),
                pull_request_number: captures
                    .name("PullRequestNumber")
                    .and_then(|m| m.as_str().parse().ok()),
            })
        })
    }
}

/// How a merge was tied to a branch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionSource {
    LiveBranch,
    MergeMessage,
}

/// The branch (and its type) a merge brought in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeAttribution {
    pub branch_name: String,
    pub branch_type: String,
    pub merged_commit: Oid,
    pub source: AttributionSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitClass {
    Plain,
    TrackedMerge(MergeAttribution),
    UntrackedMerge,
}

#[derive(Debug, Clone)]
pub struct ClassifiedCommit {
    pub commit: Commit,
    pub class: CommitClass,
}

/// Walks a first-parent chain, attributing merges to branch types
pub struct MergeWalker<'a, R: Repository> {
    repo: &'a R,
    matcher: &'a BranchMatcher,
    messages: &'a MergeMessageParser,
    branches: &'a [Branch],
    walking_branch: &'a Branch,
    track_merge_message: bool,
    diagnostics: &'a Diagnostics,
}

impl<'a, R: Repository> MergeWalker<'a, R> {
    pub fn new(
        repo: &'a R,
        matcher: &'a BranchMatcher,
        messages: &'a MergeMessageParser,
        branches: &'a [Branch],
        walking_branch: &'a Branch,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        MergeWalker {
            repo,
            matcher,
            messages,
            branches,
            walking_branch,
            track_merge_message: false,
            diagnostics,
        }
    }

    /// Allow attribution from merge messages when no live branch explains a merge
    pub fn track_merge_message(mut self, enabled: bool) -> Self {
        self.track_merge_message = enabled;
        self
    }

    /// First-parent commits after `from_exclusive` up to `to_inclusive`, oldest first
    pub fn walk(&self, from_exclusive: Option<Oid>, to_inclusive: Oid) -> Result<Vec<ClassifiedCommit>> {
        let mut commits = self
            .repo
            .commits_between(from_exclusive, to_inclusive, true)
            .collect::<Result<Vec<_>>>()?;
        commits.reverse();
        commits
            .into_iter()
            .map(|commit| {
                let class = self.classify(&commit)?;
                Ok(ClassifiedCommit { commit, class })
            })
            .collect()
    }

    pub fn classify(&self, commit: &Commit) -> Result<CommitClass> {
        let (Some(first), Some(merged)) = (commit.first_parent(), commit.second_parent()) else {
            return Ok(CommitClass::Plain);
        };

        if let Some(attribution) = self.attribute_to_live_branch(first, merged)? {
            trace!(commit = %commit.id, branch = %attribution.branch_name, "merge from live branch");
            return Ok(CommitClass::TrackedMerge(attribution));
        }

        if self.track_merge_message {
            let parsed = self.messages.parse(&commit.message);
            if let Some(message) = parsed {
                if let Some(matched) = self.matcher.try_match(&message.merged_branch) {
                    self.diagnostics.push(Diagnostic::AmbiguousMergeAttribution {
                        commit: commit.id,
                        reason: format!(
                            "attributed to '{}' from its {} merge message",
                            message.merged_branch, message.format
                        ),
                    });
                    return Ok(CommitClass::TrackedMerge(MergeAttribution {
                        branch_name: message.merged_branch,
                        branch_type: matched.key().to_string(),
                        merged_commit: merged,
                        source: AttributionSource::MergeMessage,
                    }));
                }
            }
        }

        self.diagnostics.push(Diagnostic::AmbiguousMergeAttribution {
            commit: commit.id,
            reason: "merged branch could not be attributed, treating as untracked".to_string(),
        });
        Ok(CommitClass::UntrackedMerge)
    }

    fn attribute_to_live_branch(&self, first: Oid, merged: Oid) -> Result<Option<MergeAttribution>> {
        let mut descendant = None;
        for branch in self.branches {
            if branch.same_name(self.walking_branch) || branch.friendly_name() == "HEAD" {
                continue;
            }
            let Some(matched) = self.matcher.try_match(branch.friendly_name()) else {
                continue;
            };
            let attribution = || MergeAttribution {
                branch_name: branch.friendly_name().to_string(),
                branch_type: matched.key().to_string(),
                merged_commit: merged,
                source: AttributionSource::LiveBranch,
            };
            if branch.tip == merged {
                return Ok(Some(attribution()));
            }
            if descendant.is_none()
                && self.repo.is_ancestor(merged, branch.tip)?
                && !self.repo.is_ancestor(first, branch.tip)?
            {
                descendant = Some(attribution());
            }
        }
        Ok(descendant)
    }
}

/// First-parent commits of `target` not contained in `source`'s history
///
/// Without a source this is the length of the whole first-parent chain.
pub fn first_parent_distance<R: Repository>(repo: &R, source: Option<Oid>, target: Oid) -> Result<u64> {
    let mut count = 0;
    for commit in repo.commits_between(source, target, true) {
        commit?;
        count += 1;
    }
    Ok(count)
}

/// Every commit reachable from `target` but not from `source`, both sides of merges
pub fn total_distance<R: Repository>(repo: &R, source: Option<Oid>, target: Oid) -> Result<u64> {
    let mut count = 0;
    for commit in repo.commits_between(source, target, false) {
        commit?;
        count += 1;
    }
    Ok(count)
}
