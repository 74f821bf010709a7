//! Base version strategies
//!
//! Each strategy looks at the repository from the point of view of one target
//! commit and proposes zero or more [BaseVersionCandidate]s. The calculator picks
//! one winner and derives the final version from it.
//!
//! Which strategies run is configured with [Configuration::strategies]; the
//! strategy set is a fixed list of [StrategyKind] variants, each backed by a
//! stateless unit struct implementing [VersionStrategy].

pub mod config_next_version;
pub mod fallback;
pub mod mainline;
pub mod merge_message;
pub mod tagged_commit;
pub mod track_release_branches;
pub mod trunk_based;
pub mod version_in_branch_name;

pub use config_next_version::ConfiguredNextVersion;
pub use fallback::Fallback;
pub use mainline::Mainline;
pub use merge_message::MergeMessage;
pub use tagged_commit::TaggedCommit;
pub use track_release_branches::TrackReleaseBranches;
pub use trunk_based::TrunkBased;
pub use version_in_branch_name::VersionInBranchName;

use std::collections::HashSet;
use std::fmt;

use git2::Oid;
use serde::{Deserialize, Serialize};

use crate::analyzer::VersionAnalyzer;
use crate::config::{
    BranchMatcher, CommitMessageIncrementMode, Configuration, EffectiveConfiguration, Resolver,
};
use crate::diagnostics::Diagnostics;
use crate::domain::{Branch, Commit, IncrementStrategy, SemanticVersion, Tag};
use crate::error::Result;
use crate::git::Repository;
use crate::walker::{first_parent_distance, MergeMessageParser, MergeWalker};

/// The strategies gitver knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    Fallback,
    ConfiguredNextVersion,
    MergeMessage,
    TaggedCommit,
    TrackReleaseBranches,
    VersionInBranchName,
    Mainline,
    TrunkBased,
}

impl StrategyKind {
    /// Strategies enabled when the configuration does not say otherwise
    pub fn defaults() -> Vec<StrategyKind> {
        vec![
            StrategyKind::Fallback,
            StrategyKind::ConfiguredNextVersion,
            StrategyKind::MergeMessage,
            StrategyKind::TaggedCommit,
            StrategyKind::TrackReleaseBranches,
            StrategyKind::VersionInBranchName,
        ]
    }

    /// Tie-break rank when candidates carry the same version; higher wins
    pub fn priority(self) -> u8 {
        match self {
            StrategyKind::TaggedCommit => 7,
            StrategyKind::MergeMessage => 6,
            StrategyKind::VersionInBranchName => 5,
            StrategyKind::TrackReleaseBranches => 4,
            StrategyKind::ConfiguredNextVersion => 3,
            StrategyKind::Mainline => 2,
            StrategyKind::TrunkBased => 1,
            StrategyKind::Fallback => 0,
        }
    }

    /// Run the strategy behind this kind
    pub fn candidates<R: Repository>(
        self,
        ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>> {
        match self {
            StrategyKind::Fallback => Fallback.candidates(ctx),
            StrategyKind::ConfiguredNextVersion => ConfiguredNextVersion.candidates(ctx),
            StrategyKind::MergeMessage => MergeMessage.candidates(ctx),
            StrategyKind::TaggedCommit => TaggedCommit.candidates(ctx),
            StrategyKind::TrackReleaseBranches => TrackReleaseBranches.candidates(ctx),
            StrategyKind::VersionInBranchName => VersionInBranchName.candidates(ctx),
            StrategyKind::Mainline => Mainline.candidates(ctx),
            StrategyKind::TrunkBased => TrunkBased.candidates(ctx),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A proposed starting point for the version
#[derive(Debug, Clone, PartialEq)]
pub struct BaseVersionCandidate {
    pub version: SemanticVersion,
    /// Commit the version counts from; `None` counts from the root
    pub source: Option<Oid>,
    pub should_increment: bool,
    pub strategy: StrategyKind,
    pub description: String,
}

impl BaseVersionCandidate {
    pub fn new(
        strategy: StrategyKind,
        version: SemanticVersion,
        source: Option<Oid>,
        should_increment: bool,
        description: impl Into<String>,
    ) -> Self {
        BaseVersionCandidate {
            version,
            source,
            should_increment,
            strategy,
            description: description.into(),
        }
    }
}

/// A source of base version candidates
pub trait VersionStrategy {
    fn kind(&self) -> StrategyKind;

    fn candidates<R: Repository>(
        &self,
        ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>>;
}

/// Everything a strategy may look at for one calculation
pub struct VersionContext<'a, R: Repository> {
    pub repo: &'a R,
    pub configuration: &'a Configuration,
    pub matcher: &'a BranchMatcher,
    pub merge_messages: &'a MergeMessageParser,
    pub analyzer: &'a VersionAnalyzer,
    pub branch: &'a Branch,
    pub target: &'a Commit,
    pub effective: &'a EffectiveConfiguration,
    /// Live branches, local and remote-tracking
    pub branches: &'a [Branch],
    /// Version tags left after the ignore rules
    pub version_tags: &'a [(Tag, SemanticVersion)],
    /// The target and all of its ancestors
    pub ancestry: &'a HashSet<Oid>,
    pub diagnostics: &'a Diagnostics,
}

/// Whether a tag may serve as base version for a branch with this label
///
/// Release tags always qualify; pre-release tags only with the same label. A
/// branch without a label accepts every tag.
pub fn is_eligible_tag(version: &SemanticVersion, label: Option<&str>) -> bool {
    match (label, &version.pre_release) {
        (None, _) | (_, None) => true,
        (Some(label), Some(pre)) => pre.has_label(label),
    }
}

/// Whether a version carries exactly the pre-release label a branch renders
pub fn label_matches(version: &SemanticVersion, label: Option<&str>) -> bool {
    match (&version.pre_release, label) {
        (Some(pre), Some(label)) => pre.has_label(label),
        (None, None) => true,
        _ => false,
    }
}

impl<'a, R: Repository> VersionContext<'a, R> {
    pub fn label(&self) -> Option<&str> {
        self.effective.label.as_deref()
    }

    /// Whether `id` is the target or one of its ancestors
    pub fn reaches(&self, id: Oid) -> bool {
        self.ancestry.contains(&id)
    }

    /// Whether the target commit carries a version tag
    pub fn target_is_tagged(&self) -> bool {
        self.version_tags
            .iter()
            .any(|(tag, _)| tag.target == self.target.id)
    }

    pub fn resolver(&self) -> Resolver<'a, R> {
        Resolver::new(self.repo, self.matcher, self.branches, self.diagnostics)
    }

    pub fn walker(&self, walking_branch: &'a Branch) -> MergeWalker<'a, R> {
        MergeWalker::new(
            self.repo,
            self.matcher,
            self.merge_messages,
            self.branches,
            walking_branch,
            self.diagnostics,
        )
    }

    /// Live branches other than the target branch, locals first, one per name
    pub fn other_branches(&self) -> Vec<&'a Branch> {
        let mut seen = HashSet::new();
        self.branches
            .iter()
            .filter(|b| !b.is_remote)
            .chain(self.branches.iter().filter(|b| b.is_remote))
            .filter(|b| b.friendly_name() != "HEAD" && !b.same_name(self.branch))
            .filter(|b| seen.insert(b.friendly_name().to_string()))
            .collect()
    }

    /// Version tags sitting on a commit, highest first
    pub fn tags_on(&self, id: Oid) -> Vec<&'a (Tag, SemanticVersion)> {
        let mut tags: Vec<_> = self
            .version_tags
            .iter()
            .filter(|(tag, _)| tag.target == id)
            .collect();
        tags.sort_by(|a, b| b.1.cmp(&a.1));
        tags
    }

    /// Increment a single commit's message asks for under the given mode
    pub fn message_increment(
        &self,
        commit: &Commit,
        mode: CommitMessageIncrementMode,
    ) -> Option<IncrementStrategy> {
        match mode {
            CommitMessageIncrementMode::Disabled => None,
            CommitMessageIncrementMode::MergeMessageOnly if !commit.is_merge() => None,
            _ => self.analyzer.analyze_message(&commit.message),
        }
    }

    /// Where the target left the nearest branch of one of its source types
    ///
    /// Returns the merge base closest to the target, or `None` when no live
    /// branch of a source type shares history with it.
    pub fn fork_point(&self) -> Result<Option<Oid>> {
        let mut best: Option<(u64, Oid)> = None;
        for branch in self.other_branches() {
            let Some(matched) = self.matcher.try_match(branch.friendly_name()) else {
                continue;
            };
            if !self
                .effective
                .source_branches
                .iter()
                .any(|source| source == matched.key())
            {
                continue;
            }
            let Some(base) = self.repo.merge_base(self.target.id, branch.tip)? else {
                continue;
            };
            let distance = first_parent_distance(self.repo, Some(base), self.target.id)?;
            if best.map_or(true, |(closest, _)| distance < closest) {
                best = Some((distance, base));
            }
        }
        Ok(best.map(|(_, base)| base))
    }
}

/// Run one strategy against the checked-out branch of a mock repository
#[cfg(test)]
pub(crate) fn candidates_for(
    repo: &crate::git::MockRepository,
    configuration: &Configuration,
    kind: StrategyKind,
) -> Vec<BaseVersionCandidate> {
    let diagnostics = Diagnostics::new();
    crate::calculator::with_context(
        repo,
        &crate::calculator::Target::Current,
        configuration,
        &diagnostics,
        |ctx| kind.candidates(ctx),
    )
    .unwrap()
}
