use git2::Oid;
use tracing::{debug, instrument, trace};

use crate::config::{CommitMessageIncrementMode, MatchedBranchType};
use crate::domain::{Branch, IncrementStrategy, SemanticVersion};
use crate::error::Result;
use crate::git::Repository;
use crate::strategies::{BaseVersionCandidate, StrategyKind, VersionContext, VersionStrategy};
use crate::walker::{first_parent_distance, CommitClass, MergeAttribution};

/// Counts versions along the main branch instead of reading them from tags
///
/// Starting at the most recent release tag on the main line (or the root), every
/// direct commit and untracked merge bumps by the main branch's increment, and
/// every tracked merge by the merged branch type's. A merged release branch
/// whose name carries a higher version sets that version. Targets off the main
/// line take the version at their fork point and apply their own increment once.
pub struct Mainline;

/// The first-parent chain a mainline calculation walks
struct MainLine<'a> {
    branch: &'a Branch,
    end: Oid,
    increment: IncrementStrategy,
    track_merge_message: bool,
    message_mode: CommitMessageIncrementMode,
    /// Where the target left the main line; `None` when the target is on it
    fork: Option<Oid>,
}

impl Mainline {
    /// Live main-type branch whose history meets the target closest to it
    fn nearest_main<'a, R: Repository>(
        ctx: &VersionContext<'a, R>,
    ) -> Result<Option<(&'a Branch, MatchedBranchType, Oid)>> {
        let mut best: Option<(u64, &'a Branch, MatchedBranchType, Oid)> = None;
        for branch in ctx.other_branches() {
            let Some(matched) = ctx.matcher.try_match(branch.friendly_name()) else {
                continue;
            };
            if !matched.config.is_main_branch.unwrap_or(false) {
                continue;
            }
            let Some(fork) = ctx.repo.merge_base(ctx.target.id, branch.tip)? else {
                continue;
            };
            let distance = first_parent_distance(ctx.repo, Some(fork), ctx.target.id)?;
            if best.as_ref().map_or(true, |(closest, ..)| distance < *closest) {
                best = Some((distance, branch, matched, fork));
            }
        }
        Ok(best.map(|(_, branch, matched, fork)| (branch, matched, fork)))
    }

    fn main_line<'a, R: Repository>(ctx: &VersionContext<'a, R>) -> Result<MainLine<'a>> {
        let own = |ctx: &VersionContext<'a, R>| MainLine {
            branch: ctx.branch,
            end: ctx.target.id,
            increment: ctx.effective.increment,
            track_merge_message: ctx.effective.track_merge_message,
            message_mode: ctx.effective.commit_message_incrementing,
            fork: None,
        };

        if ctx.effective.is_main_branch {
            return Ok(own(ctx));
        }
        match Self::nearest_main(ctx)? {
            Some((branch, matched, fork)) => {
                let effective = ctx.resolver().resolve(branch, &matched)?;
                Ok(MainLine {
                    branch,
                    end: fork,
                    increment: effective.increment,
                    track_merge_message: effective.track_merge_message,
                    message_mode: effective.commit_message_incrementing,
                    fork: Some(fork),
                })
            }
            None => {
                debug!(
                    branch = ctx.branch.friendly_name(),
                    "no main branch shares history with the target, walking its own history"
                );
                Ok(own(ctx))
            }
        }
    }

    /// Most recent release tag on the first-parent history of `end`
    fn base_version<R: Repository>(
        ctx: &VersionContext<'_, R>,
        end: Oid,
    ) -> Result<Option<(Oid, SemanticVersion)>> {
        for commit in ctx.repo.commits_between(None, end, true) {
            let commit = commit?;
            let release = ctx
                .tags_on(commit.id)
                .into_iter()
                .find(|(_, version)| !version.is_pre_release());
            if let Some((_, version)) = release {
                return Ok(Some((commit.id, version.release())));
            }
        }
        Ok(None)
    }

    /// Version a merged release branch announces in its name, if it is one
    fn released_version<R: Repository>(
        ctx: &VersionContext<'_, R>,
        attribution: &MergeAttribution,
    ) -> Option<SemanticVersion> {
        let merged_type = ctx.matcher.type_config(&attribution.branch_type)?;
        if !merged_type.is_release_branch.unwrap_or(false) {
            return None;
        }
        ctx.matcher
            .version_in_branch_name(&attribution.branch_name)
            .map(|version| version.release())
    }
}

impl VersionStrategy for Mainline {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Mainline
    }

    #[instrument(skip_all, fields(branch = ctx.branch.friendly_name()))]
    fn candidates<R: Repository>(
        &self,
        ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>> {
        let line = Self::main_line(ctx)?;
        let (mut version, base) = match Self::base_version(ctx, line.end)? {
            Some((tagged, version)) => (version, Some(tagged)),
            None => (SemanticVersion::new(0, 0, 0), None),
        };
        let mut source = base;

        let walker = ctx
            .walker(line.branch)
            .track_merge_message(line.track_merge_message);
        for step in walker.walk(base, line.end)? {
            let requested = ctx.message_increment(&step.commit, line.message_mode);
            let increment = match &step.class {
                CommitClass::TrackedMerge(attribution) => {
                    if let Some(released) = Self::released_version(ctx, attribution)
                        .filter(|released| *released > version)
                    {
                        trace!(commit = %step.commit.id, version = %released, "release branch merged");
                        version = released;
                        source = step.commit.first_parent();
                        continue;
                    }
                    ctx.matcher
                        .type_config(&attribution.branch_type)
                        .and_then(|merged| merged.increment)
                        .filter(|increment| increment.is_concrete())
                        .unwrap_or(line.increment)
                        .raised_by(requested)
                }
                CommitClass::Plain | CommitClass::UntrackedMerge => line.increment.raised_by(requested),
            };
            if increment != IncrementStrategy::None {
                version = version.increment(increment);
                source = step.commit.first_parent();
            }
        }

        if let Some(fork) = line.fork {
            let requested = ctx.analyzer.analyze_repository_range(
                ctx.repo,
                Some(fork),
                ctx.target.id,
                ctx.effective.commit_message_incrementing,
            )?;
            version = version.increment(ctx.effective.increment.raised_by(requested));
            source = Some(fork);
        }

        let description = format!("Mainline version along '{}'", line.branch.friendly_name());
        Ok(vec![BaseVersionCandidate::new(
            self.kind(),
            version,
            source,
            false,
            description,
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::git::MockRepository;
    use crate::strategies::candidates_for;

    fn main_increment(increment: IncrementStrategy) -> Configuration {
        let mut config = Configuration::default();
        if let Some(main) = config.branches.get_mut("main") {
            main.increment = Some(increment);
        }
        config
    }

    fn mainline(repo: &MockRepository, config: &Configuration) -> BaseVersionCandidate {
        let mut candidates = candidates_for(repo, config, StrategyKind::Mainline);
        assert_eq!(candidates.len(), 1);
        candidates.remove(0)
    }

    #[test]
    fn test_every_main_commit_increments() {
        let mut repo = MockRepository::new();
        let root = (&mut repo).commit("initial");
        let config = main_increment(IncrementStrategy::Major);

        let first = mainline(&repo, &config);
        assert_eq!(first.version, SemanticVersion::new(1, 0, 0));
        assert_eq!(first.source, None);

        (&mut repo).commit("second");
        let second = mainline(&repo, &config);
        assert_eq!(second.version, SemanticVersion::new(2, 0, 0));
        assert_eq!(second.source, Some(root));
    }

    #[test]
    fn test_counts_from_last_release_tag() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        (&mut repo).commit("fix");
        let last_parent = (&mut repo).commit("feature +semver: minor");
        (&mut repo).commit("fix");

        let candidate = mainline(&repo, &Configuration::default());
        // 1.0.1, then the minor bump, then a patch
        assert_eq!(candidate.version, SemanticVersion::new(1, 1, 1));
        assert_eq!(candidate.source, Some(last_parent));
    }

    #[test]
    fn test_merged_release_branch_sets_version() {
        let mut repo = MockRepository::new();
        let root = (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        repo.checkout("release/2.0.0");
        (&mut repo).commit("stabilise");
        repo.checkout("main");
        let merge = repo.merge("release/2.0.0");

        let candidate = mainline(&repo, &Configuration::default());
        assert_eq!(candidate.version, SemanticVersion::new(2, 0, 0));
        assert_eq!(candidate.source, Some(root));

        (&mut repo).commit("fix");
        let candidate = mainline(&repo, &Configuration::default());
        assert_eq!(candidate.version, SemanticVersion::new(2, 0, 1));
        assert_eq!(candidate.source, Some(merge));
    }

    #[test]
    fn test_topic_branch_applies_its_increment_at_fork() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        let fork = (&mut repo).commit("fix");
        repo.checkout("feature/foo");
        (&mut repo).commit("work");
        (&mut repo).commit("more work");
        let mut config = Configuration::default();
        if let Some(feature) = config.branches.get_mut("feature") {
            feature.increment = Some(IncrementStrategy::Minor);
        }

        let candidate = mainline(&repo, &config);
        assert_eq!(candidate.version, SemanticVersion::new(1, 1, 0));
        assert_eq!(candidate.source, Some(fork));
    }

    #[test]
    fn test_without_main_branch_walks_own_history() {
        let mut repo = MockRepository::with_initial_branch("trunk");
        let root = (&mut repo).commit("initial");
        (&mut repo).commit("second");

        let candidate = mainline(&repo, &Configuration::default());
        assert_eq!(candidate.version, SemanticVersion::new(0, 0, 2));
        assert_eq!(candidate.source, Some(root));
    }
}
