//! From the winning base version to the final version
//!
//! The winner is incremented (or its pre-release continued), a pre-release
//! label and number are attached according to the deployment mode, and build
//! metadata describing the distance to the version source is filled in.

use tracing::debug;

use crate::config::DeploymentMode;
use crate::domain::{BuildMetadata, PreRelease, SemanticVersion};
use crate::error::Result;
use crate::git::Repository;
use crate::strategies::{label_matches, BaseVersionCandidate, StrategyKind, VersionContext};
use crate::walker::{first_parent_distance, total_distance};

/// Final version of the target, built on `winner`
pub fn next_version<R: Repository>(
    ctx: &VersionContext<'_, R>,
    winner: &BaseVersionCandidate,
) -> Result<SemanticVersion> {
    let metadata = build_metadata(ctx, winner)?;

    if winner.strategy == StrategyKind::TaggedCommit
        && winner.source == Some(ctx.target.id)
        && !winner.should_increment
    {
        debug!(version = %winner.version, "target carries its version tag");
        return Ok(winner.version.clone().with_build_metadata(metadata));
    }

    let base = if winner.should_increment {
        incremented(ctx, winner)?
    } else {
        winner.version.release()
    };

    let label = ctx.label();
    let commits = metadata.commits_since_version_source;
    let version = match (ctx.effective.mode, label) {
        (DeploymentMode::ContinuousDeployment, label) => {
            let number = pre_release_number(ctx, winner, &base, label.unwrap_or(""), commits)?;
            let mut version = base;
            version.patch = version.patch.saturating_add(number.saturating_sub(1));
            version
        }
        (_, Some(label)) => {
            let number = pre_release_number(ctx, winner, &base, label, commits)?;
            base.with_pre_release(Some(PreRelease::new(label, Some(number))))
        }
        (_, None) => base,
    };

    Ok(version.with_build_metadata(metadata))
}

/// Release triple after applying the winner's increment
///
/// A pre-release carrying the branch's own label is continued rather than
/// bumped, and a pre-release reaching a branch without label is promoted.
fn incremented<R: Repository>(
    ctx: &VersionContext<'_, R>,
    winner: &BaseVersionCandidate,
) -> Result<SemanticVersion> {
    let label = ctx.label();
    if winner.version.is_pre_release() && (label.is_none() || label_matches(&winner.version, label)) {
        return Ok(winner.version.release());
    }

    let requested = ctx.analyzer.analyze_repository_range(
        ctx.repo,
        winner.source,
        ctx.target.id,
        ctx.effective.commit_message_incrementing,
    )?;
    let increment = ctx.effective.increment.raised_by(requested);
    debug!(%increment, from = %winner.version, "incrementing base version");
    Ok(winner.version.increment(increment))
}

/// Pre-release number for `version` under `label`
fn pre_release_number<R: Repository>(
    ctx: &VersionContext<'_, R>,
    winner: &BaseVersionCandidate,
    version: &SemanticVersion,
    label: &str,
    commits_since_source: u64,
) -> Result<u64> {
    if ctx.effective.is_pull_request {
        return total_distance(ctx.repo, winner.source, ctx.target.id);
    }

    let latest = ctx
        .version_tags
        .iter()
        .filter(|(tag, tagged)| ctx.reaches(tag.target) && tagged.same_triple(version))
        .filter_map(|(tag, tagged)| {
            let pre = tagged.pre_release.as_ref()?;
            pre.has_label(label)
                .then(|| (tag.target, pre.number.unwrap_or(0)))
        })
        .max_by_key(|(_, number)| *number);

    match (ctx.effective.mode, latest) {
        (DeploymentMode::ManualDeployment, latest) => {
            Ok(latest.map_or(1, |(_, number)| number.saturating_add(1)))
        }
        (_, Some((tagged, number))) => {
            Ok(number.saturating_add(first_parent_distance(ctx.repo, Some(tagged), ctx.target.id)?))
        }
        // Counting starts at 1 on a branch with no commits of its own yet
        (_, None) => Ok(commits_since_source.max(1)),
    }
}

fn build_metadata<R: Repository>(
    ctx: &VersionContext<'_, R>,
    winner: &BaseVersionCandidate,
) -> Result<BuildMetadata> {
    Ok(BuildMetadata {
        commits_since_tag: commits_since_tag(ctx)?,
        commits_since_version_source: first_parent_distance(ctx.repo, winner.source, ctx.target.id)?,
        sha: ctx.target.sha(),
        short_sha: ctx.target.short_sha(),
        branch_name: ctx.branch.friendly_name().to_string(),
        version_source_sha: winner.source.map(|id| id.to_string()),
        commit_date: Some(ctx.target.timestamp),
    })
}

/// First-parent commits from the target back to the nearest version tag
fn commits_since_tag<R: Repository>(ctx: &VersionContext<'_, R>) -> Result<u64> {
    let mut count = 0;
    for commit in ctx.repo.commits_between(None, ctx.target.id, true) {
        let commit = commit?;
        if ctx.version_tags.iter().any(|(tag, _)| tag.target == commit.id) {
            break;
        }
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use crate::calculator::{calculate_version, Target};
    use crate::config::{Configuration, DeploymentMode};
    use crate::git::MockRepository;

    fn calculate(repo: &MockRepository, config: &Configuration) -> String {
        calculate_version(repo, &Target::Current, config)
            .unwrap()
            .version
            .full_sem_ver()
    }

    fn release_branch(commits_after_tag: usize) -> MockRepository {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        repo.checkout("release/1.1.0");
        (&mut repo).commit("stabilise");
        repo.tag_head("v1.1.0-beta.1");
        repo.commits(commits_after_tag);
        repo
    }

    fn with_release_mode(mode: DeploymentMode) -> Configuration {
        let mut config = Configuration::default();
        if let Some(release) = config.branches.get_mut("release") {
            release.mode = Some(mode);
        }
        config
    }

    #[test]
    fn test_manual_deployment_continues_tagged_pre_release() {
        let repo = release_branch(2);
        let config = with_release_mode(DeploymentMode::ManualDeployment);
        assert_eq!(calculate(&repo, &config), "1.1.0-beta.2+2");
    }

    #[test]
    fn test_continuous_delivery_counts_commits_since_tag() {
        let repo = release_branch(2);
        let config = with_release_mode(DeploymentMode::ContinuousDelivery);
        assert_eq!(calculate(&repo, &config), "1.1.0-beta.3+2");
    }

    #[test]
    fn test_continuous_delivery_starts_at_one_on_fresh_branch() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        repo.checkout("feature/foo");
        let mut config = Configuration::default();
        if let Some(feature) = config.branches.get_mut("feature") {
            feature.mode = Some(DeploymentMode::ContinuousDelivery);
        }
        assert_eq!(calculate(&repo, &config), "1.0.1-foo.1+0");

        (&mut repo).commit("work");
        assert_eq!(calculate(&repo, &config), "1.0.1-foo.1+1");
    }

    #[test]
    fn test_patch_at_maximum_does_not_overflow() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.18446744073709551615");
        (&mut repo).commit("fix");
        assert_eq!(
            calculate(&repo, &Configuration::default()),
            "1.0.18446744073709551615-1+1"
        );
    }

    #[test]
    fn test_continuous_deployment_folds_number_into_patch() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        repo.commits(3);
        let mut config = Configuration::default();
        if let Some(main) = config.branches.get_mut("main") {
            main.mode = Some(DeploymentMode::ContinuousDeployment);
        }
        let result = calculate_version(&repo, &Target::Current, &config).unwrap();
        assert_eq!(result.version.to_string(), "1.0.3");
        assert!(result.version.pre_release.is_none());
    }

    #[test]
    fn test_exact_tag_on_target() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        (&mut repo).commit("second");
        repo.tag_head("v1.4.0");
        let result = calculate_version(&repo, &Target::Current, &Configuration::default()).unwrap();
        assert_eq!(result.version.to_string(), "1.4.0");
        assert_eq!(result.version.build_metadata.commits_since_tag, 0);
    }

    #[test]
    fn test_label_less_branch_promotes_pre_release() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v2.0.0-rc.1");
        (&mut repo).commit("fix");
        let mut config = Configuration::default();
        config.defaults.label = None;
        if let Some(main) = config.branches.get_mut("main") {
            main.label = None;
        }
        assert_eq!(calculate(&repo, &config), "2.0.0+1");
    }

    #[test]
    fn test_commit_message_raises_increment() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        (&mut repo).commit("new endpoint +semver: minor");
        assert_eq!(calculate(&repo, &Configuration::default()), "1.1.0-1+1");
    }

    #[test]
    fn test_build_metadata() {
        let mut repo = MockRepository::new();
        let tagged = (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        repo.commits(2);
        let result = calculate_version(&repo, &Target::Current, &Configuration::default()).unwrap();
        let meta = &result.version.build_metadata;
        assert_eq!(meta.commits_since_tag, 2);
        assert_eq!(meta.commits_since_version_source, 2);
        assert_eq!(meta.branch_name, "main");
        assert_eq!(meta.version_source_sha, Some(tagged.to_string()));
        assert_eq!(meta.short_sha.len(), 7);
    }
}
