use crate::error::Result;
use crate::git::Repository;
use crate::strategies::{BaseVersionCandidate, StrategyKind, VersionContext, VersionStrategy};

/// Develop-style branches stay ahead of every open release branch
///
/// For branch types with `tracks_release_branches`, each live release branch
/// with a version in its name proposes that version. Release tags on main
/// branches that the target has not seen yet (hotfixes) propose theirs. All of
/// them increment and are anchored where their history meets the target.
pub struct TrackReleaseBranches;

impl VersionStrategy for TrackReleaseBranches {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TrackReleaseBranches
    }

    fn candidates<R: Repository>(
        &self,
        ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>> {
        if !ctx.effective.tracks_release_branches {
            return Ok(Vec::new());
        }
        let mut candidates = Vec::new();
        let mut main_tips = Vec::new();

        for branch in ctx.other_branches() {
            let Some(matched) = ctx.matcher.try_match(branch.friendly_name()) else {
                continue;
            };
            if matched.config.is_main_branch.unwrap_or(false) {
                main_tips.push(branch.tip);
            }
            if !matched.config.is_release_branch.unwrap_or(false) {
                continue;
            }
            let Some(version) = ctx.matcher.version_in_branch_name(branch.friendly_name()) else {
                continue;
            };
            let source = ctx.repo.merge_base(branch.tip, ctx.target.id)?;
            candidates.push(BaseVersionCandidate::new(
                self.kind(),
                version,
                source,
                true,
                format!("Release branch '{}'", branch.friendly_name()),
            ));
        }

        for (tag, version) in ctx.version_tags {
            if version.is_pre_release() || ctx.reaches(tag.target) {
                continue;
            }
            let mut on_main = false;
            for tip in &main_tips {
                if ctx.repo.is_ancestor(tag.target, *tip)? {
                    on_main = true;
                    break;
                }
            }
            if !on_main {
                continue;
            }
            let source = ctx.repo.merge_base(tag.target, ctx.target.id)?;
            candidates.push(BaseVersionCandidate::new(
                self.kind(),
                version.clone(),
                source,
                true,
                format!("Git tag '{}' on main branch", tag.name),
            ));
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BranchConfiguration, Configuration};
    use crate::domain::{IncrementStrategy, SemanticVersion};
    use crate::git::MockRepository;
    use crate::strategies::candidates_for;

    fn with_develop() -> Configuration {
        let mut config = Configuration::default();
        config.branches.insert(
            "develop".to_string(),
            BranchConfiguration {
                regex: Some("^dev(elop)?(ment)?$".to_string()),
                increment: Some(IncrementStrategy::Minor),
                label: Some("alpha".to_string()),
                tracks_release_branches: Some(true),
                source_branches: Some(vec!["main".to_string()]),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn test_develop_tracks_release_branches_and_hotfix_tags() {
        let mut repo = MockRepository::new();
        let root = (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        repo.checkout("develop");
        let dev_work = (&mut repo).commit("feature work");
        repo.checkout("release/1.1.0");
        (&mut repo).commit("stabilise");
        repo.checkout("main");
        (&mut repo).commit("hotfix");
        repo.tag_head("v1.0.1");
        repo.checkout("develop");

        let candidates =
            candidates_for(&repo, &with_develop(), StrategyKind::TrackReleaseBranches);
        let found: Vec<_> = candidates
            .iter()
            .map(|c| (c.version.clone(), c.source, c.should_increment))
            .collect();
        assert_eq!(
            found,
            vec![
                (SemanticVersion::new(1, 1, 0), Some(dev_work), true),
                (SemanticVersion::new(1, 0, 1), Some(root), true),
            ]
        );
    }

    #[test]
    fn test_only_for_tracking_branch_types() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.checkout("release/1.1.0");
        (&mut repo).commit("stabilise");
        repo.checkout("main");

        let candidates =
            candidates_for(&repo, &with_develop(), StrategyKind::TrackReleaseBranches);
        assert!(candidates.is_empty());
    }
}
