use git2::Oid;

use crate::error::Result;
use crate::git::Repository;
use crate::strategies::{
    is_eligible_tag, label_matches, BaseVersionCandidate, StrategyKind, VersionContext,
    VersionStrategy,
};

/// Version tags on the target and its ancestors
///
/// A tag on the target itself is taken as-is when its label is the branch's
/// label or the branch type prevents increments on tagged commits; every other
/// tag is a floor to increment from. With `track_merge_target`, tags on merge
/// commits that brought the target's history into another branch count too,
/// anchored at the merged-in parent.
pub struct TaggedCommit;

impl TaggedCommit {
    /// The parent of a merge commit through which the target's history was merged
    fn merged_parent<R: Repository>(ctx: &VersionContext<'_, R>, merge: Oid) -> Result<Option<Oid>> {
        let commit = ctx.repo.commit(merge)?;
        Ok(commit
            .parents
            .iter()
            .skip(1)
            .copied()
            .find(|parent| ctx.reaches(*parent)))
    }
}

impl VersionStrategy for TaggedCommit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TaggedCommit
    }

    fn candidates<R: Repository>(
        &self,
        ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>> {
        let label = ctx.label();
        let prevent = ctx.effective.prevent_increment_when_current_commit_tagged;
        let mut candidates = Vec::new();

        for (tag, version) in ctx.version_tags {
            if !is_eligible_tag(version, label) {
                continue;
            }

            if ctx.reaches(tag.target) {
                let on_target = tag.target == ctx.target.id;
                let should_increment = !on_target || !(label_matches(version, label) || prevent);
                candidates.push(BaseVersionCandidate::new(
                    self.kind(),
                    version.clone(),
                    Some(tag.target),
                    should_increment,
                    format!("Git tag '{}'", tag.name),
                ));
            } else if ctx.effective.track_merge_target {
                if let Some(parent) = Self::merged_parent(ctx, tag.target)? {
                    candidates.push(BaseVersionCandidate::new(
                        self.kind(),
                        version.clone(),
                        Some(parent),
                        true,
                        format!("Git tag '{}' on merge target", tag.name),
                    ));
                }
            }
        }

        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::domain::SemanticVersion;
    use crate::git::MockRepository;
    use crate::strategies::candidates_for;

    fn tagged(repo: &MockRepository, config: &Configuration) -> Vec<BaseVersionCandidate> {
        candidates_for(repo, config, StrategyKind::TaggedCommit)
    }

    #[test]
    fn test_tag_on_ancestor_increments() {
        let mut repo = MockRepository::new();
        let tagged_commit = (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        (&mut repo).commit("next");

        let candidates = tagged(&repo, &Configuration::default());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].version, SemanticVersion::new(1, 0, 0));
        assert_eq!(candidates[0].source, Some(tagged_commit));
        assert!(candidates[0].should_increment);
    }

    #[test]
    fn test_tag_on_target_is_kept_where_increments_are_prevented() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");

        let candidates = tagged(&repo, &Configuration::default());
        assert!(!candidates[0].should_increment);
    }

    #[test]
    fn test_release_tag_on_feature_branch_target_increments() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v2.0.0");
        repo.checkout("feature/foo");

        let candidates = tagged(&repo, &Configuration::default());
        assert!(candidates[0].should_increment);
    }

    #[test]
    fn test_foreign_pre_release_tags_are_skipped() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        repo.checkout("feature/foo");
        (&mut repo).commit("work");
        repo.tag_head("v1.0.1-bar.1");
        (&mut repo).commit("more work");
        repo.tag_head("v1.0.1-foo.2");

        let versions: Vec<String> = tagged(&repo, &Configuration::default())
            .iter()
            .map(|c| c.version.to_string())
            .collect();
        assert_eq!(versions, vec!["1.0.0", "1.0.1-foo.2"]);
    }

    #[test]
    fn test_merge_target_tags_are_tracked() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.checkout("feature/foo");
        let work = (&mut repo).commit("work");
        repo.checkout("main");
        (&mut repo).commit("unrelated");
        repo.merge("feature/foo");
        repo.tag_head("v1.1.0");
        repo.checkout("feature/foo");

        let mut config = Configuration::default();
        assert!(tagged(&repo, &config).is_empty());

        if let Some(feature) = config.branches.get_mut("feature") {
            feature.track_merge_target = Some(true);
        }
        let candidates = tagged(&repo, &config);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].version, SemanticVersion::new(1, 1, 0));
        assert_eq!(candidates[0].source, Some(work));
    }
}
