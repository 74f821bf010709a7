use crate::domain::SemanticVersion;
use crate::error::Result;
use crate::git::Repository;
use crate::strategies::{
    is_eligible_tag, BaseVersionCandidate, StrategyKind, VersionContext, VersionStrategy,
};

/// One increment per commit since the last version tag on the target's history
pub struct TrunkBased;

impl VersionStrategy for TrunkBased {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TrunkBased
    }

    fn candidates<R: Repository>(
        &self,
        ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>> {
        let label = ctx.label();
        let mut version = SemanticVersion::new(0, 0, 0);
        let mut source = None;
        let mut since_tag = Vec::new();

        for commit in ctx.repo.commits_between(None, ctx.target.id, true) {
            let commit = commit?;
            let tagged = ctx
                .tags_on(commit.id)
                .into_iter()
                .find(|(_, version)| is_eligible_tag(version, label));
            if let Some((_, tagged)) = tagged {
                version = tagged.release();
                source = Some(commit.id);
                break;
            }
            since_tag.push(commit);
        }

        for commit in since_tag.iter().rev() {
            let requested = ctx.message_increment(commit, ctx.effective.commit_message_incrementing);
            version = version.increment(ctx.effective.increment.raised_by(requested));
        }

        Ok(vec![BaseVersionCandidate::new(
            self.kind(),
            version,
            source,
            false,
            format!("Trunk-based version after {} commit(s)", since_tag.len()),
        )])
    }
}
