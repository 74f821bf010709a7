use tracing::trace;

use crate::error::Result;
use crate::git::Repository;
use crate::strategies::{BaseVersionCandidate, StrategyKind, VersionContext, VersionStrategy};

/// Versions of release branches named in merge commit messages
///
/// Only runs for branch types that track merge messages. Each first-parent
/// merge of a release branch whose name carries a version yields that version,
/// anchored at the merge commit.
pub struct MergeMessage;

impl VersionStrategy for MergeMessage {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MergeMessage
    }

    fn candidates<R: Repository>(
        &self,
        ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>> {
        if !ctx.effective.track_merge_message {
            return Ok(Vec::new());
        }
        let should_increment = !ctx.effective.prevent_increment_of_merged_branch;
        let mut candidates = Vec::new();

        for commit in ctx.repo.commits_between(None, ctx.target.id, true) {
            let commit = commit?;
            if !commit.is_merge() {
                continue;
            }
            let Some(message) = ctx.merge_messages.parse(&commit.message) else {
                continue;
            };
            let Some(matched) = ctx.matcher.try_match(&message.merged_branch) else {
                continue;
            };
            if !matched.config.is_release_branch.unwrap_or(false) {
                continue;
            }
            let Some(version) = ctx.matcher.version_in_branch_name(&message.merged_branch) else {
                continue;
            };
            trace!(commit = %commit.id, version = %version, "release merge found in message");
            candidates.push(BaseVersionCandidate::new(
                self.kind(),
                version,
                Some(commit.id),
                should_increment,
                format!("Merge message '{}'", commit.summary()),
            ));
        }

        Ok(candidates)
    }
}
