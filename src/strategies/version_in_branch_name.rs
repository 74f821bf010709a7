use crate::error::Result;
use crate::git::Repository;
use crate::strategies::{BaseVersionCandidate, StrategyKind, VersionContext, VersionStrategy};

/// The version a release branch carries in its name, e.g. `release/2.1.0`
pub struct VersionInBranchName;

impl VersionStrategy for VersionInBranchName {
    fn kind(&self) -> StrategyKind {
        StrategyKind::VersionInBranchName
    }

    fn candidates<R: Repository>(
        &self,
        ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>> {
        if !ctx.effective.is_release_branch {
            return Ok(Vec::new());
        }
        let name = ctx.branch.friendly_name();
        let Some(version) = ctx.matcher.version_in_branch_name(name) else {
            return Ok(Vec::new());
        };
        let source = ctx.fork_point()?;
        Ok(vec![BaseVersionCandidate::new(
            self.kind(),
            version,
            source,
            false,
            format!("Version in branch name '{}'", name),
        )])
    }
}
