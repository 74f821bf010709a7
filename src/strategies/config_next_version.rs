use tracing::debug;

use crate::error::Result;
use crate::git::Repository;
use crate::strategies::{BaseVersionCandidate, StrategyKind, VersionContext, VersionStrategy};

/// The configured `next_version`, as a floor for the calculated version
///
/// Has no source commit, so distances count the whole history. Skipped once
/// the target itself carries a version tag.
pub struct ConfiguredNextVersion;

impl VersionStrategy for ConfiguredNextVersion {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ConfiguredNextVersion
    }

    fn candidates<R: Repository>(
        &self,
        ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>> {
        let Some(version) = ctx.configuration.parsed_next_version()? else {
            return Ok(Vec::new());
        };
        if ctx.target_is_tagged() {
            debug!("target is tagged, ignoring configured next version");
            return Ok(Vec::new());
        }
        let description = format!("Next version from configuration ({})", version);
        Ok(vec![BaseVersionCandidate::new(
            self.kind(),
            version,
            None,
            false,
            description,
        )])
    }
}
