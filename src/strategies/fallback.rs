use crate::domain::SemanticVersion;
use crate::error::Result;
use crate::git::Repository;
use crate::strategies::{BaseVersionCandidate, StrategyKind, VersionContext, VersionStrategy};

/// `0.0.0` counted from the root, so there is always a candidate
pub struct Fallback;

impl Fallback {
    pub fn candidate() -> BaseVersionCandidate {
        BaseVersionCandidate::new(
            StrategyKind::Fallback,
            SemanticVersion::new(0, 0, 0),
            None,
            false,
            "Fallback base version",
        )
    }
}

impl VersionStrategy for Fallback {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Fallback
    }

    fn candidates<R: Repository>(
        &self,
        _ctx: &VersionContext<'_, R>,
    ) -> Result<Vec<BaseVersionCandidate>> {
        Ok(vec![Fallback::candidate()])
    }
}
