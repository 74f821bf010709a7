//! Version calculation for one target
//!
//! [calculate_version] compiles the configuration, resolves the target branch,
//! runs the configured strategies and turns the winning candidate into the final
//! version. Everything is computed from scratch on each call; several
//! calculations may share one repository from different threads.

pub mod next_version;
pub mod variables;

pub use next_version::next_version;
pub use variables::VersionVariables;

use std::cmp::Ordering;
use std::fmt;

use git2::Oid;
use tracing::{debug, info, instrument};

use crate::analyzer::VersionAnalyzer;
use crate::config::{BranchMatcher, Configuration, EffectiveConfiguration, IgnoreConfiguration, Resolver};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::{short_sha, Branch, SemanticVersion, Tag, TagParser};
use crate::error::{GitverError, Result};
use crate::git::{ancestors, Repository};
use crate::strategies::{BaseVersionCandidate, Fallback, VersionContext};
use crate::walker::MergeMessageParser;

/// What to calculate a version for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Target {
    /// Whatever HEAD points at
    #[default]
    Current,
    /// A branch by name, local branches before remote-tracking ones
    Branch(String),
    /// A specific commit
    Commit(Oid),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Current => f.write_str("HEAD"),
            Target::Branch(name) => f.write_str(name),
            Target::Commit(id) => write!(f, "{}", short_sha(*id)),
        }
    }
}

/// Result of one calculation
#[derive(Debug, Clone)]
pub struct CalculatedVersion {
    pub version: SemanticVersion,
    pub branch: Branch,
    pub configuration: EffectiveConfiguration,
    pub winner: BaseVersionCandidate,
    pub diagnostics: Vec<Diagnostic>,
}

impl CalculatedVersion {
    pub fn variables(&self) -> VersionVariables {
        VersionVariables::new(self)
    }
}

/// Calculate the version of `target`
///
/// Only configuration errors and graph inconsistencies abort; everything else
/// degrades to a default and shows up in [CalculatedVersion::diagnostics].
#[instrument(skip_all, fields(target = %target))]
pub fn calculate_version<R: Repository>(
    repo: &R,
    target: &Target,
    configuration: &Configuration,
) -> Result<CalculatedVersion> {
    let diagnostics = Diagnostics::new();
    let (version, branch, effective, winner) =
        with_context(repo, target, configuration, &diagnostics, |ctx| {
            let winner = select_winner(ctx)?;
            let version = next_version(ctx, &winner)?;
            Ok((version, ctx.branch.clone(), ctx.effective.clone(), winner))
        })?;

    info!(
        version = %version.full_sem_ver(),
        branch = branch.friendly_name(),
        strategy = %winner.strategy,
        "calculated version"
    );
    Ok(CalculatedVersion {
        version,
        branch,
        configuration: effective,
        winner,
        diagnostics: diagnostics.into_vec(),
    })
}

/// Compile everything a calculation needs and hand it to `f`
pub(crate) fn with_context<R, T>(
    repo: &R,
    target: &Target,
    configuration: &Configuration,
    diagnostics: &Diagnostics,
    f: impl FnOnce(&VersionContext<'_, R>) -> Result<T>,
) -> Result<T>
where
    R: Repository,
{
    configuration.validate()?;
    let matcher = BranchMatcher::compile(configuration)?;
    let tag_parser = configuration.tag_parser()?;
    let merge_messages = MergeMessageParser::new(configuration)?;
    let analyzer = VersionAnalyzer::new(configuration)?;

    let branches = repo.branches()?;
    for branch in &branches {
        repo.commit(branch.tip).map_err(|e| within("branch", &branch.name, e))?;
    }
    let branch = resolve_target(repo, target, &branches)?;
    let target_commit = repo.commit(branch.tip)?;
    let version_tags =
        collect_version_tags(repo, &tag_parser, &configuration.ignore, diagnostics)?;
    let ancestry = ancestors(repo, target_commit.id)?;

    let matched = matcher.match_branch(branch.friendly_name())?;
    let effective =
        Resolver::new(repo, &matcher, &branches, diagnostics).resolve(&branch, &matched)?;
    debug!(
        branch = branch.friendly_name(),
        branch_type = %effective.branch_type,
        increment = %effective.increment,
        label = ?effective.label,
        "resolved branch configuration"
    );

    let ctx = VersionContext {
        repo,
        configuration,
        matcher: &matcher,
        merge_messages: &merge_messages,
        analyzer: &analyzer,
        branch: &branch,
        target: &target_commit,
        effective: &effective,
        branches: &branches,
        version_tags: &version_tags,
        ancestry: &ancestry,
        diagnostics,
    };
    f(&ctx)
}

/// Attach the name of the ref that led to a missing commit
fn within(kind: &str, name: &str, error: GitverError) -> GitverError {
    match error {
        GitverError::GraphInconsistency(msg) => {
            GitverError::graph(format!("{} '{}': {}", kind, name, msg))
        }
        other => other,
    }
}

fn resolve_target<R: Repository>(repo: &R, target: &Target, branches: &[Branch]) -> Result<Branch> {
    match target {
        Target::Current => repo.current_branch(),
        Target::Branch(name) => branches
            .iter()
            .filter(|b| !b.is_remote)
            .chain(branches.iter().filter(|b| b.is_remote))
            .find(|b| b.name == *name || b.friendly_name() == name)
            .cloned()
            .ok_or_else(|| GitverError::graph(format!("Branch '{}' not found", name))),
        Target::Commit(id) => {
            repo.commit(*id)?;
            if let Ok(current) = repo.current_branch() {
                if current.tip == *id {
                    return Ok(current);
                }
            }
            Ok(branches
                .iter()
                .find(|b| !b.is_remote && b.tip == *id && b.name != "HEAD")
                .cloned()
                .unwrap_or_else(|| Branch::new("HEAD", *id)))
        }
    }
}

/// Tags that parse as versions and survive the ignore rules
fn collect_version_tags<R: Repository>(
    repo: &R,
    parser: &TagParser,
    ignore: &IgnoreConfiguration,
    diagnostics: &Diagnostics,
) -> Result<Vec<(Tag, SemanticVersion)>> {
    let mut tags = Vec::new();
    for tag in repo.tags()? {
        let version = match parser.try_parse(&tag.name) {
            None => continue,
            Some(Err(e)) => {
                diagnostics.push(Diagnostic::UnparsableTag {
                    tag: tag.name.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
            Some(Ok(version)) => version,
        };
        let commit = repo
            .commit(tag.target)
            .map_err(|e| within("tag", &tag.name, e))?;
        if let Some(reason) = ignore.reason(&commit.sha(), commit.timestamp) {
            diagnostics.push(Diagnostic::IgnoredCandidate {
                description: format!("tag '{}'", tag.name),
                reason,
            });
            continue;
        }
        tags.push((tag, version));
    }
    Ok(tags)
}

/// Run the configured strategies and pick the candidate to build on
fn select_winner<R: Repository>(ctx: &VersionContext<'_, R>) -> Result<BaseVersionCandidate> {
    let ignore = &ctx.configuration.ignore;
    let mut winner: Option<BaseVersionCandidate> = None;

    for kind in &ctx.configuration.strategies {
        for candidate in kind.candidates(ctx)? {
            if let Some(source) = candidate.source.filter(|_| !ignore.is_empty()) {
                let commit = ctx.repo.commit(source)?;
                if let Some(reason) = ignore.reason(&commit.sha(), commit.timestamp) {
                    ctx.diagnostics.push(Diagnostic::IgnoredCandidate {
                        description: candidate.description,
                        reason,
                    });
                    continue;
                }
            }
            debug!(
                strategy = %candidate.strategy,
                version = %candidate.version,
                source = ?candidate.source.map(short_sha),
                should_increment = candidate.should_increment,
                "{}",
                candidate.description
            );
            winner = match winner {
                Some(current) if !outranks(ctx.repo, &candidate, &current)? => Some(current),
                _ => Some(candidate),
            };
        }
    }

    Ok(winner.unwrap_or_else(Fallback::candidate))
}

/// Whether `a` beats `b`: higher triple, then the later source, then strategy priority
fn outranks<R: Repository>(
    repo: &R,
    a: &BaseVersionCandidate,
    b: &BaseVersionCandidate,
) -> Result<bool> {
    match a.version.triple().cmp(&b.version.triple()) {
        Ordering::Greater => return Ok(true),
        Ordering::Less => return Ok(false),
        Ordering::Equal => {}
    }
    if strictly_descends(repo, a.source, b.source)? {
        return Ok(true);
    }
    if strictly_descends(repo, b.source, a.source)? {
        return Ok(false);
    }
    Ok(a.strategy.priority() > b.strategy.priority())
}

/// A present source descends from an absent one (the root)
fn strictly_descends<R: Repository>(repo: &R, a: Option<Oid>, b: Option<Oid>) -> Result<bool> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(a != b && repo.is_ancestor(b, a)?),
        (Some(_), None) => Ok(true),
        (None, _) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IncrementStrategy;
    use crate::git::MockRepository;
    use crate::strategies::StrategyKind;

    fn candidate(
        strategy: StrategyKind,
        version: SemanticVersion,
        source: Option<Oid>,
    ) -> BaseVersionCandidate {
        BaseVersionCandidate::new(strategy, version, source, true, "test")
    }

    #[test]
    fn test_higher_triple_wins() {
        let repo = MockRepository::new();
        let low = candidate(StrategyKind::TaggedCommit, SemanticVersion::new(1, 0, 0), None);
        let high = candidate(StrategyKind::Fallback, SemanticVersion::new(1, 1, 0), None);
        assert!(outranks(&repo, &high, &low).unwrap());
        assert!(!outranks(&repo, &low, &high).unwrap());
    }

    #[test]
    fn test_tie_prefers_descendant_source() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        let b = (&mut repo).commit("B");
        let older = candidate(StrategyKind::TaggedCommit, SemanticVersion::new(1, 0, 0), Some(a));
        let newer = candidate(StrategyKind::Mainline, SemanticVersion::new(1, 0, 0), Some(b));
        assert!(outranks(&repo, &newer, &older).unwrap());

        let rootless = candidate(StrategyKind::TaggedCommit, SemanticVersion::new(1, 0, 0), None);
        assert!(outranks(&repo, &older, &rootless).unwrap());
    }

    #[test]
    fn test_tie_falls_back_to_priority() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        let tagged = candidate(StrategyKind::TaggedCommit, SemanticVersion::new(2, 0, 0), Some(a));
        let branch = candidate(
            StrategyKind::VersionInBranchName,
            SemanticVersion::new(2, 0, 0),
            Some(a),
        );
        assert!(outranks(&repo, &tagged, &branch).unwrap());
        assert!(!outranks(&repo, &branch, &tagged).unwrap());
    }

    #[test]
    fn test_target_by_commit_prefers_current_branch() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.branch("feature/x");
        let branches = repo.branches().unwrap();
        let branch = resolve_target(&repo, &Target::Commit(a), &branches).unwrap();
        assert_eq!(branch.name, "main");
    }

    #[test]
    fn test_target_by_commit_off_branch_is_detached() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        (&mut repo).commit("B");
        let branches = repo.branches().unwrap();
        let branch = resolve_target(&repo, &Target::Commit(a), &branches).unwrap();
        assert_eq!(branch.name, "HEAD");
        assert_eq!(branch.tip, a);
    }

    #[test]
    fn test_unknown_target_branch() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("A");
        let branches = repo.branches().unwrap();
        let err = resolve_target(&repo, &Target::Branch("nope".into()), &branches).unwrap_err();
        assert!(matches!(err, GitverError::GraphInconsistency(_)));
    }

    #[test]
    fn test_target_by_remote_branch_name() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.set_remote_branch("origin/release/1.0.0", a);
        let branches = repo.branches().unwrap();
        let branch =
            resolve_target(&repo, &Target::Branch("release/1.0.0".into()), &branches).unwrap();
        assert!(branch.is_remote);
    }

    #[test]
    fn test_unparsable_tag_reported() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.tag("v1.0.0", a);
        repo.tag("v1.x", a);
        let diagnostics = Diagnostics::new();
        let tags = collect_version_tags(
            &repo,
            &TagParser::default(),
            &IgnoreConfiguration::default(),
            &diagnostics,
        )
        .unwrap();
        assert_eq!(tags.len(), 1);
        assert!(matches!(
            diagnostics.into_vec().as_slice(),
            [Diagnostic::UnparsableTag { .. }]
        ));
    }

    #[test]
    fn test_ignored_tag_reported() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("A");
        repo.tag("v1.0.0", a);
        let ignore = IgnoreConfiguration {
            shas: vec![a.to_string()[..8].to_string()],
            ..Default::default()
        };
        let diagnostics = Diagnostics::new();
        let tags = collect_version_tags(&repo, &TagParser::default(), &ignore, &diagnostics).unwrap();
        assert!(tags.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_dangling_tag_is_graph_inconsistency() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("A");
        repo.tag("v1.0.0", Oid::from_bytes(&[9; 20]).unwrap());
        let err = calculate_version(&repo, &Target::Current, &Configuration::default()).unwrap_err();
        assert!(matches!(err, GitverError::GraphInconsistency(ref msg) if msg.contains("v1.0.0")));
    }

    #[test]
    fn test_context_resolves_effective_configuration() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("A");
        let diagnostics = Diagnostics::new();
        let increment = with_context(
            &repo,
            &Target::Current,
            &Configuration::default(),
            &diagnostics,
            |ctx| Ok(ctx.effective.increment),
        )
        .unwrap();
        assert_eq!(increment, IncrementStrategy::Patch);
    }
}
