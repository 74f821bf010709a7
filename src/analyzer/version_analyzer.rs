use git2::Oid;
use regex::Regex;
use tracing::trace;

use crate::config::{CommitMessageIncrementMode, Configuration};
use crate::domain::IncrementStrategy;
use crate::error::{ConfigurationError, Result};
use crate::git::Repository;

/// Reads `+semver:` markers from commit messages to raise the increment
#[derive(Debug, Clone)]
pub struct VersionAnalyzer {
    major: Regex,
    minor: Regex,
    patch: Regex,
    no_bump: Regex,
}

fn compile(key: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| {
        ConfigurationError::InvalidPattern {
            key: key.to_string(),
            source,
        }
        .into()
    })
}

impl VersionAnalyzer {
    /// Create a new version analyzer from the configured bump messages
    pub fn new(config: &Configuration) -> Result<Self> {
        Ok(VersionAnalyzer {
            major: compile("major_version_bump_message", &config.major_version_bump_message)?,
            minor: compile("minor_version_bump_message", &config.minor_version_bump_message)?,
            patch: compile("patch_version_bump_message", &config.patch_version_bump_message)?,
            no_bump: compile("no_bump_message", &config.no_bump_message)?,
        })
    }

    /// Increment requested by a single message
    ///
    /// A message carrying the no-bump marker requests nothing, whatever else it says.
    pub fn analyze_message(&self, message: &str) -> Option<IncrementStrategy> {
        if self.no_bump.is_match(message) {
            trace!("commit opts out of message increments");
            return None;
        }
        if self.major.is_match(message) {
            Some(IncrementStrategy::Major)
        } else if self.minor.is_match(message) {
            Some(IncrementStrategy::Minor)
        } else if self.patch.is_match(message) {
            Some(IncrementStrategy::Patch)
        } else {
            None
        }
    }

    /// Largest increment requested by any of the messages
    pub fn analyze_messages<S: AsRef<str>>(&self, messages: &[S]) -> Option<IncrementStrategy> {
        let mut highest = None;
        for message in messages {
            let requested = self.analyze_message(message.as_ref());
            if requested == Some(IncrementStrategy::Major) {
                return requested;
            }
            highest = highest.max(requested);
        }
        highest
    }

    /// Analyze commits reachable from `to` but not from `from` (both sides of merges)
    pub fn analyze_repository_range<R: Repository>(
        &self,
        repo: &R,
        from: Option<Oid>,
        to: Oid,
        mode: CommitMessageIncrementMode,
    ) -> Result<Option<IncrementStrategy>> {
        if mode == CommitMessageIncrementMode::Disabled {
            return Ok(None);
        }
        let mut messages = Vec::new();
        for commit in repo.commits_between(from, to, false) {
            let commit = commit?;
            if mode == CommitMessageIncrementMode::MergeMessageOnly && !commit.is_merge() {
                continue;
            }
            messages.push(commit.message);
        }
        Ok(self.analyze_messages(&messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::MockRepository;

    fn analyzer() -> VersionAnalyzer {
        VersionAnalyzer::new(&Configuration::default()).unwrap()
    }

    #[test]
    fn test_analyze_major() {
        let messages = vec![
            "Add endpoint +semver: minor".to_string(),
            "Rename API field\n\n+semver: breaking".to_string(),
        ];
        assert_eq!(
            analyzer().analyze_messages(&messages),
            Some(IncrementStrategy::Major)
        );
    }

    #[test]
    fn test_analyze_minor() {
        let messages = vec!["feat +semver:feature".to_string(), "fix +semver: fix".to_string()];
        assert_eq!(
            analyzer().analyze_messages(&messages),
            Some(IncrementStrategy::Minor)
        );
    }

    #[test]
    fn test_analyze_patch() {
        assert_eq!(
            analyzer().analyze_message("Handle nulls +semver: patch"),
            Some(IncrementStrategy::Patch)
        );
    }

    #[test]
    fn test_analyze_no_markers() {
        let messages = vec!["Update readme", "feat: conventional commits are not markers"];
        assert_eq!(analyzer().analyze_messages(&messages), None);
    }

    #[test]
    fn test_analyze_empty() {
        let messages: Vec<String> = Vec::new();
        assert_eq!(analyzer().analyze_messages(&messages), None);
        assert_eq!(analyzer().analyze_message(""), None);
    }

    #[test]
    fn test_no_bump_marker_is_ignored() {
        let analyzer = analyzer();
        assert_eq!(analyzer.analyze_message("Tidy up +semver: none"), None);
        assert_eq!(analyzer.analyze_message("Tidy up +semver: skip"), None);
        let messages = vec!["Tidy up +semver: skip", "Add search +semver: minor"];
        assert_eq!(
            analyzer.analyze_messages(&messages),
            Some(IncrementStrategy::Minor)
        );
    }

    #[test]
    fn test_custom_bump_messages() {
        let config = Configuration {
            major_version_bump_message: r"^BREAKING".to_string(),
            ..Default::default()
        };
        let analyzer = VersionAnalyzer::new(&config).unwrap();
        assert_eq!(
            analyzer.analyze_message("BREAKING: drop v1 api"),
            Some(IncrementStrategy::Major)
        );
        assert_eq!(analyzer.analyze_message("+semver: major"), None);
    }

    #[test]
    fn test_invalid_bump_message() {
        let config = Configuration {
            minor_version_bump_message: "(".to_string(),
            ..Default::default()
        };
        let err = VersionAnalyzer::new(&config).unwrap_err();
        assert!(err.to_string().contains("minor_version_bump_message"));
    }

    #[test]
    fn test_analyze_repository_range_modes() {
        let mut repo = MockRepository::new();
        let a = (&mut repo).commit("initial");
        repo.checkout("feature/x");
        (&mut repo).commit("Add search +semver: minor");
        repo.checkout("main");
        let m = repo.merge_with_message("feature/x", "Merge branch 'feature/x' +semver: patch");

        let analyzer = analyzer();
        let range = |mode| {
            analyzer
                .analyze_repository_range(&repo, Some(a), m, mode)
                .unwrap()
        };
        assert_eq!(range(CommitMessageIncrementMode::Enabled), Some(IncrementStrategy::Minor));
        assert_eq!(
            range(CommitMessageIncrementMode::MergeMessageOnly),
            Some(IncrementStrategy::Patch)
        );
        assert_eq!(range(CommitMessageIncrementMode::Disabled), None);
    }
}
