//! Pre-release identifiers for semantic versions
//!
//! A pre-release is a label (possibly empty) with an optional number, e.g.
//! `beta.1`, `foo` or plain `1`. According to semver.org: https://semver.org/#spec-item-9

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{GitverError, Result};

/// Pre-release label with optional number
///
/// # Examples
/// - "beta.1" -> PreRelease { name: "beta", number: Some(1) }
/// - "alpha" -> PreRelease { name: "alpha", number: None }
/// - "4" -> PreRelease { name: "", number: Some(4) }
/// - "PullRequest2.2" -> PreRelease { name: "PullRequest2", number: Some(2) }
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreRelease {
    /// The label; empty for main-line pre-releases such as `1.0.0-3`
    pub name: String,
    /// Optional number (the counter within the label)
    pub number: Option<u64>,
}

impl PreRelease {
    /// Create a new pre-release
    pub fn new(name: impl Into<String>, number: Option<u64>) -> Self {
        PreRelease {
            name: name.into(),
            number,
        }
    }

    /// Parse a pre-release from the text after `-` in a version
    ///
    /// The trailing identifier becomes the number when it is numeric; everything
    /// before it is the name.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(GitverError::version("Empty pre-release identifier"));
        }

        let valid_identifier =
            |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !s.split('.').all(valid_identifier) {
            return Err(GitverError::version(format!(
                "Invalid pre-release identifier: '{}'",
                s
            )));
        }

        let (name, number) = match s.rsplit_once('.') {
            Some((head, tail)) => match tail.parse::<u64>() {
                Ok(n) => (head, Some(n)),
                Err(_) => (s, None),
            },
            None => match s.parse::<u64>() {
                Ok(n) => ("", Some(n)),
                Err(_) => (s, None),
            },
        };

        Ok(PreRelease::new(name, number))
    }

    /// Whether this label matches the label a branch would render
    pub fn has_label(&self, label: &str) -> bool {
        self.name == label
    }
}

impl FromStr for PreRelease {
    type Err = GitverError;

    fn from_str(s: &str) -> Result<Self> {
        PreRelease::parse(s)
    }
}

impl PartialOrd for PreRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PreRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.number.cmp(&other.number))
    }
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.name.is_empty(), self.number) {
            (true, Some(n)) => write!(f, "{}", n),
            (true, None) => Ok(()),
            (false, Some(n)) => write!(f, "{}.{}", self.name, n),
            (false, None) => write!(f, "{}", self.name),
        }
    }
}
