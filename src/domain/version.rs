use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::PreRelease;
use crate::error::{GitverError, Result};

/// Which version component a branch type bumps
///
/// Ordered by impact so the larger of two increments can be taken with `max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum IncrementStrategy {
    None,
    #[default]
    Patch,
    Minor,
    Major,
    /// Take the increment of the branch this one was created from
    Inherit,
}

impl IncrementStrategy {
    /// Whether this is a concrete increment (anything but `Inherit`)
    pub fn is_concrete(self) -> bool {
        !matches!(self, IncrementStrategy::Inherit)
    }

    /// The larger of this increment and one requested by commit messages
    pub fn raised_by(self, requested: Option<IncrementStrategy>) -> IncrementStrategy {
        match requested {
            Some(requested) if requested.is_concrete() => self.max(requested),
            _ => self,
        }
    }
}

impl fmt::Display for IncrementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IncrementStrategy::None => "None",
            IncrementStrategy::Patch => "Patch",
            IncrementStrategy::Minor => "Minor",
            IncrementStrategy::Major => "Major",
            IncrementStrategy::Inherit => "Inherit",
        };
        f.write_str(name)
    }
}

/// How strictly version tags are parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SemanticVersionFormat {
    /// Full `major.minor.patch` as defined by semver.org
    #[default]
    Strict,
    /// Also accept `1`, `1.2` and four-part versions
    Loose,
}

/// Informational data attached to a calculated version
///
/// Never takes part in ordering or equality.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct BuildMetadata {
    pub commits_since_tag: u64,
    pub commits_since_version_source: u64,
    pub sha: String,
    pub short_sha: String,
    pub branch_name: String,
    pub version_source_sha: Option<String>,
    pub commit_date: Option<DateTime<Utc>>,
}

/// Semantic version with pre-release and build metadata
#[derive(Debug, Clone, Default)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre_release: Option<PreRelease>,
    pub build_metadata: BuildMetadata,
}

fn loose_pattern() -> &'static Regex {
    static LOOSE: OnceLock<Regex> = OnceLock::new();
    LOOSE.get_or_init(|| {
        Regex::new(
            r"^(?P<major>\d+)(?:\.(?P<minor>\d+))?(?:\.(?P<patch>\d+))?(?:\.\d+)?(?:-(?P<pre>[0-9A-Za-z.-]+))?(?:\+[0-9A-Za-z.-]+)?$",
        )
        .expect("loose version pattern is valid")
    })
}

impl SemanticVersion {
    /// Create a release version
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        SemanticVersion {
            major,
            minor,
            patch,
            ..Default::default()
        }
    }

    /// Parse a version, optionally stripping a tag prefix first
    ///
    /// `tag_prefix` must be anchored at the start (see `TagParser`).
    pub fn parse(
        text: &str,
        tag_prefix: Option<&Regex>,
        format: SemanticVersionFormat,
    ) -> Result<Self> {
        let rest = match tag_prefix.and_then(|re| re.find(text)) {
            Some(m) if m.start() == 0 => &text[m.end()..],
            _ => text,
        };

        match format {
            SemanticVersionFormat::Strict => {
                let parsed = semver::Version::parse(rest).map_err(|e| {
                    GitverError::version(format!("Invalid version '{}': {}", text, e))
                })?;
                let pre_release = if parsed.pre.is_empty() {
                    None
                } else {
                    Some(PreRelease::parse(parsed.pre.as_str())?)
                };
                Ok(SemanticVersion {
                    major: parsed.major,
                    minor: parsed.minor,
                    patch: parsed.patch,
                    pre_release,
                    build_metadata: BuildMetadata::default(),
                })
            }
            SemanticVersionFormat::Loose => {
                let captures = loose_pattern().captures(rest).ok_or_else(|| {
                    GitverError::version(format!("Invalid version format: '{}'", text))
                })?;
                let component = |name: &str| -> Result<u64> {
                    captures.name(name).map_or(Ok(0), |m| {
                        m.as_str().parse::<u64>().map_err(|_| {
                            GitverError::version(format!("Invalid {} version: {}", name, m.as_str()))
                        })
                    })
                };
                let pre_release = captures
                    .name("pre")
                    .map(|m| PreRelease::parse(m.as_str()))
                    .transpose()?;
                Ok(SemanticVersion {
                    major: component("major")?,
                    minor: component("minor")?,
                    patch: component("patch")?,
                    pre_release,
                    build_metadata: BuildMetadata::default(),
                })
            }
        }
    }

    /// The `(major, minor, patch)` triple
    pub fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }

    /// Same release triple, regardless of pre-release
    pub fn same_triple(&self, other: &SemanticVersion) -> bool {
        self.triple() == other.triple()
    }

    pub fn is_pre_release(&self) -> bool {
        self.pre_release.is_some()
    }

    /// Release version with the given component bumped
    ///
    /// Components already at `u64::MAX` stay there.
    pub fn increment(&self, strategy: IncrementStrategy) -> Self {
        let (major, minor, patch) = match strategy {
            IncrementStrategy::Major => (self.major.saturating_add(1), 0, 0),
            IncrementStrategy::Minor => (self.major, self.minor.saturating_add(1), 0),
            IncrementStrategy::Patch => (self.major, self.minor, self.patch.saturating_add(1)),
            IncrementStrategy::None | IncrementStrategy::Inherit => self.triple(),
        };
        SemanticVersion::new(major, minor, patch)
    }

    /// Copy of this version without pre-release or build metadata
    pub fn release(&self) -> Self {
        SemanticVersion::new(self.major, self.minor, self.patch)
    }

    pub fn with_pre_release(mut self, pre_release: Option<PreRelease>) -> Self {
        self.pre_release = pre_release;
        self
    }

    pub fn with_build_metadata(mut self, build_metadata: BuildMetadata) -> Self {
        self.build_metadata = build_metadata;
        self
    }

    /// `SemVer` plus the commit count, e.g. `1.2.0-beta.1+4`
    ///
    /// Release versions sitting exactly on their source omit the `+0`.
    pub fn full_sem_ver(&self) -> String {
        let commits = self.build_metadata.commits_since_version_source;
        if self.pre_release.is_none() && commits == 0 {
            self.to_string()
        } else {
            format!("{}+{}", self, commits)
        }
    }

    /// Version with every piece of build metadata, for display
    pub fn informational_version(&self) -> String {
        let meta = &self.build_metadata;
        let mut parts = vec![meta.commits_since_version_source.to_string()];
        if !meta.branch_name.is_empty() {
            parts.push(format!("Branch.{}", sanitize_metadata(&meta.branch_name)));
        }
        if !meta.sha.is_empty() {
            parts.push(format!("Sha.{}", meta.sha));
        }
        format!("{}+{}", self, parts.join("."))
    }
}

/// Build metadata only allows `[0-9A-Za-z-]`
fn sanitize_metadata(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.triple().hash(state);
        self.pre_release.hash(state);
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple()
            .cmp(&other.triple())
            .then_with(|| match (&self.pre_release, &other.pre_release) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}
