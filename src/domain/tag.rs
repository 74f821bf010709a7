use git2::Oid;
use regex::Regex;

use crate::domain::{SemanticVersion, SemanticVersionFormat};
use crate::error::{ConfigurationError, Result};

/// Represents a git tag, already peeled to the commit it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub name: String,
    pub target: Oid,
    pub annotated: bool,
}

impl Tag {
    /// Create a lightweight tag
    pub fn new(name: impl Into<String>, target: Oid) -> Self {
        Tag {
            name: name.into(),
            target,
            annotated: false,
        }
    }

    pub fn annotated(mut self) -> Self {
        self.annotated = true;
        self
    }
}

/// Recognises version tags (e.g. `v1.2.3`, `release-1.2.3` with prefix `release-`)
#[derive(Debug, Clone)]
pub struct TagParser {
    prefix: Regex,
    format: SemanticVersionFormat,
}

impl TagParser {
    /// Create a parser for the given prefix pattern (a regex, e.g. `[vV]?`)
    pub fn new(prefix: &str, format: SemanticVersionFormat) -> Result<Self> {
        let prefix = Regex::new(&format!("^(?:{})", prefix)).map_err(|source| {
            ConfigurationError::InvalidPattern {
                key: "tag_prefix".to_string(),
                source,
            }
        })?;
        Ok(TagParser { prefix, format })
    }

    /// Parse a tag name; `None` when the tag is not a version tag
    pub fn parse(&self, name: &str) -> Option<SemanticVersion> {
        SemanticVersion::parse(name, Some(&self.prefix), self.format).ok()
    }

    /// Like [TagParser::parse], but tells malformed versions apart from other tags
    ///
    /// `None` for names that do not look like versions at all (`nightly`),
    /// `Some(Err(_))` for names that start like one but fail to parse (`v1.2`
    /// in strict mode).
    pub fn try_parse(&self, name: &str) -> Option<Result<SemanticVersion>> {
        let rest = self
            .prefix
            .find(name)
            .map_or(name, |m| &name[m.end()..]);
        if !rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        Some(SemanticVersion::parse(name, Some(&self.prefix), self.format))
    }

    /// Whether the tag name is a version tag
    pub fn matches(&self, name: &str) -> bool {
        self.parse(name).is_some()
    }

    pub fn format(&self) -> SemanticVersionFormat {
        self.format
    }
}

impl Default for TagParser {
    fn default() -> Self {
        TagParser {
            prefix: Regex::new("^(?:[vV]?)").expect("default tag prefix is valid"),
            format: SemanticVersionFormat::Strict,
        }
    }
}
