//! Branch-type configuration
//!
//! A [Configuration] is an ordered set of branch types plus global defaults and
//! options. Files are TOML and overlay the built-in GitHub-flow defaults field by
//! field, so a file only needs to state what differs.
//!
//! ```toml
//! mode = "ContinuousDelivery"
//! next_version = "2.0.0"
//!
//! [branches.main]
//! increment = "Minor"
//!
//! [branches.hotfix]
//! regex = "^hotfix(es)?[/-](?<BranchName>.+)"
//! increment = "Patch"
//! label = "hotfix"
//! source_branches = ["main"]
//! ```

pub mod resolver;

pub use resolver::{BranchMatcher, EffectiveConfiguration, MatchedBranchType, Resolver};

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{IncrementStrategy, SemanticVersion, SemanticVersionFormat, TagParser};
use crate::error::{ConfigurationError, GitverError, Result};
use crate::strategies::StrategyKind;

/// File name looked up in the working directory and the user config directory
pub const CONFIG_FILE_NAME: &str = "gitver.toml";

/// Whether a branch carries pre-release labels and how they are numbered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeploymentMode {
    /// Pre-release number stays constant until a tag is made
    #[default]
    ManualDeployment,
    /// Pre-release number grows with every commit
    ContinuousDelivery,
    /// No pre-release; the commit count is folded into the patch number
    ContinuousDeployment,
}

/// Whether `+semver:` messages in commits raise the increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommitMessageIncrementMode {
    #[default]
    Enabled,
    Disabled,
    MergeMessageOnly,
}

/// Settings for one branch type
///
/// Every field is optional; unset fields fall back to the global defaults of
/// the [Configuration].
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BranchConfiguration {
    pub regex: Option<String>,
    pub increment: Option<IncrementStrategy>,
    /// Label template, e.g. `{BranchName}` or `PullRequest{Number}`
    pub label: Option<String>,
    /// Explicit label, takes precedence over `label`
    pub tag: Option<String>,
    pub mode: Option<DeploymentMode>,
    pub is_main_branch: Option<bool>,
    pub is_release_branch: Option<bool>,
    pub source_branches: Option<Vec<String>>,
    pub track_merge_target: Option<bool>,
    pub track_merge_message: Option<bool>,
    pub tracks_release_branches: Option<bool>,
    pub pre_release_weight: Option<u64>,
    pub prevent_increment_when_current_commit_tagged: Option<bool>,
    pub prevent_increment_of_merged_branch: Option<bool>,
    pub commit_message_incrementing: Option<CommitMessageIncrementMode>,
}

macro_rules! overlay_fields {
    ($target:expr, $other:expr, $($field:ident),+ $(,)?) => {
        $(
            if $other.$field.is_some() {
                $target.$field = $other.$field.clone();
            }
        )+
    };
}

impl BranchConfiguration {
    /// Copy every field `other` sets over this configuration
    pub fn overlay(&mut self, other: &BranchConfiguration) {
        overlay_fields!(
            self,
            other,
            regex,
            increment,
            label,
            tag,
            mode,
            is_main_branch,
            is_release_branch,
            source_branches,
            track_merge_target,
            track_merge_message,
            tracks_release_branches,
            pre_release_weight,
            prevent_increment_when_current_commit_tagged,
            prevent_increment_of_merged_branch,
            commit_message_incrementing,
        );
    }

    /// This configuration with unset fields taken from `defaults`
    pub fn with_defaults(&self, defaults: &BranchConfiguration) -> BranchConfiguration {
        let mut merged = defaults.clone();
        merged.overlay(self);
        merged
    }
}

/// Commits and tags the engine should pretend do not exist
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IgnoreConfiguration {
    /// Full or abbreviated commit ids
    pub shas: Vec<String>,
    /// RFC 3339 timestamp, e.g. `"2024-01-01T00:00:00Z"`
    pub commits_before: Option<DateTime<Utc>>,
}

impl IgnoreConfiguration {
    /// Why a commit is ignored, if it is
    pub fn reason(&self, sha: &str, timestamp: DateTime<Utc>) -> Option<String> {
        if let Some(ignored) = self
            .shas
            .iter()
            .find(|ignored| !ignored.is_empty() && sha.starts_with(ignored.as_str()))
        {
            return Some(format!("sha {} is ignored", ignored));
        }
        match self.commits_before {
            Some(before) if timestamp < before => {
                Some(format!("commit predates {}", before.to_rfc3339()))
            }
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.shas.is_empty() && self.commits_before.is_none()
    }
}

/// Represents the complete configuration for gitver.
///
/// Contains global branch defaults, the ordered branch types and the options that
/// steer tag parsing, strategies and commit-message incrementing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    /// Regex matched at the start of tag names before the version
    pub tag_prefix: String,
    /// Regex with a `version` group, applied to each `/`-separated part of a branch name
    pub version_in_branch_pattern: String,
    /// Lower bound for the next version
    pub next_version: Option<String>,
    pub semantic_version_format: SemanticVersionFormat,
    pub strategies: Vec<StrategyKind>,
    /// Extra merge message regexes by name, tried before the built-in formats
    pub merge_message_formats: IndexMap<String, String>,
    pub major_version_bump_message: String,
    pub minor_version_bump_message: String,
    pub patch_version_bump_message: String,
    pub no_bump_message: String,
    pub label_max_length: usize,
    /// Branches matching no type use an implicit fallback type instead of failing
    pub allow_unmatched_branches: bool,
    pub ignore: IgnoreConfiguration,

    /// Branch settings applied wherever a branch type leaves a field unset
    #[serde(flatten)]
    pub defaults: BranchConfiguration,

    /// Branch types in match order
    pub branches: IndexMap<String, BranchConfiguration>,
}

/// Returns the default branch-level settings.
fn default_branch_defaults() -> BranchConfiguration {
    BranchConfiguration {
        regex: None,
        increment: Some(IncrementStrategy::Inherit),
        label: Some("{BranchName}".to_string()),
        tag: None,
        mode: Some(DeploymentMode::ManualDeployment),
        is_main_branch: Some(false),
        is_release_branch: Some(false),
        source_branches: Some(Vec::new()),
        track_merge_target: Some(false),
        track_merge_message: Some(true),
        tracks_release_branches: Some(false),
        pre_release_weight: Some(0),
        prevent_increment_when_current_commit_tagged: Some(false),
        prevent_increment_of_merged_branch: Some(false),
        commit_message_incrementing: Some(CommitMessageIncrementMode::Enabled),
    }
}

fn strings(values: &[&str]) -> Option<Vec<String>> {
    Some(values.iter().map(|s| s.to_string()).collect())
}

/// Returns the default GitHub-flow branch types.
fn default_branches() -> IndexMap<String, BranchConfiguration> {
    let mut branches = IndexMap::new();
    branches.insert(
        "main".to_string(),
        BranchConfiguration {
            regex: Some("^master$|^main$".to_string()),
            increment: Some(IncrementStrategy::Patch),
            label: Some(String::new()),
            is_main_branch: Some(true),
            source_branches: Some(Vec::new()),
            track_merge_message: Some(true),
            pre_release_weight: Some(55000),
            prevent_increment_when_current_commit_tagged: Some(true),
            prevent_increment_of_merged_branch: Some(true),
            ..Default::default()
        },
    );
    branches.insert(
        "release".to_string(),
        BranchConfiguration {
            regex: Some("^releases?[/-](?<BranchName>.+)".to_string()),
            increment: Some(IncrementStrategy::None),
            label: Some("beta".to_string()),
            is_release_branch: Some(true),
            source_branches: strings(&["main", "release"]),
            pre_release_weight: Some(30000),
            prevent_increment_when_current_commit_tagged: Some(true),
            prevent_increment_of_merged_branch: Some(true),
            ..Default::default()
        },
    );
    branches.insert(
        "feature".to_string(),
        BranchConfiguration {
            regex: Some("^features?[/-](?<BranchName>.+)".to_string()),
            increment: Some(IncrementStrategy::Inherit),
            label: Some("{BranchName}".to_string()),
            source_branches: strings(&["main", "release"]),
            pre_release_weight: Some(30000),
            prevent_increment_when_current_commit_tagged: Some(false),
            ..Default::default()
        },
    );
    branches.insert(
        "pull-request".to_string(),
        BranchConfiguration {
            regex: Some("^(pull-requests|pull|pr)[/-](?<Number>\\d*)".to_string()),
            increment: Some(IncrementStrategy::Inherit),
            label: Some("PullRequest{Number}".to_string()),
            mode: Some(DeploymentMode::ContinuousDelivery),
            source_branches: strings(&["main", "release", "feature"]),
            pre_release_weight: Some(30000),
            prevent_increment_when_current_commit_tagged: Some(false),
            ..Default::default()
        },
    );
    branches
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            tag_prefix: "[vV]?".to_string(),
            version_in_branch_pattern: "(?<version>[vV]?\\d+(\\.\\d+)?(\\.\\d+)?).*".to_string(),
            next_version: None,
            semantic_version_format: SemanticVersionFormat::Strict,
            strategies: StrategyKind::defaults(),
            merge_message_formats: IndexMap::new(),
            major_version_bump_message: "\\+semver:\\s?(breaking|major)".to_string(),
            minor_version_bump_message: "\\+semver:\\s?(feature|minor)".to_string(),
            patch_version_bump_message: "\\+semver:\\s?(fix|patch)".to_string(),
            no_bump_message: "\\+semver:\\s?(none|skip)".to_string(),
            label_max_length: 40,
            allow_unmatched_branches: true,
            ignore: IgnoreConfiguration::default(),
            defaults: default_branch_defaults(),
            branches: default_branches(),
        }
    }
}

impl Configuration {
    /// Parse a TOML document and overlay it on the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let parsed: Configuration = toml::from_str(content)?;
        let base = Configuration::default();

        // Scalar options already fell back to defaults during deserialisation;
        // branch settings are merged field by field instead.
        let mut defaults = base.defaults;
        defaults.overlay(&parsed.defaults);
        let mut branches = base.branches;
        for (key, branch) in &parsed.branches {
            branches.entry(key.clone()).or_default().overlay(branch);
        }

        let config = Configuration {
            defaults,
            branches,
            ..parsed
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the options that can be checked without a repository
    pub fn validate(&self) -> Result<()> {
        if self.label_max_length == 0 {
            return Err(GitverError::invalid_value(
                "label_max_length",
                "must be greater than zero",
            ));
        }
        if self.strategies.is_empty() {
            return Err(GitverError::invalid_value(
                "strategies",
                "at least one strategy is required",
            ));
        }
        for (key, branch) in &self.branches {
            for source in branch.source_branches.iter().flatten() {
                if !self.branches.contains_key(source) {
                    return Err(GitverError::invalid_value(
                        format!("branches.{}.source_branches", key),
                        format!("unknown branch type '{}'", source),
                    ));
                }
            }
        }
        self.parsed_next_version()?;
        Ok(())
    }

    /// The configured next version, parsed leniently
    pub fn parsed_next_version(&self) -> Result<Option<SemanticVersion>> {
        let Some(value) = self.next_version.as_deref() else {
            return Ok(None);
        };
        SemanticVersion::parse(value.trim(), None, SemanticVersionFormat::Loose)
            .map(Some)
            .map_err(|_| {
                ConfigurationError::InvalidNextVersion {
                    value: value.to_string(),
                }
                .into()
            })
    }

    /// Parser for version tags using the configured prefix and format
    pub fn tag_parser(&self) -> Result<TagParser> {
        TagParser::new(&self.tag_prefix, self.semantic_version_format)
    }

    /// Settings of a branch type with global defaults filled in
    pub fn branch(&self, key: &str) -> Option<BranchConfiguration> {
        self.branches
            .get(key)
            .map(|branch| branch.with_defaults(&self.defaults))
    }

    /// Render as TOML, e.g. for `--show-config`
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| GitverError::invalid_value("configuration", e.to_string()))
    }
}

/// Candidate configuration file locations, most specific first
fn config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![Path::new(".").join(CONFIG_FILE_NAME)];
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join(CONFIG_FILE_NAME));
    }
    candidates
}

/// Loads configuration from file or returns defaults.
///
/// Attempts to load configuration in the following order:
/// 1. Custom path provided as parameter
/// 2. `gitver.toml` in current directory
/// 3. `gitver.toml` in user config directory
/// 4. Default configuration if no file found
///
/// # Arguments
/// * `config_path` - Optional path to custom configuration file
///
/// # Returns
/// * `Ok(Configuration)` - Loaded or default configuration
/// * `Err` - If file exists but cannot be read, parsed or validated
pub fn load_config(config_path: Option<&Path>) -> Result<Configuration> {
    let path = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => config_candidates().into_iter().find(|path| path.exists()),
    };

    let Some(path) = path else {
        debug!("no configuration file found, using defaults");
        return Ok(Configuration::default());
    };

    debug!(path = %path.display(), "loading configuration");
    let content = fs::read_to_string(&path)?;
    Configuration::from_toml(&content)
}
