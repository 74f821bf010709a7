//! Branch-type matching and per-branch resolution
//!
//! [BranchMatcher] is the compiled form of a [Configuration]: branch types in
//! declaration order with their patterns, plus the implicit fallback type used
//! for branches that match none of them. [Resolver] turns a matched type into
//! an [EffectiveConfiguration] for one branch, resolving `Inherit` increments
//! against the live branches of the repository.

use std::collections::HashSet;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::{
    BranchConfiguration, CommitMessageIncrementMode, Configuration, DeploymentMode,
};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::domain::{Branch, IncrementStrategy, SemanticVersion, SemanticVersionFormat, TagParser};
use crate::error::{ConfigurationError, GitverError, Result};
use crate::git::Repository;
use crate::walker::first_parent_distance;

/// Key reported for branches that fall through to the implicit fallback type
pub const UNMATCHED_BRANCH_TYPE: &str = "unknown";

#[derive(Debug, Clone)]
struct CompiledBranchType {
    key: String,
    regex: Regex,
    config: BranchConfiguration,
}

/// Compiled branch types, ready for matching
#[derive(Debug, Clone)]
pub struct BranchMatcher {
    types: Vec<CompiledBranchType>,
    fallback: BranchConfiguration,
    global_increment: Option<IncrementStrategy>,
    allow_unmatched: bool,
    version_in_branch: Regex,
    version_parser: TagParser,
    label_max_length: usize,
}

/// A branch name matched against the configured branch types
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedBranchType {
    /// Configured key; `None` for the implicit fallback type
    pub key: Option<String>,
    /// Branch-type settings with global defaults filled in
    pub config: BranchConfiguration,
    /// Friendly name of the matched branch
    pub branch_name: String,
    /// Value of the `BranchName` capture group
    pub branch_name_group: Option<String>,
    /// Value of the `Number` capture group
    pub number_group: Option<String>,
}

impl MatchedBranchType {
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(UNMATCHED_BRANCH_TYPE)
    }

    pub fn is_fallback(&self) -> bool {
        self.key.is_none()
    }

    /// Pull-request branch types are the ones whose pattern captures a `Number`
    pub fn is_pull_request(&self) -> bool {
        self.number_group.is_some()
    }
}

/// Lowercase, collapse anything but ASCII letters and digits into `-`, bound the length
pub fn sanitize_label(value: &str, max_length: usize) -> String {
    let mut label = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            label.push(c.to_ascii_lowercase());
        } else if !label.ends_with('-') {
            label.push('-');
        }
    }
    let mut label: String = label.trim_matches('-').chars().take(max_length).collect();
    while label.ends_with('-') {
        label.pop();
    }
    label
}

impl BranchMatcher {
    /// Compile every pattern of the configuration
    pub fn compile(config: &Configuration) -> Result<Self> {
        let mut types = Vec::with_capacity(config.branches.len());
        for key in config.branches.keys() {
            let branch = config
                .branch(key)
                .ok_or_else(|| GitverError::invalid_value("branches", key.clone()))?;
            let pattern = branch.regex.clone().ok_or_else(|| {
                GitverError::invalid_value(format!("branches.{}.regex", key), "missing pattern")
            })?;
            let regex = Regex::new(&pattern).map_err(|source| {
                ConfigurationError::InvalidPattern {
                    key: key.clone(),
                    source,
                }
            })?;
            types.push(CompiledBranchType {
                key: key.clone(),
                regex,
                config: branch,
            });
        }

        let mut fallback = config.defaults.clone();
        fallback.regex = None;
        fallback.increment = Some(IncrementStrategy::Inherit);
        fallback.source_branches = Some(config.branches.keys().cloned().collect());

        let version_in_branch = Regex::new(&config.version_in_branch_pattern).map_err(|source| {
            ConfigurationError::InvalidPattern {
                key: "version_in_branch_pattern".to_string(),
                source,
            }
        })?;

        Ok(BranchMatcher {
            types,
            fallback,
            global_increment: config.defaults.increment,
            allow_unmatched: config.allow_unmatched_branches,
            version_in_branch,
            version_parser: TagParser::new(&config.tag_prefix, SemanticVersionFormat::Loose)?,
            label_max_length: config.label_max_length,
        })
    }

    /// Match against configured branch types only
    pub fn try_match(&self, name: &str) -> Option<MatchedBranchType> {
        self.types.iter().find_map(|branch_type| {
            let captures = branch_type.regex.captures(name)?;
            let group = |group: &str| captures.name(group).map(|m| m.as_str().to_string());
            Some(MatchedBranchType {
                key: Some(branch_type.key.clone()),
                config: branch_type.config.clone(),
                branch_name: name.to_string(),
                branch_name_group: group("BranchName"),
                number_group: group("Number"),
            })
        })
    }

    /// First matching branch type in declaration order, else the implicit fallback
    pub fn match_branch(&self, name: &str) -> Result<MatchedBranchType> {
        if let Some(matched) = self.try_match(name) {
            trace!(branch = name, branch_type = matched.key(), "matched branch type");
            return Ok(matched);
        }
        if !self.allow_unmatched {
            return Err(ConfigurationError::NoMatchingBranchType {
                branch: name.to_string(),
            }
            .into());
        }
        debug!(branch = name, "no branch type matched, using fallback");
        Ok(MatchedBranchType {
            key: None,
            config: self.fallback.clone(),
            branch_name: name.to_string(),
            branch_name_group: None,
            number_group: None,
        })
    }

    /// Configured branch-type keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(|branch_type| branch_type.key.as_str())
    }

    /// Settings of a configured branch type, defaults filled in
    pub fn type_config(&self, key: &str) -> Option<&BranchConfiguration> {
        self.types
            .iter()
            .find(|branch_type| branch_type.key == key)
            .map(|branch_type| &branch_type.config)
    }

    fn source_index(&self, key: &str) -> usize {
        self.types
            .iter()
            .position(|branch_type| branch_type.key == key)
            .unwrap_or(usize::MAX)
    }

    /// Version embedded in a branch name, e.g. `release/1.2` → `1.2.0`
    pub fn version_in_branch_name(&self, name: &str) -> Option<SemanticVersion> {
        name.split('/').find_map(|segment| {
            let captures = self.version_in_branch.captures(segment)?;
            let version = captures.name("version")?;
            if version.start() != 0 {
                return None;
            }
            self.version_parser.parse(version.as_str())
        })
    }

    /// Pre-release label for a matched branch; `None` when the type has no label
    pub fn render_label(&self, matched: &MatchedBranchType) -> Option<String> {
        let template = matched
            .config
            .tag
            .as_ref()
            .or(matched.config.label.as_ref())?;
        let branch_name = matched
            .branch_name_group
            .as_deref()
            .unwrap_or(&matched.branch_name);
        let label = template
            .replace(
                "{BranchName}",
                &sanitize_label(branch_name, self.label_max_length),
            )
            .replace("{Number}", matched.number_group.as_deref().unwrap_or(""));
        Some(label)
    }

    fn last_resort_increment(&self) -> IncrementStrategy {
        self.global_increment
            .filter(|increment| increment.is_concrete())
            .unwrap_or(IncrementStrategy::Patch)
    }
}

/// Settings for one branch in one calculation, with nothing left to inherit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveConfiguration {
    /// Matched branch type, or `unknown` for the implicit fallback
    pub branch_type: String,
    pub increment: IncrementStrategy,
    /// Rendered pre-release label; `None` means the branch produces releases
    pub label: Option<String>,
    pub mode: DeploymentMode,
    pub is_main_branch: bool,
    pub is_release_branch: bool,
    pub source_branches: Vec<String>,
    pub track_merge_target: bool,
    pub track_merge_message: bool,
    pub tracks_release_branches: bool,
    pub pre_release_weight: u64,
    pub prevent_increment_when_current_commit_tagged: bool,
    pub prevent_increment_of_merged_branch: bool,
    pub commit_message_incrementing: CommitMessageIncrementMode,
    pub is_pull_request: bool,
    pub pull_request_number: Option<u64>,
}

/// Resolves matched branch types against the live branches of a repository
pub struct Resolver<'a, R: Repository> {
    repo: &'a R,
    matcher: &'a BranchMatcher,
    branches: &'a [Branch],
    diagnostics: &'a Diagnostics,
}

impl<'a, R: Repository> Resolver<'a, R> {
    pub fn new(
        repo: &'a R,
        matcher: &'a BranchMatcher,
        branches: &'a [Branch],
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Resolver {
            repo,
            matcher,
            branches,
            diagnostics,
        }
    }

    /// Effective configuration of `branch`
    pub fn resolve(
        &self,
        branch: &Branch,
        matched: &MatchedBranchType,
    ) -> Result<EffectiveConfiguration> {
        let config = &matched.config;
        let increment = self.resolve_increment(branch, matched)?;
        let pull_request_number = matched
            .number_group
            .as_deref()
            .and_then(|number| number.parse::<u64>().ok());

        Ok(EffectiveConfiguration {
            branch_type: matched.key().to_string(),
            increment,
            label: self.matcher.render_label(matched),
            mode: config.mode.unwrap_or_default(),
            is_main_branch: config.is_main_branch.unwrap_or(false),
            is_release_branch: config.is_release_branch.unwrap_or(false),
            source_branches: config.source_branches.clone().unwrap_or_default(),
            track_merge_target: config.track_merge_target.unwrap_or(false),
            track_merge_message: config.track_merge_message.unwrap_or(false),
            tracks_release_branches: config.tracks_release_branches.unwrap_or(false),
            pre_release_weight: config.pre_release_weight.unwrap_or(0),
            prevent_increment_when_current_commit_tagged: config
                .prevent_increment_when_current_commit_tagged
                .unwrap_or(false),
            prevent_increment_of_merged_branch: config
                .prevent_increment_of_merged_branch
                .unwrap_or(false),
            commit_message_incrementing: config.commit_message_incrementing.unwrap_or_default(),
            is_pull_request: matched.is_pull_request(),
            pull_request_number,
        })
    }

    /// Concrete increment of `branch`, following `source_branches` for `Inherit`
    pub fn resolve_increment(
        &self,
        branch: &Branch,
        matched: &MatchedBranchType,
    ) -> Result<IncrementStrategy> {
        let mut visited = HashSet::new();
        if let Some(increment) = self.inherit(branch, matched, &mut visited)? {
            return Ok(increment);
        }
        let fallback = self.matcher.last_resort_increment();
        self.diagnostics.push(Diagnostic::UnresolvedInheritance {
            branch: branch.friendly_name().to_string(),
            fallback,
        });
        Ok(fallback)
    }

    fn inherit(
        &self,
        branch: &Branch,
        matched: &MatchedBranchType,
        visited: &mut HashSet<String>,
    ) -> Result<Option<IncrementStrategy>> {
        if let Some(increment) = matched.config.increment.filter(|i| i.is_concrete()) {
            return Ok(Some(increment));
        }
        if !visited.insert(matched.key().to_string()) {
            debug!(branch_type = matched.key(), "inheritance cycle");
            return Ok(None);
        }

        let sources = matched.config.source_branches.clone().unwrap_or_default();
        for (candidate, candidate_type) in self.live_sources(branch, &sources)? {
            trace!(
                branch = branch.friendly_name(),
                source = candidate.friendly_name(),
                "inheriting increment"
            );
            if let Some(increment) = self.inherit(candidate, &candidate_type, visited)? {
                return Ok(Some(increment));
            }
        }

        Ok(sources
            .iter()
            .find_map(|key| self.inherit_from_configuration(key, visited)))
    }

    fn inherit_from_configuration(
        &self,
        key: &str,
        visited: &mut HashSet<String>,
    ) -> Option<IncrementStrategy> {
        let config = self.matcher.type_config(key)?;
        if let Some(increment) = config.increment.filter(|i| i.is_concrete()) {
            return Some(increment);
        }
        if !visited.insert(key.to_string()) {
            return None;
        }
        config
            .source_branches
            .iter()
            .flatten()
            .find_map(|source| self.inherit_from_configuration(source, visited))
    }

    /// Live branches of the source types, most recently diverged first
    fn live_sources(
        &self,
        branch: &Branch,
        sources: &[String],
    ) -> Result<Vec<(&'a Branch, MatchedBranchType)>> {
        let mut seen = HashSet::new();
        let mut ranked = Vec::new();

        let locals_first = self
            .branches
            .iter()
            .filter(|b| !b.is_remote)
            .chain(self.branches.iter().filter(|b| b.is_remote));
        for candidate in locals_first {
            let name = candidate.friendly_name();
            if name == "HEAD" || candidate.same_name(branch) || !seen.insert(name.to_string()) {
                continue;
            }
            let Some(candidate_type) = self.matcher.try_match(name) else {
                continue;
            };
            if !sources.iter().any(|source| source == candidate_type.key()) {
                continue;
            }
            let Some(base) = self.repo.merge_base(branch.tip, candidate.tip)? else {
                continue;
            };
            let distance = first_parent_distance(self.repo, Some(base), branch.tip)?;
            let order = self.matcher.source_index(candidate_type.key());
            ranked.push((distance, order, name.to_string(), candidate, candidate_type));
        }

        ranked.sort_by(|a, b| (a.0, a.1, &a.2).cmp(&(b.0, b.1, &b.2)));
        Ok(ranked
            .into_iter()
            .map(|(_, _, _, candidate, candidate_type)| (candidate, candidate_type))
            .collect())
    }
}
