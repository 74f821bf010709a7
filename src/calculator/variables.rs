use indexmap::IndexMap;
use serde::Serialize;

use crate::calculator::CalculatedVersion;

/// Names of the output variables, in output order
pub const VARIABLE_NAMES: &[&str] = &[
    "Major",
    "Minor",
    "Patch",
    "PreReleaseLabel",
    "PreReleaseNumber",
    "WeightedPreReleaseNumber",
    "SemVer",
    "FullSemVer",
    "InformationalVersion",
    "BranchName",
    "Sha",
    "ShortSha",
    "CommitsSinceVersionSource",
    "VersionSourceSha",
    "CommitDate",
];

/// Flat name/value view of a calculated version, for printing and scripting
///
/// Values are strings; absent values (no pre-release, no source) are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VersionVariables {
    values: IndexMap<&'static str, String>,
}

impl VersionVariables {
    pub fn new(calculated: &CalculatedVersion) -> Self {
        let version = &calculated.version;
        let meta = &version.build_metadata;
        let number = version.pre_release.as_ref().and_then(|pre| pre.number);
        let weighted = number.map(|n| n + calculated.configuration.pre_release_weight);
        let text = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_default();

        let values = [
            version.major.to_string(),
            version.minor.to_string(),
            version.patch.to_string(),
            version
                .pre_release
                .as_ref()
                .map(|pre| pre.name.clone())
                .unwrap_or_default(),
            text(number),
            text(weighted),
            version.to_string(),
            version.full_sem_ver(),
            version.informational_version(),
            meta.branch_name.clone(),
            meta.sha.clone(),
            meta.short_sha.clone(),
            meta.commits_since_version_source.to_string(),
            meta.version_source_sha.clone().unwrap_or_default(),
            meta.commit_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        ];

        VersionVariables {
            values: VARIABLE_NAMES.iter().copied().zip(values).collect(),
        }
    }

    /// Look up a variable by name, ignoring case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.values.iter().map(|(key, value)| (*key, value.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use crate::calculator::{calculate_version, Target};
    use crate::config::Configuration;
    use crate::git::MockRepository;

    #[test]
    fn test_variables_for_feature_branch() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v1.0.0");
        repo.checkout("feature/login");
        (&mut repo).commit("add login");

        let calculated =
            calculate_version(&repo, &Target::Current, &Configuration::default()).unwrap();
        let variables = calculated.variables();

        assert_eq!(variables.get("Major"), Some("1"));
        assert_eq!(variables.get("Patch"), Some("1"));
        assert_eq!(variables.get("PreReleaseLabel"), Some("login"));
        assert_eq!(variables.get("PreReleaseNumber"), Some("1"));
        assert_eq!(variables.get("WeightedPreReleaseNumber"), Some("30001"));
        assert_eq!(variables.get("SemVer"), Some("1.0.1-login.1"));
        assert_eq!(variables.get("FullSemVer"), Some("1.0.1-login.1+1"));
        assert_eq!(variables.get("BranchName"), Some("feature/login"));
        assert_eq!(variables.get("commitssinceversionsource"), Some("1"));
        assert_eq!(variables.get("CommitDate"), Some("2023-11-14"));
        assert!(variables.get("Nope").is_none());
    }

    #[test]
    fn test_variables_in_declared_order() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        let calculated =
            calculate_version(&repo, &Target::Current, &Configuration::default()).unwrap();
        let names: Vec<_> = calculated.variables().iter().map(|(name, _)| name).collect();
        assert_eq!(names, super::VARIABLE_NAMES);
    }

    #[test]
    fn test_release_has_empty_pre_release_variables() {
        let mut repo = MockRepository::new();
        (&mut repo).commit("initial");
        repo.tag_head("v3.1.0");
        let calculated =
            calculate_version(&repo, &Target::Current, &Configuration::default()).unwrap();
        let variables = calculated.variables();
        assert_eq!(variables.get("PreReleaseLabel"), Some(""));
        assert_eq!(variables.get("PreReleaseNumber"), Some(""));
        assert_eq!(variables.get("FullSemVer"), Some("3.1.0"));
    }
}
