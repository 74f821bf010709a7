// tests/config_test.rs
use std::env;
use std::fs;
use std::io::Write;

use gitver::config::{load_config, Configuration, DeploymentMode, CONFIG_FILE_NAME};
use gitver::git::MockRepository;
use gitver::strategies::StrategyKind;
use gitver::{calculate_version, IncrementStrategy, Target};
use serial_test::serial;
use tempfile::{NamedTempFile, TempDir};

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_from_file() {
    let temp_file = write_config(
        r#"
mode = "ContinuousDelivery"
tag_prefix = "release-"
strategies = ["Fallback", "TaggedCommit", "Mainline"]

[branches.main]
increment = "Minor"

[branches.hotfix]
regex = "^hotfix(es)?[/-](?<BranchName>.+)"
increment = "Patch"
label = "hotfix"
source_branches = ["main"]
"#,
    );

    let config = load_config(Some(temp_file.path())).unwrap();
    assert_eq!(config.tag_prefix, "release-");
    assert_eq!(config.defaults.mode, Some(DeploymentMode::ContinuousDelivery));
    assert_eq!(
        config.strategies,
        vec![
            StrategyKind::Fallback,
            StrategyKind::TaggedCommit,
            StrategyKind::Mainline
        ]
    );
    assert_eq!(config.branches["main"].increment, Some(IncrementStrategy::Minor));
    assert_eq!(config.branches["main"].is_main_branch, Some(true));
    let keys: Vec<&str> = config.branches.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["main", "release", "feature", "pull-request", "hotfix"]);
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = load_config(Some(dir.path().join("absent.toml").as_path())).unwrap_err();
    assert!(!err.is_configuration());
}

#[test]
fn test_malformed_file_is_a_configuration_error() {
    let temp_file = write_config("[branches.main\nincrement = ");
    let err = load_config(Some(temp_file.path())).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_invalid_branch_pattern_fails_calculation() {
    let temp_file = write_config(
        r#"
[branches.feature]
regex = "^features?[/-](?<BranchName>.+"
"#,
    );
    let config = load_config(Some(temp_file.path())).unwrap();

    let mut repo = MockRepository::new();
    repo.commit("initial");
    let err = calculate_version(&repo, &Target::Current, &config).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("feature"));
}

#[test]
fn test_unmatched_branches_can_be_rejected() {
    let temp_file = write_config("allow_unmatched_branches = false");
    let config = load_config(Some(temp_file.path())).unwrap();

    let mut repo = MockRepository::with_initial_branch("scratch");
    repo.commit("initial");
    let err = calculate_version(&repo, &Target::Current, &config).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("scratch"));
}

#[test]
fn test_rendered_configuration_loads_back() {
    let rendered = Configuration::default().to_toml().unwrap();
    let temp_file = write_config(&rendered);
    assert_eq!(
        load_config(Some(temp_file.path())).unwrap(),
        Configuration::default()
    );
}

#[test]
#[serial]
fn test_config_file_in_working_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "next_version = \"4.2\"\n").unwrap();
    let original_dir = env::current_dir().unwrap();

    env::set_current_dir(dir.path()).unwrap();
    let loaded = load_config(None);
    env::set_current_dir(original_dir).unwrap();

    assert_eq!(loaded.unwrap().next_version.as_deref(), Some("4.2"));
}

#[test]
#[serial]
fn test_explicit_path_wins_over_working_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(CONFIG_FILE_NAME), "label_max_length = 10\n").unwrap();
    let explicit = write_config("label_max_length = 20\n");
    let original_dir = env::current_dir().unwrap();

    env::set_current_dir(dir.path()).unwrap();
    let loaded = load_config(Some(explicit.path()));
    env::set_current_dir(original_dir).unwrap();

    assert_eq!(loaded.unwrap().label_max_length, 20);
}
