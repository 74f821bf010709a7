//! Semantic versions derived from git history
//!
//! Given a commit graph, its tags and branches, and a branch-type
//! configuration, [calculate_version] works out the version a commit should
//! carry. The graph is read through the [git::Repository] trait, implemented
//! for real repositories by [git::Git2Repository] and for in-memory graphs by
//! [git::MockRepository].
//!
//! ```rust
//! use gitver::git::MockRepository;
//! use gitver::{calculate_version, Configuration, Target};
//!
//! let mut repo = MockRepository::new();
//! repo.commit("initial");
//! repo.tag_head("v1.0.0");
//! repo.checkout("feature/login");
//! repo.commit("add login form");
//!
//! let calculated = calculate_version(&repo, &Target::Current, &Configuration::default()).unwrap();
//! assert_eq!(calculated.version.full_sem_ver(), "1.0.1-login.1+1");
//! ```

pub mod analyzer;
pub mod calculator;
pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod git;
pub mod strategies;
pub mod ui;
pub mod walker;

pub use calculator::{calculate_version, CalculatedVersion, Target, VersionVariables};
pub use config::{load_config, Configuration};
pub use diagnostics::Diagnostic;
pub use domain::{IncrementStrategy, SemanticVersion};
pub use error::{GitverError, Result};
