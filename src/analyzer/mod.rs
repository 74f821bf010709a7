//! Analysis of commit messages for increment markers

pub mod version_analyzer;

pub use version_analyzer::VersionAnalyzer;
