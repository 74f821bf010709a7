use thiserror::Error;

/// Problems with the branch-type configuration
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("invalid pattern for '{key}': {source}")]
    InvalidPattern {
        key: String,
        #[source]
        source: regex::Error,
    },

    #[error("branch '{branch}' does not match any configured branch type")]
    NoMatchingBranchType { branch: String },

    #[error("invalid next-version '{value}'")]
    InvalidNextVersion { value: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Unified error type for gitver operations
#[derive(Error, Debug)]
pub enum GitverError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Graph inconsistency: {0}")]
    GraphInconsistency(String),

    #[error("Version parsing error: {0}")]
    Version(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration file error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in gitver
pub type Result<T> = std::result::Result<T, GitverError>;

impl GitverError {
    /// Create a graph inconsistency error with context
    pub fn graph(msg: impl Into<String>) -> Self {
        GitverError::GraphInconsistency(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        GitverError::Version(msg.into())
    }

    /// Create a configuration error for an invalid field value
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GitverError::Configuration(ConfigurationError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Whether this error comes from the configuration rather than the graph
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GitverError::Configuration(_) | GitverError::ConfigParse(_)
        )
    }
}
