use std::cell::RefCell;
use std::fmt;

use git2::Oid;
use tracing::{debug, warn};

use crate::domain::{short_sha, IncrementStrategy};

/// Non-fatal findings made while calculating a version.
/// These never abort a calculation; they are reported to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A merge commit could not be confidently attributed to a branch type
    AmbiguousMergeAttribution { commit: Oid, reason: String },
    /// `Inherit` could not be resolved to a concrete increment
    UnresolvedInheritance {
        branch: String,
        fallback: IncrementStrategy,
    },
    /// Tag looks like a version but cannot be parsed as one
    UnparsableTag { tag: String, reason: String },
    /// A tag or candidate was dropped by the ignore rules
    IgnoredCandidate { description: String, reason: String },
}

impl Diagnostic {
    /// Whether the finding deserves the user's attention
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Diagnostic::AmbiguousMergeAttribution { .. } | Diagnostic::UnresolvedInheritance { .. }
        )
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::AmbiguousMergeAttribution { commit, reason } => {
                write!(f, "Merge commit {}: {}", short_sha(*commit), reason)
            }
            Diagnostic::UnresolvedInheritance { branch, fallback } => write!(
                f,
                "Cannot resolve inherited increment for '{}', using {}",
                branch, fallback
            ),
            Diagnostic::UnparsableTag { tag, reason } => {
                write!(f, "Cannot parse tag '{}': {}", tag, reason)
            }
            Diagnostic::IgnoredCandidate {
                description,
                reason,
            } => write!(f, "Ignoring {}: {}", description, reason),
        }
    }
}

/// Collects diagnostics for one calculation and logs them as they arrive
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: RefCell<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        if diagnostic.is_warning() {
            warn!("{}", diagnostic);
        } else {
            debug!("{}", diagnostic);
        }
        self.items.borrow_mut().push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items.into_inner()
    }
}
