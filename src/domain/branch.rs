use git2::Oid;

/// A branch (local or remote-tracking) and the commit at its tip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub tip: Oid,
    pub is_current: bool,
    pub is_remote: bool,
}

impl Branch {
    /// Create a local branch
    pub fn new(name: impl Into<String>, tip: Oid) -> Self {
        Branch {
            name: name.into(),
            tip,
            is_current: false,
            is_remote: false,
        }
    }

    pub fn current(mut self) -> Self {
        self.is_current = true;
        self
    }

    pub fn remote(mut self) -> Self {
        self.is_remote = true;
        self
    }

    /// Name used for pattern matching and labels
    ///
    /// `refs/heads/feature/x`, `refs/remotes/origin/feature/x` and
    /// `origin/feature/x` (remote) all become `feature/x`.
    pub fn friendly_name(&self) -> &str {
        friendly_name(&self.name, self.is_remote)
    }

    /// Whether two branch entries refer to the same logical branch
    pub fn same_name(&self, other: &Branch) -> bool {
        self.friendly_name() == other.friendly_name()
    }
}

/// Strip ref prefixes and the remote name from a branch name
pub fn friendly_name(name: &str, is_remote: bool) -> &str {
    if let Some(rest) = name.strip_prefix("refs/heads/") {
        return rest;
    }
    if let Some(rest) = name.strip_prefix("refs/remotes/") {
        return rest.split_once('/').map_or(rest, |(_, branch)| branch);
    }
    if let Some(rest) = name.strip_prefix("refs/") {
        return rest;
    }
    if is_remote {
        return name.split_once('/').map_or(name, |(_, branch)| branch);
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid() -> Oid {
        Oid::from_bytes(&[3; 20]).unwrap()
    }

    #[test]
    fn test_local_branch() {
        let branch = Branch::new("main", oid());
        assert_eq!(branch.friendly_name(), "main");
        assert!(!branch.is_current);
        assert!(branch.clone().current().is_current);
    }

    #[test]
    fn test_friendly_name_strips_refs() {
        assert_eq!(friendly_name("refs/heads/feature/foo", false), "feature/foo");
        assert_eq!(friendly_name("refs/remotes/origin/release/1.0", true), "release/1.0");
        assert_eq!(friendly_name("refs/pull/2/merge", false), "pull/2/merge");
    }

    #[test]
    fn test_remote_branch_drops_remote_name() {
        let branch = Branch::new("origin/feature/foo", oid()).remote();
        assert_eq!(branch.friendly_name(), "feature/foo");
        assert!(branch.same_name(&Branch::new("feature/foo", oid())));
    }

    #[test]
    fn test_local_branch_keeps_slashes() {
        let branch = Branch::new("feature/foo", oid());
        assert_eq!(branch.friendly_name(), "feature/foo");
    }
}
