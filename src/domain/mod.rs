//! Domain types - versions, commits, tags and branches independent of any git backend

pub mod branch;
pub mod commit;
pub mod prerelease;
pub mod tag;
pub mod version;

pub use branch::{friendly_name, Branch};
pub use commit::{short_sha, Commit};
pub use prerelease::PreRelease;
pub use tag::{Tag, TagParser};
pub use version::{BuildMetadata, IncrementStrategy, SemanticVersion, SemanticVersionFormat};
