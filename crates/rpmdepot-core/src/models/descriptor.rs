use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A path did not have the `repo/arch/filename` shape.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("not a repository path: {0:?} (expected repo/arch/filename)")]
pub struct InvalidPath(pub String);

/// Identity of a stored artifact: repository, architecture and filename.
///
/// The canonical storage key is the derived [`path`](FileDescriptor::path),
/// `repo/arch/filename`. Two descriptors are equal iff all three components
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileDescriptor {
    repo: String,
    arch: String,
    filename: String,
}

impl FileDescriptor {
    pub fn new(
        repo: impl Into<String>,
        arch: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        FileDescriptor {
            repo: repo.into(),
            arch: arch.into(),
            filename: filename.into(),
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Canonical storage key, `repo/arch/filename`.
    pub fn path(&self) -> String {
        format!("{}/{}/{}", self.repo, self.arch, self.filename)
    }

    /// Descriptor for the same filename and architecture in another repository.
    pub fn in_repo(&self, repo: impl Into<String>) -> Self {
        FileDescriptor {
            repo: repo.into(),
            arch: self.arch.clone(),
            filename: self.filename.clone(),
        }
    }
}

impl FromStr for FileDescriptor {
    type Err = InvalidPath;

    /// Parse a canonical path back into a descriptor. The filename component
    /// may itself contain slashes (`repo/repodata/x/y.xml` is valid).
    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let mut parts = path.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(repo), Some(arch), Some(filename))
                if !repo.is_empty() && !arch.is_empty() && !filename.is_empty() =>
            {
                Ok(FileDescriptor::new(repo, arch, filename))
            }
            _ => Err(InvalidPath(path.to_string())),
        }
    }
}

impl fmt::Display for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.repo, self.arch, self.filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn derives_canonical_path() {
        let descriptor = FileDescriptor::new("dev-repo", "noarch", "tool-1.0-1.noarch.rpm");
        assert_eq!(descriptor.path(), "dev-repo/noarch/tool-1.0-1.noarch.rpm");
    }

    #[test]
    fn parses_path_with_nested_filename() {
        let descriptor: FileDescriptor = "repo/repodata/sub/repomd.xml".parse().unwrap();
        assert_eq!(descriptor.repo(), "repo");
        assert_eq!(descriptor.arch(), "repodata");
        assert_eq!(descriptor.filename(), "sub/repomd.xml");
        assert_eq!(descriptor.path(), "repo/repodata/sub/repomd.xml");
    }

    #[test]
    fn rejects_incomplete_paths() {
        assert!("repo/arch".parse::<FileDescriptor>().is_err());
        assert!("".parse::<FileDescriptor>().is_err());
        assert!("repo//file".parse::<FileDescriptor>().is_err());
    }

    #[test]
    fn equality_and_hashing_are_structural() {
        let a = FileDescriptor::new("r", "noarch", "f.rpm");
        let b = "r/noarch/f.rpm".parse::<FileDescriptor>().unwrap();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn in_repo_keeps_arch_and_filename() {
        let source = FileDescriptor::new("staging", "x86_64", "pkg-2.1-3.x86_64.rpm");
        let target = source.in_repo("production");
        assert_eq!(target.path(), "production/x86_64/pkg-2.1-3.x86_64.rpm");
    }
}
