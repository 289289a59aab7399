//! Request path handling
//!
//! URL paths are decoded and normalised into segments before they touch the
//! filesystem. `..` can only pop segments that the request itself supplied, so
//! the joined path never leaves the serving root.

use std::path::{Path, PathBuf};

use crate::permission::{Entry, Gate};
use crate::resolver::Status;

/// A decoded, normalised URL path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    segments: Vec<String>,
    trailing_slash: bool,
}

impl RequestPath {
    /// Decode a raw (percent-encoded) URL path.
    ///
    /// Returns `None` when the path does not decode to UTF-8 or contains NUL.
    pub fn parse(raw: &str) -> Option<Self> {
        let decoded = urlencoding::decode(raw).ok()?;
        if decoded.contains('\0') {
            return None;
        }

        let mut segments: Vec<String> = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s.to_string()),
            }
        }

        Some(Self {
            segments,
            trailing_slash: decoded.ends_with('/'),
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// `/a/b`, or `/` for the root
    pub fn to_url_path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Filesystem path of this request below `root`
    pub fn under(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        path.extend(&self.segments);
        path
    }

    /// Whether any segment is a hidden name
    pub fn has_hidden_segment(&self) -> bool {
        self.segments.iter().any(|s| s.starts_with('.'))
    }

    /// Number of leading segments up to and including the first one that
    /// ends in `.git` and is followed by more path, i.e. where the URL
    /// contains `.git/`.
    pub fn git_prefix_len(&self) -> Option<usize> {
        let last = self.segments.len().checked_sub(1)?;
        self.segments
            .iter()
            .position(|s| s.ends_with(".git"))
            .filter(|&i| i < last || self.trailing_slash)
            .map(|i| i + 1)
    }

    /// Directory to authorise before handing the request to the git backend
    pub fn git_delegate_dir(&self, root: &Path) -> Option<PathBuf> {
        let len = self.git_prefix_len()?;
        let mut path = root.to_path_buf();
        path.extend(&self.segments[..len]);
        Some(path)
    }
}

/// Decide whether the smart-HTTP backend may serve `dir`
pub fn authorize_delegate(gate: &Gate, dir: &Path) -> Status {
    match Entry::stat(dir) {
        Err(_) => Status::NotFound,
        Ok(entry) if gate.bits_only(&entry) => Status::Ok,
        Ok(_) => Status::Forbidden,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalises() {
        let p = RequestPath::parse("/a//b/./c/").unwrap();
        assert_eq!(p.segments(), ["a", "b", "c"]);
        assert_eq!(p.to_url_path(), "/a/b/c");

        let p = RequestPath::parse("/").unwrap();
        assert!(p.is_root());
        assert_eq!(p.to_url_path(), "/");
    }

    #[test]
    fn test_dotdot_never_escapes() {
        let p = RequestPath::parse("/../../etc/passwd").unwrap();
        assert_eq!(p.segments(), ["etc", "passwd"]);
        assert_eq!(p.under(Path::new("/srv")), PathBuf::from("/srv/etc/passwd"));

        let p = RequestPath::parse("/a/%2e%2e/%2E%2E/%2e%2e/b").unwrap();
        assert_eq!(p.segments(), ["b"]);
    }

    #[test]
    fn test_percent_decoding() {
        let p = RequestPath::parse("/my%20repo/blob/a%2Fb.txt").unwrap();
        assert_eq!(p.segments(), ["my repo", "blob", "a", "b.txt"]);

        assert!(RequestPath::parse("/bad%00name").is_none());
        assert!(RequestPath::parse("/bad%ffutf8").is_none());
    }

    #[test]
    fn test_hidden_segments() {
        assert!(RequestPath::parse("/a/.ssh/keys").unwrap().has_hidden_segment());
        assert!(!RequestPath::parse("/a/b").unwrap().has_hidden_segment());
    }

    #[test]
    fn test_git_delegate_dir() {
        let root = Path::new("/srv");

        let p = RequestPath::parse("/project/.git/info/refs").unwrap();
        assert_eq!(p.git_delegate_dir(root), Some(PathBuf::from("/srv/project/.git")));

        let p = RequestPath::parse("/group/bare.git/git-upload-pack").unwrap();
        assert_eq!(p.git_delegate_dir(root), Some(PathBuf::from("/srv/group/bare.git")));

        let p = RequestPath::parse("/bare.git/").unwrap();
        assert_eq!(p.git_delegate_dir(root), Some(PathBuf::from("/srv/bare.git")));

        // no `.git/` in the URL
        assert_eq!(RequestPath::parse("/bare.git").unwrap().git_delegate_dir(root), None);
        assert_eq!(RequestPath::parse("/project/tree/").unwrap().git_delegate_dir(root), None);
        assert_eq!(RequestPath::parse("/").unwrap().git_delegate_dir(root), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_authorize_delegate() {
        use crate::permission::Threshold;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().unwrap();
        let git_dir = temp.path().join("project/.git");
        fs::create_dir_all(&git_dir).unwrap();
        fs::set_permissions(&git_dir, fs::Permissions::from_mode(0o700)).unwrap();

        assert_eq!(
            authorize_delegate(&Gate::new(Threshold::Other), &git_dir),
            Status::Forbidden
        );
        assert_eq!(
            authorize_delegate(&Gate::new(Threshold::Owner), &git_dir),
            Status::Ok
        );
        assert_eq!(
            authorize_delegate(&Gate::default(), &temp.path().join("missing.git")),
            Status::NotFound
        );
    }
}
