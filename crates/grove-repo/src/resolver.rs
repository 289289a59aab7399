//! Repository boundary resolution
//!
//! Walks from a requested path up toward the serving root looking for a
//! `.git` marker. The innermost marker wins; without one the walk stops at the
//! serving root and the request is a plain directory view.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::intent::{classify, Intent};
use crate::permission::{Entry, Gate};

/// Name of the entry that marks a repository root
pub const MARKER: &str = ".git";

/// Outcome of a resolution or gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Forbidden,
    NotFound,
    InternalError,
}

impl Status {
    pub fn http_code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::InternalError => 500,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

/// Where a request landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Repository root, or the serving root when no repository was found
    pub repo_root: PathBuf,
    /// Path below `repo_root`; for repositories, the classified path
    pub inner_path: String,
    pub is_git: bool,
    pub intent: Intent,
    pub status: Status,
}

impl Resolution {
    fn plain(root: &Path, inner_path: String) -> Self {
        Self {
            repo_root: root.to_path_buf(),
            inner_path,
            is_git: false,
            intent: Intent::PlainDirectory,
            status: Status::Ok,
        }
    }

    fn failed(repo_root: PathBuf, status: Status) -> Self {
        Self {
            repo_root,
            inner_path: String::new(),
            is_git: true,
            intent: Intent::Unresolved,
            status,
        }
    }
}

/// Resolves request paths below one serving root
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
    gate: Gate,
}

impl Resolver {
    /// `root` should be absolute and clean; it is the upper bound of every walk.
    pub fn new(root: impl Into<PathBuf>, gate: Gate) -> Self {
        Self {
            root: root.into(),
            gate,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn gate(&self) -> Gate {
        self.gate
    }

    /// Find the repository enclosing `requested` and classify the rest of the path.
    ///
    /// `requested` is expected to lie below the serving root. If the walk ever
    /// leaves it, resolution stops as though the root had been reached.
    pub fn resolve(&self, requested: &Path) -> Resolution {
        let mut cursor = requested.to_path_buf();
        // components below the cursor, innermost last
        let mut suffix: Vec<String> = Vec::new();

        loop {
            if cursor == self.root || !cursor.starts_with(&self.root) {
                return Resolution::plain(&self.root, join_suffix(&suffix));
            }

            if fs::metadata(cursor.join(MARKER)).is_ok() {
                return self.open_repository(cursor, &suffix);
            }

            let Some(name) = cursor.file_name() else {
                return Resolution::plain(&self.root, join_suffix(&suffix));
            };
            suffix.push(name.to_string_lossy().into_owned());
            if !cursor.pop() {
                return Resolution::plain(&self.root, join_suffix(&suffix));
            }
        }
    }

    fn open_repository(&self, repo_root: PathBuf, suffix: &[String]) -> Resolution {
        // the marker was just seen, so failing to stat its parent is our fault
        let entry = match Entry::stat(&repo_root) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Stat of repository {} failed: {}", repo_root.display(), e);
                return Resolution::failed(repo_root, Status::InternalError);
            }
        };
        if !self.gate.bits_only(&entry) {
            return Resolution::failed(repo_root, Status::Forbidden);
        }

        let classified = classify(&join_suffix(suffix));
        if classified.intent == Intent::Unresolved {
            return Resolution::failed(repo_root, Status::NotFound);
        }

        Resolution {
            repo_root,
            inner_path: classified.path,
            is_git: true,
            intent: classified.intent,
            status: Status::Ok,
        }
    }
}

fn join_suffix(suffix: &[String]) -> String {
    suffix
        .iter()
        .rev()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("/")
}
