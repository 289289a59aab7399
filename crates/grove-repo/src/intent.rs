//! Request intents
//!
//! The suffix left over after the repository root is classified once into an
//! [`Intent`]; everything downstream matches on the enum.

use serde::{Deserialize, Serialize};

/// What a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Filesystem directory listing outside any repository
    PlainDirectory,
    /// Directory inside a repository's tree
    TreeView,
    /// File inside a repository, rendered as a page
    BlobView,
    /// File inside a repository, sent as-is
    RawView,
    /// Repository root: log and README
    FrontPage,
    /// Nothing matched
    Unresolved,
}

/// How the router picks a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dispatch {
    /// Use the classifier's intent
    #[default]
    Structural,
    /// Match `tree`, `blob` and `raw` anywhere in the rendered URL
    Substring,
}

/// Result of classifying a repository-relative suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub intent: Intent,
    /// Path inside the repository the intent applies to
    pub path: String,
}

/// Classify the path suffix below a confirmed repository root.
///
/// `blob/`, `tree/` and `raw/` are tested in that order. An empty tree path
/// becomes `"."`; tree paths keep their trailing separator, file paths lose it.
pub fn classify(suffix: &str) -> Classified {
    if suffix.is_empty() {
        return Classified {
            intent: Intent::FrontPage,
            path: String::new(),
        };
    }

    let suffix = format!("{}/", suffix);
    if let Some(rest) = suffix.strip_prefix("blob/") {
        return Classified {
            intent: Intent::BlobView,
            path: rest.trim_end_matches('/').to_string(),
        };
    }
    if let Some(rest) = suffix.strip_prefix("tree/") {
        let path = if rest.is_empty() { "." } else { rest };
        return Classified {
            intent: Intent::TreeView,
            path: path.to_string(),
        };
    }
    if let Some(rest) = suffix.strip_prefix("raw/") {
        return Classified {
            intent: Intent::RawView,
            path: rest.trim_end_matches('/').to_string(),
        };
    }

    Classified {
        intent: Intent::Unresolved,
        path: String::new(),
    }
}

/// Keyword dispatch over the full rendered URL.
///
/// Kept for deployments that depend on the old routing: a branch or file whose
/// name contains `tree`, `blob` or `raw` can select the wrong page.
pub fn substring_dispatch(url: &str, is_git: bool) -> Intent {
    if !is_git {
        Intent::PlainDirectory
    } else if url.contains("tree") {
        Intent::TreeView
    } else if url.contains("blob") {
        Intent::BlobView
    } else if url.contains("raw") {
        Intent::RawView
    } else {
        Intent::FrontPage
    }
}
