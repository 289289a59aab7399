//! Repository content access
//!
//! [`ContentProvider`] is everything the page renderer needs from a
//! repository. [`GitCli`] implements it by running the `git` binary against the
//! repository directory. Command failures are logged and collapse to the empty
//! value for that operation, so a broken ref renders as an empty page rather
//! than an error.

use serde::Serialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::{Error, Result};

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// One entry of the commit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Commit {
    pub sha: String,
    pub author: String,
    pub time: String,
    pub subject: String,
    pub body: String,
}

/// Read access to one repository
pub trait ContentProvider {
    /// Whether `reference` names a commit
    fn ref_exists(&self, reference: &str) -> bool;
    /// Short branch name `reference` points at
    fn branch(&self, reference: &str) -> String;
    fn tags(&self) -> Vec<String>;
    /// Number of commits reachable from HEAD
    fn total_commits(&self) -> usize;
    fn sha(&self, reference: &str) -> String;
    /// Newest first, at most `max`
    fn commits(&self, reference: &str, max: usize) -> Vec<Commit>;
    /// File content at `reference`, empty if absent
    fn get_file(&self, reference: &str, path: &str) -> Vec<u8>;
    /// Names in a tree at `reference`; subdirectories end in `/`
    fn get_dir(&self, reference: &str, path: &str) -> Vec<String>;
}

/// [`ContentProvider`] backed by the `git` command line
#[derive(Debug, Clone)]
pub struct GitCli {
    repo: PathBuf,
}

impl GitCli {
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    pub fn path(&self) -> &Path {
        &self.repo
    }

    fn run<I, S>(&self, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        run_git(Some(&self.repo), args)
    }

    fn run_text<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let out = self.run(args)?;
        let text = String::from_utf8(out)
            .map_err(|_| Error::InvalidOutput("not utf-8".into()))?;
        Ok(text.trim_end().to_string())
    }

    fn or_empty<T: Default>(&self, what: &str, result: Result<T>) -> T {
        result.unwrap_or_else(|e| {
            debug!("{} in {}: {}", what, self.repo.display(), e);
            T::default()
        })
    }
}

/// Reject revisions git would parse as options
fn valid_rev(rev: &str) -> bool {
    !rev.is_empty() && !rev.starts_with('-')
}

/// `<rev>:<path>` for a tree, with the repository root as `<rev>:`
fn tree_spec(reference: &str, path: &str) -> String {
    let path = path.trim_start_matches("./").trim_end_matches('/');
    let path = if path == "." { "" } else { path };
    format!("{}:{}", reference, path)
}

impl ContentProvider for GitCli {
    fn ref_exists(&self, reference: &str) -> bool {
        if !valid_rev(reference) {
            return false;
        }
        let spec = format!("{}^{{commit}}", reference);
        self.run(["rev-parse", "--verify", "--quiet", spec.as_str()])
            .is_ok()
    }

    fn branch(&self, reference: &str) -> String {
        if !valid_rev(reference) {
            return String::new();
        }
        let result = self.run_text(["rev-parse", "--abbrev-ref", reference]);
        self.or_empty("branch", result)
    }

    fn tags(&self) -> Vec<String> {
        let result = self
            .run_text(["tag", "--list"])
            .map(|out| out.lines().map(str::to_string).collect());
        self.or_empty("tags", result)
    }

    fn total_commits(&self) -> usize {
        let result = self
            .run_text(["rev-list", "--count", "HEAD"])
            .and_then(|out| {
                out.parse::<usize>()
                    .map_err(|_| Error::InvalidOutput(format!("commit count: {}", out)))
            });
        self.or_empty("total_commits", result)
    }

    fn sha(&self, reference: &str) -> String {
        if !valid_rev(reference) {
            return String::new();
        }
        // a range prints one line per end; the first is the tip
        let result = self
            .run_text(["rev-parse", reference])
            .map(|out| out.lines().next().unwrap_or_default().to_string());
        self.or_empty("sha", result)
    }

    fn commits(&self, reference: &str, max: usize) -> Vec<Commit> {
        if !valid_rev(reference) {
            return Vec::new();
        }
        let max_count = format!("--max-count={}", max);
        let format = "--format=%H%x1f%an%x1f%ad%x1f%s%x1f%b%x1e";
        let result = self
            .run_text(["log", max_count.as_str(), "--date=iso-strict", format, reference, "--"])
            .map(|out| parse_log(&out));
        self.or_empty("commits", result)
    }

    fn get_file(&self, reference: &str, path: &str) -> Vec<u8> {
        if !valid_rev(reference) || path.is_empty() {
            return Vec::new();
        }
        let spec = format!("{}:{}", reference, path);
        let result = self.run(["show", spec.as_str()]);
        self.or_empty("get_file", result)
    }

    fn get_dir(&self, reference: &str, path: &str) -> Vec<String> {
        if !valid_rev(reference) {
            return Vec::new();
        }
        let spec = tree_spec(reference, path);
        let result = self
            .run(["ls-tree", "-z", spec.as_str()])
            .map(|out| parse_ls_tree(&out));
        self.or_empty("get_dir", result)
    }
}

fn parse_log(out: &str) -> Vec<Commit> {
    out.split(RECORD_SEP)
        .map(|record| record.trim_start_matches('\n'))
        .filter(|record| !record.is_empty())
        .filter_map(|record| {
            let mut fields = record.splitn(5, FIELD_SEP);
            Some(Commit {
                sha: fields.next()?.to_string(),
                author: fields.next()?.to_string(),
                time: fields.next()?.to_string(),
                subject: fields.next()?.to_string(),
                body: fields.next().unwrap_or_default().trim_end().to_string(),
            })
        })
        .collect()
}

fn parse_ls_tree(out: &[u8]) -> Vec<String> {
    out.split(|&b| b == 0)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let entry = String::from_utf8_lossy(entry);
            let (meta, name) = entry.split_once('\t')?;
            let kind = meta.split_whitespace().nth(1)?;
            Some(if kind == "tree" {
                format!("{}/", name)
            } else {
                name.to_string()
            })
        })
        .collect()
}

/// Run git, optionally inside `dir`, returning stdout
pub fn run_git<I, S>(dir: Option<&Path>, args: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let mut cmd = Command::new("git");
    if let Some(dir) = dir {
        cmd.arg("-C").arg(dir);
    }
    let output = cmd.args(&args).output()?;

    if !output.status.success() {
        let command = args
            .first()
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .unwrap_or_default();
        return Err(Error::Git {
            command,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

/// Name of the local git user, used to highlight their commits
pub fn git_user() -> String {
    match run_git(None, ["var", "GIT_COMMITTER_IDENT"]) {
        Ok(out) => {
            let ident = String::from_utf8_lossy(&out);
            ident
                .split(" <")
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        }
        Err(e) => {
            debug!("git user unavailable: {}", e);
            String::new()
        }
    }
}
