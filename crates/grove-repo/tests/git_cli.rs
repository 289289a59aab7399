//! Integration tests using the actual git CLI
//!
//! These tests build real repositories and read them back through GitCli.
//! They are skipped when no git binary is installed.

use grove_repo::{ContentProvider, Gate, GitCli, Intent, Resolver, Status, Threshold};
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(["-c", "commit.gpgsign=false", "-c", "tag.gpgsign=false"])
        .args(args)
        .env("GIT_AUTHOR_NAME", "Test")
        .env("GIT_AUTHOR_EMAIL", "test@test.com")
        .env("GIT_COMMITTER_NAME", "Test")
        .env("GIT_COMMITTER_EMAIL", "test@test.com")
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Two commits on `main`, a `src/` directory and a tag
fn create_repo(dir: &Path) -> String {
    fs::create_dir_all(dir.join("src")).unwrap();
    git(dir, &["init", "-q"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);

    fs::write(dir.join("README.md"), "# Project\n\nHello grove.\n").unwrap();
    git(dir, &["add", "README.md"]);
    git(dir, &["commit", "-q", "-m", "Initial commit"]);
    let first = git(dir, &["rev-parse", "HEAD"]);

    fs::write(dir.join("src/lib.rs"), "pub fn answer() -> u32 { 42 }\n").unwrap();
    git(dir, &["add", "src/lib.rs"]);
    git(dir, &["commit", "-q", "-m", "Add library\n\nWith a body"]);
    git(dir, &["tag", "v1.0"]);

    first
}

#[test]
fn test_refs_and_counts() {
    if !git_available() {
        eprintln!("Skipping: git not available");
        return;
    }
    let dir = tempdir().unwrap();
    create_repo(dir.path());
    let repo = GitCli::new(dir.path());

    assert!(repo.ref_exists("HEAD"));
    assert!(repo.ref_exists("main"));
    assert!(repo.ref_exists("v1.0"));
    assert!(!repo.ref_exists("no-such-branch"));

    assert_eq!(repo.branch("HEAD"), "main");
    assert_eq!(repo.tags(), vec!["v1.0"]);
    assert_eq!(repo.total_commits(), 2);
    assert_eq!(repo.sha("HEAD").len(), 40);
    assert_eq!(repo.sha("HEAD"), repo.sha("v1.0"));
}

#[test]
fn test_commit_log() {
    if !git_available() {
        eprintln!("Skipping: git not available");
        return;
    }
    let dir = tempdir().unwrap();
    let first = create_repo(dir.path());
    let repo = GitCli::new(dir.path());

    let commits = repo.commits("HEAD", 10);
    assert_eq!(commits.len(), 2);
    assert_eq!(commits[0].subject, "Add library");
    assert_eq!(commits[0].body, "With a body");
    assert_eq!(commits[0].author, "Test");
    assert_eq!(commits[1].sha, first);

    assert_eq!(repo.commits("HEAD", 1).len(), 1);

    // since..ref excludes the starting commit
    let range = format!("{}..HEAD", first);
    let commits = repo.commits(&range, 10);
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].subject, "Add library");
}

#[test]
fn test_files_and_trees() {
    if !git_available() {
        eprintln!("Skipping: git not available");
        return;
    }
    let dir = tempdir().unwrap();
    create_repo(dir.path());
    let repo = GitCli::new(dir.path());

    assert_eq!(repo.get_file("HEAD", "README.md"), b"# Project\n\nHello grove.\n");
    assert!(repo.get_file("HEAD", "missing.txt").is_empty());
    assert!(repo.get_file("HEAD~1", "src/lib.rs").is_empty());

    assert_eq!(repo.get_dir("HEAD", "."), vec!["README.md", "src/"]);
    assert_eq!(repo.get_dir("HEAD", "src/"), vec!["lib.rs"]);
    assert!(repo.get_dir("HEAD", "nope/").is_empty());
}

#[test]
fn test_resolve_then_read() {
    if !git_available() {
        eprintln!("Skipping: git not available");
        return;
    }
    let root = tempdir().unwrap();
    let project = root.path().join("team/project");
    create_repo(&project);
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&project, fs::Permissions::from_mode(0o755)).unwrap();
    }

    let resolver = Resolver::new(root.path(), Gate::new(Threshold::Other));
    let res = resolver.resolve(&project.join("blob/src/lib.rs"));
    assert_eq!(res.status, Status::Ok);
    assert_eq!(res.intent, Intent::BlobView);
    assert_eq!(res.repo_root, project);

    let repo = GitCli::new(&res.repo_root);
    let content = repo.get_file("HEAD", &res.inner_path);
    assert_eq!(content, b"pub fn answer() -> u32 { 42 }\n");

    // the working tree's own directories resolve to the same repository
    let res = resolver.resolve(&project.join("src"));
    assert_eq!(res.repo_root, project);
    assert_eq!(res.status, Status::NotFound);
}
