//! Request routing
//!
//! Resolves a page request to a repository (or plain directory), picks the
//! intent and builds the page. Runs on a blocking thread: every step here is
//! synchronous filesystem or git work.

use grove_repo::{
    substring_dispatch, Commit, ContentProvider, Dispatch, Entry, GitCli, Intent, RequestPath,
    Resolution, Status,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use tracing::{error, warn};

use super::mime::raw_content_type;
use super::ui::{self, Link, LogEntry, RepoHeader};
use super::Site;

pub const DEFAULT_REF: &str = "HEAD";
pub const DEFAULT_COMMITS: usize = 10;
const README_NAMES: [&str; 3] = ["README", "README.txt", "README.md"];

/// Everything the router needs from one HTTP request
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub path: RequestPath,
    pub params: HashMap<String, String>,
    /// Raw query string, without `?`
    pub query: String,
    pub host: String,
}

impl PageRequest {
    /// `http://host/path/`
    fn url(&self) -> String {
        format!(
            "http://{}{}/",
            self.host,
            self.path.to_url_path().trim_end_matches('/')
        )
    }

    fn query_suffix(&self) -> String {
        if self.query.is_empty() {
            String::new()
        } else {
            format!("?{}", self.query)
        }
    }
}

/// A rendered response body
#[derive(Debug)]
pub enum Page {
    Html(String),
    Json(String),
    Raw {
        content_type: &'static str,
        body: Vec<u8>,
    },
}

/// Revisions picked from the `ref` and `since` parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revisions {
    /// Revision files and trees are read at
    pub reference: String,
    /// Revision or range the log is read from
    pub log: String,
}

impl Revisions {
    pub fn select<P: ContentProvider>(repo: &P, params: &HashMap<String, String>) -> Self {
        let reference = params
            .get("ref")
            .filter(|r| !r.is_empty() && repo.ref_exists(r))
            .cloned()
            .unwrap_or_else(|| DEFAULT_REF.to_string());

        // results include `ref` and exclude `since`
        let log = match params.get("since") {
            Some(since) if !since.is_empty() && repo.ref_exists(since) => {
                format!("{}..{}", since, reference)
            }
            _ => reference.clone(),
        };

        Self { reference, log }
    }
}

/// Maximum commits to show; anything unparsable falls back to the default
pub fn commit_limit(params: &HashMap<String, String>) -> usize {
    params
        .get("c")
        .and_then(|c| c.parse().ok())
        .unwrap_or(DEFAULT_COMMITS)
}

/// Resolve and render one page request
pub fn route(site: &Site, req: &PageRequest) -> Result<Page, Status> {
    let requested = req.path.under(site.resolver.root());
    let res = site.resolver.resolve(&requested);
    if !res.status.is_ok() {
        return Err(res.status);
    }

    let intent = match site.dispatch {
        Dispatch::Structural => res.intent,
        Dispatch::Substring => substring_dispatch(&req.url(), res.is_git),
    };

    match intent {
        Intent::PlainDirectory => directory_page(site, req, &res),
        Intent::Unresolved => Err(Status::NotFound),
        _ => repo_view(site, req, &res, intent, &GitCli::new(&res.repo_root)),
    }
}

/// Page for a request inside a repository. Revisions are selected once here.
fn repo_view<P: ContentProvider>(
    site: &Site,
    req: &PageRequest,
    res: &Resolution,
    intent: Intent,
    repo: &P,
) -> Result<Page, Status> {
    let revs = Revisions::select(repo, &req.params);

    match intent {
        Intent::FrontPage => {
            let header = repo_header(site, req, res, repo, &revs);
            front_page(repo, &header, req, &revs)
        }
        Intent::TreeView => {
            let header = repo_header(site, req, res, repo, &revs);
            Ok(tree_page(repo, &header, req, &revs, &res.inner_path))
        }
        Intent::BlobView => {
            let header = repo_header(site, req, res, repo, &revs);
            let content = repo.get_file(&revs.reference, &res.inner_path);
            Ok(Page::Html(ui::file_page(&header, &res.inner_path, &content)))
        }
        Intent::RawView => Ok(Page::Raw {
            content_type: raw_content_type(&res.inner_path),
            body: repo.get_file(&revs.reference, &res.inner_path),
        }),
        Intent::PlainDirectory | Intent::Unresolved => Err(Status::NotFound),
    }
}

fn repo_header<P: ContentProvider>(
    site: &Site,
    req: &PageRequest,
    res: &Resolution,
    repo: &P,
    revs: &Revisions,
) -> RepoHeader {
    let name = res
        .repo_root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let in_repo_path = match res.inner_path.as_str() {
        "" | "." => name,
        inner => format!("{}/{}", name, inner.trim_end_matches('/')),
    };

    RepoHeader {
        owner: site.owner.clone(),
        in_repo_path,
        url: req.url(),
        path: url_path_of(site, res),
        git_dir: "/.git".to_string(),
        branch: repo.branch(DEFAULT_REF),
        host: req.host.clone(),
        tag_num: repo.tags().len(),
        commit_num: repo.total_commits(),
        sha: repo.sha(&revs.reference),
        version: site.version.clone(),
        query: req.query_suffix(),
    }
}

/// URL path of the repository root, e.g. `/team/project`
fn url_path_of(site: &Site, res: &Resolution) -> String {
    let relative = res
        .repo_root
        .strip_prefix(site.resolver.root())
        .unwrap_or(&res.repo_root);
    let segments: Vec<String> = relative
        .iter()
        .map(|s| urlencoding::encode(&s.to_string_lossy()).into_owned())
        .collect();
    if segments.is_empty() {
        String::new()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Listing of a filesystem directory outside any repository
fn directory_page(site: &Site, req: &PageRequest, res: &Resolution) -> Result<Page, Status> {
    // nothing under a hidden directory is listed, however it was reached
    if req.path.has_hidden_segment() {
        return Err(Status::Forbidden);
    }

    let dir = res.repo_root.join(&res.inner_path);
    let entry = Entry::stat(&dir).map_err(|_| Status::NotFound)?;
    if !entry.is_dir {
        return Err(Status::NotFound);
    }
    if !site.resolver.gate().bits_only(&entry) {
        return Err(Status::Forbidden);
    }

    let read_dir = fs::read_dir(&dir).map_err(|e| {
        error!("Listing {} failed: {}", dir.display(), e);
        Status::InternalError
    })?;

    let url = req.url();
    let gate = site.resolver.gate();
    let mut entries: Vec<Link> = read_dir
        .filter_map(|item| item.ok())
        .filter_map(|item| {
            // stat rather than lstat so symlinks are judged by their target
            let child = Entry::stat(item.path()).ok()?;
            gate.full(&child).then(|| Link {
                url: format!("{}{}/", url, urlencoding::encode(&child.name)),
                name: child.name,
            })
        })
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let path = if req.path.is_root() {
        "/".to_string()
    } else {
        let mut nav = vec![
            Link {
                url: "/".to_string(),
                name: "/".to_string(),
            },
            Link {
                url: format!("{}../", url),
                name: "..".to_string(),
            },
        ];
        nav.append(&mut entries);
        entries = nav;
        req.path.to_url_path()
    };

    Ok(Page::Html(ui::directory_page(&path, &entries, &site.version)))
}

#[derive(Serialize)]
struct ApiSummary<'a> {
    branch: &'a str,
    sha: &'a str,
    tags: usize,
    total_commits: usize,
    commits: &'a [Commit],
}

/// Repository front page, or its JSON rendering when `api` is present
fn front_page<P: ContentProvider>(
    repo: &P,
    header: &RepoHeader,
    req: &PageRequest,
    revs: &Revisions,
) -> Result<Page, Status> {
    let commits = repo.commits(&revs.log, commit_limit(&req.params));

    if req.params.contains_key("api") {
        let summary = ApiSummary {
            branch: &header.branch,
            sha: &header.sha,
            tags: header.tag_num,
            total_commits: header.commit_num,
            commits: &commits,
        };
        return serde_json::to_string(&summary).map(Page::Json).map_err(|e| {
            error!("Rendering API response failed: {}", e);
            Status::InternalError
        });
    }

    let logs: Vec<LogEntry> = commits
        .iter()
        .filter(|c| !c.sha.is_empty())
        .map(|c| LogEntry {
            author: c.author.clone(),
            classtype: if !header.owner.is_empty() && c.author == header.owner {
                "-owner"
            } else {
                ""
            },
            sha: c.sha.clone(),
            time: c.time.clone(),
            subject: ui::escape_html(&c.subject),
            body: ui::escape_html(&c.body).replace('\n', "<br/>"),
        })
        .collect();

    let readme = README_NAMES
        .iter()
        .map(|name| repo.get_file(&revs.reference, name))
        .find(|content| !content.is_empty())
        .map(|content| ui::render_markdown(&content));

    Ok(Page::Html(ui::repo_page(header, &logs, readme.as_deref())))
}

/// Listing of a directory inside the repository tree
fn tree_page<P: ContentProvider>(
    repo: &P,
    header: &RepoHeader,
    req: &PageRequest,
    revs: &Revisions,
    dir: &str,
) -> Page {
    let names = repo.get_dir(&revs.reference, dir);
    if names.is_empty() {
        warn!("Tree {:?} at {} is empty or missing", dir, revs.reference);
    }

    let base = match dir {
        "." | "./" | "" => String::new(),
        d => format!("{}/", d.trim_end_matches('/')),
    };
    let entries: Vec<Link> = names
        .iter()
        .map(|name| {
            let kind = if name.ends_with('/') { "tree" } else { "blob" };
            let target = format!("{}{}", base, name.trim_end_matches('/'));
            let target: Vec<String> = target
                .split('/')
                .map(|s| urlencoding::encode(s).into_owned())
                .collect();
            Link {
                url: format!(
                    "http://{}{}/{}/{}",
                    req.host,
                    header.path,
                    kind,
                    target.join("/")
                ),
                name: name.clone(),
            }
        })
        .collect();

    Page::Html(ui::tree_page(header, &entries))
}
