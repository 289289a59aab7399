//! HTML pages
//!
//! Every page is a `format!` template around a shared layout. Anything that
//! comes from the filesystem or a repository is escaped before it lands here,
//! except README markdown, which is rendered with raw HTML disabled and
//! script-capable link targets replaced.

use base64::Engine;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use super::mime::inline_image_type;

/// A named link in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub name: String,
}

/// Fields shared by all repository pages
#[derive(Debug, Clone, Default)]
pub struct RepoHeader {
    /// Local git user; their commits are highlighted
    pub owner: String,
    /// Repository name joined with the path inside it
    pub in_repo_path: String,
    /// URL of the current page, with a trailing slash
    pub url: String,
    /// URL path of the repository root
    pub path: String,
    pub git_dir: String,
    pub branch: String,
    pub host: String,
    pub tag_num: usize,
    pub commit_num: usize,
    pub sha: String,
    pub version: String,
    /// `?<query>` of the current request, or empty
    pub query: String,
}

impl RepoHeader {
    pub fn clone_url(&self) -> String {
        format!("http://{}{}{}", self.host, self.path, self.git_dir)
    }
}

/// One rendered commit
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub author: String,
    /// `-owner` for the local user's commits
    pub classtype: &'static str,
    pub sha: String,
    pub time: String,
    pub subject: String,
    pub body: String,
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Render README markdown; inline HTML is shown as text and link or image
/// targets with a scheme other than http, https or mailto become `#`
pub fn render_markdown(source: &[u8]) -> String {
    let source = String::from_utf8_lossy(source);
    let parser = Parser::new_ext(&source, Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH)
        .map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Link {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) => Event::Start(Tag::Image {
                link_type,
                dest_url: safe_url(dest_url),
                title,
                id,
            }),
            other => other,
        });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Relative and fragment URLs pass, as do http, https and mailto
fn safe_url(url: CowStr<'_>) -> CowStr<'_> {
    // a scheme is whatever precedes the first `:` that comes before any `/?#`
    let scheme = url
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .and_then(|head| head.split_once(':'))
        .map(|(scheme, _)| scheme.trim().to_ascii_lowercase());
    match scheme.as_deref() {
        None | Some("http") | Some("https") | Some("mailto") => url,
        Some(_) => CowStr::Borrowed("#"),
    }
}

fn layout(title: &str, version: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{}</title>
    <link rel="icon" href="/favicon.ico">
    <style>
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; background: #0a0a0a; color: #e0e0e0; padding: 40px; line-height: 1.5; }}
        .container {{ max-width: 1000px; margin: 0 auto; }}
        h1 {{ color: #4caf7a; font-size: 28px; font-weight: 600; margin-bottom: 10px; }}
        .meta {{ color: #888; font-size: 14px; margin-bottom: 24px; }}
        .meta code, .sha {{ font-family: monospace; color: #aaa; }}
        .card {{ background: #1a1a1a; border: 1px solid #2a2a2a; border-radius: 8px; padding: 20px; margin-bottom: 24px; overflow-x: auto; }}
        ul.listing {{ list-style: none; }}
        ul.listing li {{ padding: 6px 0; border-top: 1px solid #2a2a2a; }}
        ul.listing li:first-child {{ border-top: none; }}
        .commit {{ padding: 10px 0; border-top: 1px solid #2a2a2a; }}
        .commit:first-child {{ border-top: none; }}
        .commit .author {{ color: #ccc; font-weight: 600; }}
        .commit .author-owner {{ color: #4caf7a; font-weight: 600; }}
        .commit .time {{ color: #777; font-size: 13px; }}
        .commit .body {{ color: #999; font-size: 14px; margin-top: 4px; }}
        .code {{ display: flex; font-family: monospace; font-size: 13px; white-space: pre; }}
        .code .lines {{ text-align: right; padding-right: 12px; color: #555; user-select: none; }}
        .code .lines a {{ color: #555; }}
        .readme h1, .readme h2, .readme h3 {{ color: #e0e0e0; margin: 16px 0 8px; }}
        .readme p, .readme ul, .readme pre {{ margin-bottom: 12px; }}
        .readme pre {{ background: #111; padding: 12px; border-radius: 6px; }}
        a {{ color: #4caf7a; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        footer {{ color: #555; font-size: 12px; text-align: center; margin-top: 40px; }}
    </style>
</head>
<body>
    <div class="container">
{}
        <footer>grove {}</footer>
    </div>
</body>
</html>"#,
        escape_html(title),
        body,
        escape_html(version)
    )
}

fn listing(entries: &[Link], query: &str) -> String {
    entries
        .iter()
        .map(|e| {
            format!(
                r#"            <li><a href="{}{}">{}</a></li>"#,
                escape_html(&e.url),
                escape_html(query),
                escape_html(&e.name)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn repo_heading(header: &RepoHeader) -> String {
    let short_sha: String = header.sha.chars().take(10).collect();
    format!(
        r#"        <h1>{}</h1>
        <div class="meta">
            branch <code>{}</code> at <code>{}</code> &middot; {} commits &middot; {} tags &middot;
            clone <code>{}</code>
        </div>"#,
        escape_html(&header.in_repo_path),
        escape_html(&header.branch),
        escape_html(&short_sha),
        header.commit_num,
        header.tag_num,
        escape_html(&header.clone_url())
    )
}

/// Filesystem directory outside any repository
pub fn directory_page(path: &str, entries: &[Link], version: &str) -> String {
    let body = format!(
        r#"        <h1>{}</h1>
        <div class="card">
            <ul class="listing">
{}
            </ul>
        </div>"#,
        escape_html(path),
        listing(entries, "")
    );
    layout(path, version, &body)
}

/// Repository front page: commit log and README
pub fn repo_page(header: &RepoHeader, logs: &[LogEntry], readme: Option<&str>) -> String {
    let commits = logs
        .iter()
        .map(|c| {
            let body = if c.body.is_empty() {
                String::new()
            } else {
                format!(r#"<div class="body">{}</div>"#, c.body)
            };
            format!(
                r#"            <div class="commit">
                <span class="author{}">{}</span> <span class="time">{}</span>
                <span class="sha">{}</span>
                <div class="subject">{}</div>{}
            </div>"#,
                c.classtype,
                escape_html(&c.author),
                escape_html(&c.time),
                escape_html(&c.sha),
                c.subject,
                body
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let readme = readme
        .map(|html| format!(r#"        <div class="card readme">{}</div>"#, html))
        .unwrap_or_default();

    let body = format!(
        r#"{}
        <div class="meta"><a href="{}tree/{}">browse files</a></div>
        <div class="card">
{}
        </div>
{}"#,
        repo_heading(header),
        escape_html(&header.url),
        escape_html(&header.query),
        commits,
        readme
    );
    layout(&header.in_repo_path, &header.version, &body)
}

/// Directory inside a repository tree
pub fn tree_page(header: &RepoHeader, entries: &[Link]) -> String {
    let body = format!(
        r#"{}
        <div class="card">
            <ul class="listing">
{}
            </ul>
        </div>"#,
        repo_heading(header),
        listing(entries, &header.query)
    );
    layout(&header.in_repo_path, &header.version, &body)
}

/// File inside a repository, with numbered lines or an inline image
pub fn file_page(header: &RepoHeader, file: &str, content: &[u8]) -> String {
    let shown = match inline_image_type(file) {
        Some(kind) => format!(
            r#"<img src="data:image/{};base64,{}"/>"#,
            kind,
            base64::engine::general_purpose::STANDARD.encode(content)
        ),
        None => {
            let (numbers, lines) = numbered_lines(&String::from_utf8_lossy(content));
            format!(
                r#"<div class="code"><div class="lines">{}</div><div>{}</div></div>"#,
                numbers, lines
            )
        }
    };

    let body = format!(
        r#"{}
        <div class="card">{}</div>"#,
        repo_heading(header),
        shown
    );
    layout(&header.in_repo_path, &header.version, &body)
}

/// Line-number anchors and escaped lines, one `<div id="L-n">` per line
fn numbered_lines(text: &str) -> (String, String) {
    let mut numbers = String::new();
    let mut lines = String::new();
    for (i, line) in text.split_inclusive('\n').enumerate() {
        let n = i + 1;
        numbers.push_str(&format!(
            "<a href=\"#L-{}\" class=\"line\">{}</a><br/>",
            n, n
        ));
        lines.push_str(&format!("<div id=\"L-{}\">{}</div>", n, escape_html(line)));
    }
    (numbers, lines)
}
