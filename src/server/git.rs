//! Git smart HTTP delegate
//!
//! Requests under `<repo>/.git/` are handed to `git http-backend` as a CGI
//! program once the repository directory has passed the permission gate.
//! The backend does its own protocol handling; this module only translates
//! between HTTP and CGI.

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};

/// One request for the backend
pub struct CgiRequest<'a> {
    /// Serving root, exported as `GIT_PROJECT_ROOT`
    pub project_root: &'a Path,
    /// Normalised URL path below the root
    pub path_info: String,
    pub query: &'a str,
    pub method: &'a Method,
    pub headers: &'a HeaderMap,
    pub remote: SocketAddr,
    pub body: Bytes,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CgiError {
    #[error("CGI response has no header terminator")]
    MissingHeaderEnd,
    #[error("invalid CGI header line: {0}")]
    BadHeader(String),
    #[error("invalid CGI status: {0}")]
    BadStatus(String),
}

/// Parsed CGI output
#[derive(Debug)]
pub struct CgiResponse {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Vec<u8>,
}

/// Run `git http-backend` for one request
pub async fn delegate(req: CgiRequest<'_>) -> Response {
    match run_backend(req).await {
        Ok(cgi) => {
            let mut response = Response::new(Body::from(cgi.body));
            *response.status_mut() = cgi.status;
            let headers = response.headers_mut();
            for (name, value) in cgi.headers {
                headers.append(name, value);
            }
            response
        }
        Err(e) => {
            error!("git http-backend failed: {:#}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "500 - Internal Server Error").into_response()
        }
    }
}

async fn run_backend(req: CgiRequest<'_>) -> anyhow::Result<CgiResponse> {
    let header_str = |name: HeaderName| {
        req.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string()
    };
    let content_length = if req.body.is_empty() {
        header_str(header::CONTENT_LENGTH)
    } else {
        req.body.len().to_string()
    };
    let git_protocol = req
        .headers
        .get("git-protocol")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    debug!("git http-backend {} {}", req.method, req.path_info);

    let mut child = Command::new("git")
        .arg("http-backend")
        .env("GIT_PROJECT_ROOT", req.project_root)
        .env("GIT_HTTP_EXPORT_ALL", "1")
        .env("GATEWAY_INTERFACE", "CGI/1.1")
        .env("SERVER_PROTOCOL", "HTTP/1.1")
        .env("PATH_INFO", &req.path_info)
        .env("QUERY_STRING", req.query)
        .env("REQUEST_METHOD", req.method.as_str())
        .env("CONTENT_TYPE", header_str(header::CONTENT_TYPE))
        .env("CONTENT_LENGTH", content_length)
        .env("HTTP_CONTENT_ENCODING", header_str(header::CONTENT_ENCODING))
        .env("HTTP_GIT_PROTOCOL", git_protocol)
        .env("REMOTE_ADDR", req.remote.ip().to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    // feed stdin concurrently so a large response can't block on a full pipe
    let writer = child.stdin.take().map(|mut stdin| {
        let body = req.body.clone();
        tokio::spawn(async move {
            let result = stdin.write_all(&body).await;
            drop(stdin);
            result
        })
    });

    let output = child.wait_with_output().await?;
    if let Some(writer) = writer {
        if let Err(e) = writer.await? {
            debug!("git http-backend closed stdin early: {}", e);
        }
    }

    if !output.stderr.is_empty() {
        debug!(
            "git http-backend stderr: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    if output.stdout.is_empty() && !output.status.success() {
        anyhow::bail!("exited with {}", output.status);
    }

    Ok(parse_cgi_response(&output.stdout)?)
}

/// Split CGI output into status, headers and body.
///
/// Headers end at the first blank line (CRLF or bare LF). A `Status:` header
/// sets the response code; without one the response is 200.
pub fn parse_cgi_response(raw: &[u8]) -> Result<CgiResponse, CgiError> {
    let (head, body) = split_head(raw).ok_or(CgiError::MissingHeaderEnd)?;
    let head = String::from_utf8_lossy(head);

    let mut status = StatusCode::OK;
    let mut headers = Vec::new();
    for line in head.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| CgiError::BadHeader(line.to_string()))?;
        let value = value.trim();

        if name.eq_ignore_ascii_case("status") {
            let code = value.split_whitespace().next().unwrap_or("");
            status = code
                .parse::<u16>()
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok())
                .ok_or_else(|| CgiError::BadStatus(value.to_string()))?;
            continue;
        }

        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| CgiError::BadHeader(line.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| CgiError::BadHeader(line.to_string()))?;
        headers.push((name, value));
    }

    Ok(CgiResponse {
        status,
        headers,
        body: body.to_vec(),
    })
}

fn split_head(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    let crlf = raw.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    let lf = raw.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let (end, len) = match (crlf, lf) {
        (Some(a), Some(b)) => {
            if a.0 <= b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    Some((&raw[..end], &raw[end + len..]))
}
