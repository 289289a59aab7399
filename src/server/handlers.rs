use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, Method, Response, StatusCode, Uri},
    response::IntoResponse,
};
use grove_repo::{authorize_delegate, RequestPath, Status};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::git::{self, CgiRequest};
use super::router::{self, Page, PageRequest};
use super::Site;

impl IntoResponse for Page {
    fn into_response(self) -> axum::response::Response {
        match self {
            Page::Html(html) => (
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                html,
            )
                .into_response(),
            Page::Json(json) => ([(header::CONTENT_TYPE, "application/json")], json).into_response(),
            Page::Raw { content_type, body } => {
                ([(header::CONTENT_TYPE, content_type)], body).into_response()
            }
        }
    }
}

/// Plain-text body for a failed request. Never carries paths or detail.
pub fn error_response(status: Status) -> Response<Body> {
    let code = StatusCode::from_u16(status.http_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let text = format!(
        "{} - {}",
        code.as_u16(),
        code.canonical_reason().unwrap_or("Error")
    );
    (code, text).into_response()
}

/// GET /favicon.ico
pub async fn serve_icon(
    State(site): State<Arc<Site>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
) -> Response<Body> {
    let icon = site.resources.join("favicon.png");
    match tokio::fs::read(&icon).await {
        Ok(data) => ([(header::CONTENT_TYPE, "image/png")], data).into_response(),
        Err(e) => {
            warn!("Sending {} status 404 for /favicon.ico ({}: {})", remote, icon.display(), e);
            error_response(Status::NotFound)
        }
    }
}

/// Everything that isn't the favicon: git smart HTTP or a page view
pub async fn handle_web(
    State(site): State<Arc<Site>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response<Body> {
    let Some(path) = RequestPath::parse(uri.path()) else {
        warn!("Undecodable path {:?} from {}", uri.path(), remote);
        return error_response(Status::NotFound);
    };
    let query = uri.query().unwrap_or("").to_string();

    if let Some(git_dir) = path.git_delegate_dir(site.resolver.root()) {
        info!("Git request to {} from {}", path.to_url_path(), remote);
        let status = authorize_delegate(&site.resolver.gate(), &git_dir);
        if !status.is_ok() {
            warn!(
                "Git request of {} from {} denied: {:?}",
                path.to_url_path(),
                remote,
                status
            );
            return error_response(status);
        }
        return git::delegate(CgiRequest {
            project_root: site.resolver.root(),
            path_info: path.to_url_path(),
            query: &query,
            method: &method,
            headers: &headers,
            remote,
            body,
        })
        .await;
    }

    info!("View of {} from {}", path.to_url_path(), remote);

    let params = Query::<HashMap<String, String>>::try_from_uri(&uri)
        .map(|Query(params)| params)
        .unwrap_or_default();
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| site.addr.clone());
    let req = PageRequest {
        path,
        params,
        query,
        host,
    };

    let worker_site = site.clone();
    let worker_req = req.clone();
    let result =
        tokio::task::spawn_blocking(move || router::route(&worker_site, &worker_req)).await;

    match result {
        Ok(Ok(page)) => {
            debug!("Rendered {} for {}", req.path.to_url_path(), remote);
            page.into_response()
        }
        Ok(Err(status)) => {
            warn!(
                "Sending {} status {} for {}",
                remote,
                status.http_code(),
                req.path.to_url_path()
            );
            error_response(status)
        }
        Err(e) => {
            error!(
                "Render of {} for {} panicked: {}",
                req.path.to_url_path(),
                remote,
                e
            );
            error_response(Status::InternalError)
        }
    }
}
