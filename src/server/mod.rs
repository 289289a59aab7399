mod git;
mod handlers;
mod mime;
mod router;
mod ui;

use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use grove_repo::{git_user, Dispatch, Gate, Resolver};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;

pub use handlers::error_response;

/// Largest request body accepted. Only `git-upload-pack` negotiation sends a
/// body; it grows with the number of refs and haves the client advertises.
pub const MAX_REQUEST_BODY: usize = 32 * 1024 * 1024;
pub use router::{route, Page, PageRequest};

/// Immutable per-server state shared by every request
#[derive(Debug)]
pub struct Site {
    pub resolver: Resolver,
    pub dispatch: Dispatch,
    /// Static resources (favicon)
    pub resources: PathBuf,
    /// Local git user, highlighted in commit logs
    pub owner: String,
    pub version: String,
    /// Listen address, used as the host when a request has none
    pub addr: String,
}

pub struct GroveServer {
    site: Site,
}

impl GroveServer {
    /// Serve `root`, which should be absolute and canonical
    pub fn new(config: &Config, root: PathBuf) -> Self {
        Self {
            site: Site {
                resolver: Resolver::new(root, Gate::new(config.access.threshold)),
                dispatch: config.access.dispatch,
                resources: config.server.resources.clone(),
                owner: git_user(),
                version: crate::VERSION.to_string(),
                addr: config.server.addr(),
            },
        }
    }

    pub fn with_owner(mut self, owner: String) -> Self {
        self.site.owner = owner;
        self
    }

    pub fn with_version(mut self, version: String) -> Self {
        self.site.version = version;
        self
    }

    pub async fn run(self) -> Result<()> {
        let addr = self.site.addr.clone();
        let root = self.site.resolver.root().display().to_string();

        let app = Router::new()
            .route("/favicon.ico", get(handlers::serve_icon))
            .fallback(handlers::handle_web)
            .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
            .with_state(Arc::new(self.site));

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("Serving {} on http://{}", root, addr);
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;

        Ok(())
    }

    pub fn addr(&self) -> &str {
        &self.site.addr
    }
}
