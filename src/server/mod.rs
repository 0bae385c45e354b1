//! Admin web server for crawl operations.
//!
//! Read-only JSON surface for operator triage: run history, error and
//! quarantine ledgers, site registry, checkpoints, and capture stats.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;

use crate::config::{Repositories, Settings};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            repos: settings.open_repositories()?,
        })
    }
}

/// Start the admin server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting admin server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
