//! Snapshot sharing endpoint
//!
//! Stores opaque studio snapshots under generated ids so they can be opened
//! again from a share link. Storage is in memory; nothing survives a restart.

mod error;
mod store;

pub use error::ShareError;
pub use store::{MemoryStore, NewSnapshot, Snapshot, SnapshotStore};

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state for the share server
#[derive(Clone)]
pub struct ShareState {
    store: Arc<dyn SnapshotStore>,
}

impl ShareState {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// State backed by a fresh [`MemoryStore`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

/// Create share server router
pub fn create_router(state: ShareState) -> Router {
    Router::new()
        .route("/api/share", post(create_snapshot))
        .route("/api/share/:id", get(get_snapshot))
        .route("/health", get(health))
        .with_state(state)
}

/// Start share server
pub async fn start_server(listener: tokio::net::TcpListener, state: ShareState) -> Result<()> {
    let app = create_router(state);

    let bind_addr = listener
        .local_addr()
        .context("Failed to obtain share server bind address")?;
    info!("Starting share server on {}", bind_addr);

    axum::serve(listener, app)
        .await
        .context("Share server error")?;

    Ok(())
}

/// Handle POST /api/share
async fn create_snapshot(
    State(state): State<ShareState>,
    headers: HeaderMap,
    payload: std::result::Result<Json<NewSnapshot>, JsonRejection>,
) -> std::result::Result<Json<Value>, ShareError> {
    let snapshot = match payload {
        Ok(Json(snapshot)) if snapshot.is_valid() => snapshot,
        Ok(_) => return Err(ShareError::InvalidData),
        Err(rejection) => {
            warn!(error = %rejection, "Rejected share request");
            return Err(ShareError::InvalidData);
        }
    };

    let stored = state
        .store
        .create(snapshot)
        .await
        .map_err(ShareError::Storage)?;

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let url = format!("http://{}/share/{}", host, stored.id);
    info!(id = %stored.id, tool = %stored.tool, "Snapshot shared");

    Ok(Json(json!({ "success": true, "id": stored.id, "url": url })))
}

/// Handle GET /api/share/:id
async fn get_snapshot(
    State(state): State<ShareState>,
    Path(id): Path<String>,
) -> std::result::Result<Json<Value>, ShareError> {
    debug!(%id, "Snapshot lookup");
    let snapshot = state
        .store
        .get(&id)
        .await
        .map_err(ShareError::Storage)?
        .ok_or(ShareError::NotFound)?;

    Ok(Json(json!({ "success": true, "snapshot": snapshot })))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "version": env!("CARGO_PKG_VERSION") }))
}
