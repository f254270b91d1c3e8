//! Named selections — a flat-file CRUD resource alongside the canvas.
//!
//! A selection is a named rectangular region with its pixel contents,
//! persisted whole-file to one JSON document. Not on the mutation path.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use pixelhub_core::protocol::Rgba;

use crate::state::GatewayState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    /// Assigned by the server on save.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timestamp: String,
    pub bounds: Bounds,
    #[serde(default)]
    pub pixels: Vec<SelectionPixel>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bounds {
    #[serde(rename = "minX")]
    pub min_x: i32,
    #[serde(rename = "maxX")]
    pub max_x: i32,
    #[serde(rename = "minY")]
    pub min_y: i32,
    #[serde(rename = "maxY")]
    pub max_y: i32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionPixel {
    pub x: i32,
    pub y: i32,
    pub color: Rgba,
}

/// Whole-file JSON store; one writer at a time.
pub struct SelectionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl SelectionStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// Missing or corrupt files read as an empty list.
    pub fn list(&self) -> Vec<Selection> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(%e, path = %self.path.display(), "failed to read selections file");
                return Vec::new();
            }
        };
        serde_json::from_slice(&data).unwrap_or_else(|e| {
            warn!(%e, path = %self.path.display(), "corrupt selections file");
            Vec::new()
        })
    }

    pub fn get(&self, id: &str) -> Option<Selection> {
        self.list().into_iter().find(|s| s.id == id)
    }

    /// Persist a new selection under a server-assigned id; returns the id.
    pub async fn save(&self, mut selection: Selection) -> anyhow::Result<String> {
        let _guard = self.write_lock.lock().await;
        selection.id = format!(
            "selection_{}",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let mut all = self.list();
        let id = selection.id.clone();
        all.push(selection);
        self.persist(&all)?;
        Ok(id)
    }

    /// Remove by id; false when absent.
    pub async fn delete(&self, id: &str) -> anyhow::Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.list();
        let before = all.len();
        all.retain(|s| s.id != id);
        if all.len() == before {
            return Ok(false);
        }
        self.persist(&all)?;
        Ok(true)
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.persist(&[])
    }

    fn persist(&self, selections: &[Selection]) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(selections)?;
        std::fs::write(&self.path, json)?;
        debug!(count = selections.len(), "selections file saved");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectionQuery {
    pub id: Option<String>,
    pub action: Option<String>,
}

pub async fn get_handler(
    Query(query): Query<SelectionQuery>,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    match query.id {
        Some(id) => match state.selections.get(&id) {
            Some(selection) => Json(selection).into_response(),
            None => (StatusCode::NOT_FOUND, "Selection not found").into_response(),
        },
        None => Json(state.selections.list()).into_response(),
    }
}

pub async fn post_handler(
    State(state): State<Arc<GatewayState>>,
    Json(selection): Json<Selection>,
) -> Response {
    match state.selections.save(selection).await {
        Ok(id) => {
            info!(%id, "selection saved");
            Json(serde_json::json!({ "id": id })).into_response()
        }
        Err(e) => {
            warn!(%e, "failed to save selection");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn delete_handler(
    Query(query): Query<SelectionQuery>,
    State(state): State<Arc<GatewayState>>,
) -> Response {
    if query.action.as_deref() == Some("clear") {
        return match state.selections.clear().await {
            Ok(()) => {
                info!("all selections cleared");
                StatusCode::OK.into_response()
            }
            Err(e) => {
                warn!(%e, "failed to clear selections");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        };
    }

    match query.id {
        Some(id) => match state.selections.delete(&id).await {
            Ok(true) => {
                info!(%id, "selection deleted");
                Json(serde_json::json!({ "message": "Selection deleted", "id": id }))
                    .into_response()
            }
            Ok(false) => (StatusCode::NOT_FOUND, "Selection not found").into_response(),
            Err(e) => {
                warn!(%e, "failed to delete selection");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        None => (StatusCode::BAD_REQUEST, "Selection id required").into_response(),
    }
}
