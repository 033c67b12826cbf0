use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::ingest::types::Announcement;
use crate::orchestrator::{Orchestrator, RefreshOutcome};
use crate::store::{self, KvStore};
use crate::stream::ConnectionStatus;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn KvStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/feed", get(feed))
        .route("/status", get(status))
        .route("/unseen", get(unseen))
        .route("/read/{id}", post(mark_read))
        .route("/refresh", post(refresh))
        .route("/prefs/sound", get(get_sound).post(set_sound))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn feed(State(state): State<AppState>) -> Json<Vec<Announcement>> {
    Json(state.orchestrator.snapshot())
}

#[derive(serde::Serialize)]
struct StatusResp {
    status: ConnectionStatus,
    collection_size: usize,
    unseen: usize,
}

async fn status(State(state): State<AppState>) -> Json<StatusResp> {
    Json(StatusResp {
        status: state.orchestrator.status(),
        collection_size: state.orchestrator.snapshot().len(),
        unseen: state.orchestrator.unseen_count(),
    })
}

#[derive(serde::Serialize)]
struct UnseenResp {
    unseen: usize,
}

async fn unseen(State(state): State<AppState>) -> Json<UnseenResp> {
    Json(UnseenResp {
        unseen: state.orchestrator.unseen_count(),
    })
}

#[derive(serde::Serialize)]
struct MarkReadResp {
    id: String,
    unseen: usize,
}

async fn mark_read(State(state): State<AppState>, Path(id): Path<String>) -> Json<MarkReadResp> {
    state.orchestrator.mark_read(&id);
    Json(MarkReadResp {
        id,
        unseen: state.orchestrator.unseen_count(),
    })
}

/// Explicit refresh, callable from any UI action. Bad dates are corrected to
/// the default window, never rejected.
async fn refresh(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<RefreshOutcome> {
    let outcome = state
        .orchestrator
        .refresh(
            q.get("start_date").map(String::as_str),
            q.get("end_date").map(String::as_str),
            q.get("category").map(String::as_str),
        )
        .await;
    Json(outcome)
}

#[derive(serde::Serialize, serde::Deserialize)]
struct SoundPref {
    enabled: bool,
}

async fn get_sound(State(state): State<AppState>) -> Json<SoundPref> {
    Json(SoundPref {
        enabled: store::sound_enabled(state.store.as_ref()),
    })
}

async fn set_sound(
    State(state): State<AppState>,
    Json(pref): Json<SoundPref>,
) -> Json<SoundPref> {
    if let Err(e) = store::set_sound_enabled(state.store.as_ref(), pref.enabled) {
        tracing::warn!(error = ?e, "persisting sound preference failed");
    }
    Json(pref)
}
