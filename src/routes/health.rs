use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::EventStore;
use crate::AppState;

/// Liveness report. `events` is the size of the current store snapshot.
#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub version: &'static str,
    pub events: usize,
    pub checked_at: DateTime<Utc>,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        events: state.store.list_all().await.len(),
        checked_at: Utc::now(),
    })
}
