use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{Category, Event};
use crate::store::EventStore;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_events).post(create_event))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[serde(default, alias = "request_text")]
    pub request_text: String,
    /// Unknown or missing names resolve to `other`.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub category: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Normalize a natural-language request into an event and store it.
///
/// The store is only touched after normalization succeeded, so a failed
/// submission never leaves a partial event behind.
async fn create_event(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Event>)> {
    let Json(body) = payload?;
    let category = Category::from_label(body.category.as_deref());

    let event = match state.normalizer.normalize(&body.request_text, category).await {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(category = %category, "Event submission failed: {}", e);
            return Err(e.into());
        }
    };

    state.store.append(event.clone()).await;
    tracing::info!(
        event_id = %event.id(),
        category = %event.category(),
        "Created event"
    );

    Ok((StatusCode::CREATED, Json(event)))
}

/// Every stored event in insertion order, optionally narrowed to one category.
async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListEventsQuery>,
) -> AppResult<Json<Vec<Event>>> {
    let filter = match query.category.as_deref() {
        None | Some("") | Some("all") => None,
        Some(name) => Some(
            Category::from_str(name)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown category: {}", name)))?,
        ),
    };

    let mut events = state.store.list_all().await;
    if let Some(category) = filter {
        events.retain(|e| e.category() == category);
    }

    Ok(Json(events))
}
