use std::sync::Arc;

use axum::Router;

use crate::AppState;

pub mod categories;
pub mod events;
pub mod health;

/// Everything mounted under `/api`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/events", events::router())
        .nest("/categories", categories::router())
}
