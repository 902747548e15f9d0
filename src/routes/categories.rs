use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::models::Category;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_categories))
}

/// Legend entry for the display collaborator.
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub name: Category,
    pub color: &'static str,
    pub default_duration_minutes: i64,
}

async fn list_categories(State(state): State<Arc<AppState>>) -> Json<Vec<CategoryResponse>> {
    let policy = state.normalizer.policy();
    let categories = Category::ALL
        .iter()
        .map(|&category| CategoryResponse {
            name: category,
            color: category.color(),
            default_duration_minutes: policy.duration_for(category).num_minutes(),
        })
        .collect();

    Json(categories)
}
