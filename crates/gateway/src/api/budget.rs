//! Budget introspection.
//!
//! - `GET /v1/budget`: the running day plus the retained history

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn get_budget(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.llm.budget().status())
}
