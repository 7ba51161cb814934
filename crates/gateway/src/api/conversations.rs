use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

/// `GET /v1/conversations`: summaries of every active conversation.
pub async fn list_conversations(State(state): State<AppState>) -> impl IntoResponse {
    let conversations = state.conversations.summaries();
    Json(serde_json::json!({
        "count": conversations.len(),
        "conversations": conversations,
        "escalated": state.conversations.escalated_channels().len(),
    }))
}
