//! Chat platform contract: the connector posts one [`InboundEvent`] per
//! platform event and performs the returned actions in order.
//!
//! `POST /v1/events` runs the turn on its own task and answers when it
//! ends; a dropped connection does not cancel it. Model and
//! backend failures degrade inside the turn, so a well-formed event always
//! gets a `200` with a possibly empty action list.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use tracing::Instrument;

use crate::runtime::{InboundEvent, OutboundAction};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub channel_id: String,
    pub actions: Vec<OutboundAction>,
}

pub async fn handle_event(
    State(state): State<AppState>,
    Json(event): Json<InboundEvent>,
) -> Response {
    let channel_id = event.channel_id().to_owned();
    let span = tracing::info_span!("event", channel_id = %channel_id, kind = event.kind());

    match state.orchestrator.spawn_event(event).instrument(span).await {
        Ok(actions) => Json(EventResponse {
            channel_id,
            actions,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(channel_id = %channel_id, error = %e, "event handling failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
