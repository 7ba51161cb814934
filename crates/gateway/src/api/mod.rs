pub mod auth;
pub mod budget;
pub mod conversations;
pub mod events;
pub mod health;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the bearer-token middleware).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health::health));

    let protected = Router::new()
        // Chat platform connector contract
        .route("/v1/events", post(events::handle_event))
        // Introspection
        .route("/v1/budget", get(budget::get_budget))
        .route("/v1/conversations", get(conversations::list_conversations))
        .route_layer(middleware::from_fn_with_state(
            state,
            auth::require_api_token,
        ));

    public.merge(protected)
}
