use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post, put},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/requests",
            post(commands::requests::create_request).get(commands::requests::list_requests),
        )
        .route(
            "/api/requests/my-requests",
            get(commands::requests::my_requests),
        )
        .route(
            "/api/requests/agent-requests",
            get(commands::requests::agent_requests),
        )
        .route(
            "/api/requests/:id/status",
            put(commands::requests::update_status),
        )
        .route(
            "/api/requests/:id/payment-status",
            put(commands::requests::update_payment_status),
        )
        .route(
            "/api/requests/:id/assign",
            put(commands::requests::assign_request),
        )
        .route("/api/agents", get(commands::requests::list_agents))
        .route(
            "/api/recommenders",
            get(commands::requests::list_recommenders),
        )
}
