use crate::commands;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/login", post(commands::auth::login))
        .route(
            "/api/auth/farmers/register",
            post(commands::auth::register_farmer),
        )
        .route(
            "/api/auth/agents/register",
            post(commands::auth::register_agent),
        )
        .route(
            "/api/auth/labs/register",
            post(commands::auth::register_lab),
        )
}
