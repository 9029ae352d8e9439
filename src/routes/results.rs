use crate::commands;
use crate::state::AppState;
use axum::{routing::post, Router};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/soil-test-results/:id",
        post(commands::results::create_result).put(commands::results::update_result),
    )
}
