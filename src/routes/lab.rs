use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, put},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/lab/tests", get(commands::lab::lab_tests))
        .route("/api/lab/analytics", get(commands::lab::lab_analytics))
        .route(
            "/api/lab/tests/:id/recommendation",
            put(commands::lab::submit_recommendation),
        )
}
