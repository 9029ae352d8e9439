use crate::state::AppState;
use axum::Router;

pub mod admin;
pub mod auth;
pub mod lab;
pub mod requests;
pub mod results;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(requests::router())
        .merge(results::router())
        .merge(lab::router())
        .merge(admin::router())
}
