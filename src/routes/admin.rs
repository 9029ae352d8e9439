use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, put},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/users", get(commands::admin::list_users))
        .route(
            "/api/admin/online-users",
            get(commands::admin::online_users),
        )
        .route("/api/admin/users/:id/hold", put(commands::admin::hold_user))
        .route("/api/admin/summary", get(commands::admin::summary))
        .route("/api/admin/revenue", get(commands::admin::monthly_revenue))
}
