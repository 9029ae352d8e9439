use crate::db::{DbPool, MonthlyRevenueRow, RequestSummary, RevenueTotals, User, UserSummary};
use crate::error::{SarubimaError, SarubimaResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;
use axum::extract::{Extension, Json, Path, Query, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};

const USER_COLUMNS: &str =
    "id, name, email, NULL AS password_hash, role, phone, district, address, nic,
     employee_id, registration_no, is_active, last_active, created_at, updated_at";

/// A user is considered online while their last authenticated request is
/// within this window. The dashboards poll this view every 30 seconds.
const ONLINE_WINDOW_MINUTES: i32 = 5;

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<UserListQuery>,
) -> SarubimaResult<Json<Vec<User>>> {
    claims.require_admin()?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {} FROM users WHERE 1=1", USER_COLUMNS));

    if let Some(role) = query.role.as_deref().filter(|r| *r != "All") {
        qb.push(" AND role = ").push_bind(role.to_string());
    }
    match query.status.as_deref() {
        Some("Active") => {
            qb.push(" AND is_active = TRUE");
        }
        Some("Hold") => {
            qb.push(" AND is_active = FALSE");
        }
        _ => {}
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR nic LIKE ")
            .push_bind(pattern.clone())
            .push(" OR registration_no LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb.push(" ORDER BY created_at DESC");

    let users = qb.build_query_as::<User>().fetch_all(&state.pool).await?;
    Ok(Json(users))
}

pub async fn online_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> SarubimaResult<Json<Vec<User>>> {
    claims.require_admin()?;

    let sql = format!(
        "SELECT {} FROM users
         WHERE is_active = TRUE
           AND last_active >= NOW() - ($1 || ' minutes')::interval
         ORDER BY last_active DESC",
        USER_COLUMNS
    );
    let users = sqlx::query_as::<_, User>(&sql)
        .bind(ONLINE_WINDOW_MINUTES.to_string())
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldPayload {
    pub is_active: bool,
}

pub async fn hold_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i32>,
    Json(payload): Json<HoldPayload>,
) -> SarubimaResult<Json<Value>> {
    claims.require_admin()?;
    set_user_hold_internal(&state.pool, user_id, payload.is_active).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn set_user_hold_internal(
    pool: &DbPool,
    user_id: i32,
    is_active: bool,
) -> SarubimaResult<()> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SarubimaError::NotFound("User not found".to_string()))?;

    if user.role == "Admin" {
        return Err(SarubimaError::Validation(
            "Cannot place an administrator account on hold".to_string(),
        ));
    }

    sqlx::query("UPDATE users SET is_active = $1, updated_at = NOW() WHERE id = $2")
        .bind(is_active)
        .bind(user_id)
        .execute(pool)
        .await?;

    tracing::info!(
        "User {} ({}) {}",
        user.name,
        user.email,
        if is_active { "re-activated" } else { "placed on hold" }
    );
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSummary {
    pub requests: RequestSummary,
    pub users: UserSummary,
}

pub async fn summary(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> SarubimaResult<Json<AdminSummary>> {
    claims.require_admin()?;

    let requests = sqlx::query_as::<_, RequestSummary>(
        "SELECT COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'Pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'Scheduled') AS scheduled,
                COUNT(*) FILTER (WHERE status = 'Sample Collected') AS sample_collected,
                COUNT(*) FILTER (WHERE status = 'In Progress') AS in_progress,
                COUNT(*) FILTER (WHERE status = 'Completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'Cancelled') AS cancelled
         FROM soil_test_requests",
    )
    .fetch_one(&state.pool)
    .await?;

    let users = sqlx::query_as::<_, UserSummary>(
        "SELECT COUNT(*) AS total_users,
                COUNT(*) FILTER (WHERE role = 'Farmer') AS farmers,
                COUNT(*) FILTER (WHERE role = 'Agent') AS agents,
                COUNT(*) FILTER (WHERE role = 'Lab') AS lab_staff,
                COUNT(*) FILTER (WHERE NOT is_active) AS held_users
         FROM users",
    )
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(AdminSummary { requests, users }))
}

#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
    /// Month in `YYYY-MM` form; defaults to the current month.
    pub month: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub month: String,
    #[serde(flatten)]
    pub totals: RevenueTotals,
    pub history: Vec<MonthlyRevenueRow>,
}

/// Monthly revenue rollup. Revenue counts requests whose payment settled
/// (`Paid` or `CompletedCOC`); everything still open counts as pending.
pub async fn monthly_revenue(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RevenueQuery>,
) -> SarubimaResult<Json<RevenueReport>> {
    claims.require_admin()?;

    let month = match query.month {
        Some(month) => {
            if chrono::NaiveDate::parse_from_str(&format!("{}-01", month), "%Y-%m-%d").is_err() {
                return Err(SarubimaError::Validation(format!(
                    "Invalid month (expected YYYY-MM): {}",
                    month
                )));
            }
            month
        }
        None => chrono::Utc::now().format("%Y-%m").to_string(),
    };

    let totals = sqlx::query_as::<_, RevenueTotals>(
        "SELECT
            COALESCE(SUM(total_cost) FILTER (WHERE payment_status IN ('Paid', 'CompletedCOC')), 0) AS total_revenue,
            COUNT(*) FILTER (WHERE status = 'Completed') AS completed_tests,
            COALESCE(SUM(total_cost) FILTER (WHERE payment_status IN ('Pending', 'COCPending')), 0) AS pending_payments,
            COALESCE(SUM(total_cost) FILTER (WHERE payment_method = 'cash' AND payment_status IN ('Paid', 'CompletedCOC')), 0) AS cash_payments,
            COALESCE(SUM(total_cost) FILTER (WHERE payment_method = 'card' AND payment_status IN ('Paid', 'CompletedCOC')), 0) AS card_payments
         FROM soil_test_requests
         WHERE TO_CHAR(created_at, 'YYYY-MM') = $1",
    )
    .bind(&month)
    .fetch_one(&state.pool)
    .await?;

    let history = sqlx::query_as::<_, MonthlyRevenueRow>(
        r#"
        WITH months AS (
            SELECT TO_CHAR(CURRENT_DATE - (i || ' month')::interval, 'YYYY-MM') AS month
            FROM generate_series(0, 5) i
        )
        SELECT
            m.month,
            COALESCE(SUM(r.total_cost) FILTER (WHERE r.payment_status IN ('Paid', 'CompletedCOC')), 0) AS total_revenue,
            COUNT(r.request_id) FILTER (WHERE r.status = 'Completed') AS completed_tests,
            COALESCE(SUM(r.total_cost) FILTER (WHERE r.payment_status IN ('Pending', 'COCPending')), 0) AS pending_payments
        FROM months m
        LEFT JOIN soil_test_requests r ON TO_CHAR(r.created_at, 'YYYY-MM') = m.month
        GROUP BY m.month
        ORDER BY m.month ASC
        "#,
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(RevenueReport {
        month,
        totals,
        history,
    }))
}
