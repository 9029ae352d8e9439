use crate::db::{DbPool, SoilTestRequest, SoilTestResult, User};
use crate::error::{SarubimaError, SarubimaResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;
use crate::workflow::{self, CropsInput, LandUnit, PaymentMethod, PaymentStatus, RequestStatus};
use axum::extract::{Extension, Json, Path, Query, State};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};
use std::collections::HashMap;

/// Joined base query shared by every request view. Assignment columns come
/// flat off the user table so clients never need follow-up lookups.
pub(crate) const REQUEST_SELECT: &str = r#"
SELECT r.request_id, r.farmer_id, f.name AS farmer_name, r.phone, r.district, r.address,
       r.land_size, r.land_unit, r.preferred_date, r.preferred_time, r.crops,
       r.number_of_tests, r.total_cost, r.payment_method, r.payment_status, r.status,
       r.agent_id, a.name AS agent_name, a.employee_id AS agent_employee_id,
       r.recommender_id, l.name AS recommender_name, l.employee_id AS recommender_employee_id,
       r.created_at, r.updated_at
FROM soil_test_requests r
JOIN users f ON r.farmer_id = f.id
LEFT JOIN users a ON r.agent_id = a.id
LEFT JOIN users l ON r.recommender_id = l.id
"#;

pub fn parse_date_safe(date_str: &str) -> Option<NaiveDate> {
    if date_str.trim().is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date_str, "%Y%m%d"))
        .ok()
}

pub(crate) async fn fetch_request(pool: &DbPool, request_id: &str) -> SarubimaResult<SoilTestRequest> {
    let sql = format!("{} WHERE r.request_id = $1", REQUEST_SELECT);
    sqlx::query_as::<_, SoilTestRequest>(&sql)
        .bind(request_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SarubimaError::NotFound("Request not found".to_string()))
}

pub(crate) fn parse_stored_status(request: &SoilTestRequest) -> SarubimaResult<RequestStatus> {
    RequestStatus::parse(&request.status).ok_or_else(|| {
        SarubimaError::Internal(format!(
            "Request {} has unrecognized status '{}'",
            request.request_id, request.status
        ))
    })
}

pub(crate) fn parse_stored_payment(request: &SoilTestRequest) -> SarubimaResult<PaymentStatus> {
    PaymentStatus::parse(&request.payment_status).ok_or_else(|| {
        SarubimaError::Internal(format!(
            "Request {} has unrecognized payment status '{}'",
            request.request_id, request.payment_status
        ))
    })
}

/// A request plus its (optional) soil test result, the shape the farmer and
/// agent dashboards consume.
#[derive(Debug, Serialize)]
pub struct RequestWithResult {
    #[serde(flatten)]
    pub request: SoilTestRequest,
    #[serde(rename = "soilTestResult")]
    pub soil_test_result: Option<SoilTestResult>,
}

pub(crate) async fn attach_results(
    pool: &DbPool,
    requests: Vec<SoilTestRequest>,
) -> SarubimaResult<Vec<RequestWithResult>> {
    let ids: Vec<String> = requests.iter().map(|r| r.request_id.clone()).collect();
    let results = sqlx::query_as::<_, SoilTestResult>(
        "SELECT t.*, rb.name AS recommended_by_name
         FROM soil_test_results t
         LEFT JOIN users rb ON t.recommended_by = rb.id
         WHERE t.request_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_request: HashMap<String, SoilTestResult> = results
        .into_iter()
        .map(|r| (r.request_id.clone(), r))
        .collect();

    Ok(requests
        .into_iter()
        .map(|request| {
            let soil_test_result = by_request.remove(&request.request_id);
            RequestWithResult {
                request,
                soil_test_result,
            }
        })
        .collect())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestPayload {
    pub phone: String,
    pub preferred_date: String,
    pub preferred_time: String,
    pub district: String,
    pub address: String,
    pub land_size: Decimal,
    pub land_unit: String,
    #[serde(default)]
    pub crops: Option<CropsInput>,
    pub payment_method: String,
}

pub async fn create_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateRequestPayload>,
) -> SarubimaResult<Json<RequestWithResult>> {
    claims.require_role("Farmer")?;
    let request_id = create_request_internal(&state.pool, claims.user_id, payload).await?;
    let request = fetch_request(&state.pool, &request_id).await?;
    Ok(Json(RequestWithResult {
        request,
        soil_test_result: None,
    }))
}

pub async fn create_request_internal(
    pool: &DbPool,
    farmer_id: i32,
    payload: CreateRequestPayload,
) -> SarubimaResult<String> {
    if payload.phone.trim().is_empty() || payload.address.trim().is_empty() {
        return Err(SarubimaError::Validation(
            "Phone and address are required".to_string(),
        ));
    }
    if !workflow::is_known_district(&payload.district) {
        return Err(SarubimaError::Validation(format!(
            "Unknown district: {}",
            payload.district
        )));
    }
    if !workflow::is_known_time_period(&payload.preferred_time) {
        return Err(SarubimaError::Validation(format!(
            "Unknown collection time period: {}",
            payload.preferred_time
        )));
    }
    let preferred_date = parse_date_safe(&payload.preferred_date).ok_or_else(|| {
        SarubimaError::Validation(format!("Invalid date: {}", payload.preferred_date))
    })?;
    let land_unit = LandUnit::parse(&payload.land_unit).ok_or_else(|| {
        SarubimaError::Validation(format!("Unknown land unit: {}", payload.land_unit))
    })?;
    let payment_method = PaymentMethod::parse(&payload.payment_method).ok_or_else(|| {
        SarubimaError::Validation(format!(
            "Unknown payment method: {}",
            payload.payment_method
        ))
    })?;

    // The quote is always computed server-side from the land size
    let quote = workflow::quote_for_land(payload.land_size, land_unit);
    let payment_status = PaymentStatus::initial_for(payment_method);
    let crops = payload.crops.map(CropsInput::normalize).unwrap_or_default();

    let request_id = format!(
        "SR-{}",
        uuid::Uuid::new_v4().to_string()[..8].to_uppercase()
    );

    sqlx::query(
        "INSERT INTO soil_test_requests
            (request_id, farmer_id, phone, district, address, land_size, land_unit,
             preferred_date, preferred_time, crops, number_of_tests, total_cost,
             payment_method, payment_status, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
    )
    .bind(&request_id)
    .bind(farmer_id)
    .bind(payload.phone.trim())
    .bind(&payload.district)
    .bind(payload.address.trim())
    .bind(payload.land_size)
    .bind(land_unit.as_str())
    .bind(preferred_date)
    .bind(&payload.preferred_time)
    .bind(&crops)
    .bind(quote.number_of_tests)
    .bind(quote.total_cost)
    .bind(payment_method.as_str())
    .bind(payment_status.as_str())
    .bind(RequestStatus::Pending.as_str())
    .execute(pool)
    .await?;

    tracing::info!(
        "Created request {} for farmer {} ({} tests, LKR {})",
        request_id,
        farmer_id,
        quote.number_of_tests,
        quote.total_cost
    );
    Ok(request_id)
}

pub async fn my_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> SarubimaResult<Json<Vec<RequestWithResult>>> {
    claims.require_role("Farmer")?;
    let sql = format!(
        "{} WHERE r.farmer_id = $1 ORDER BY r.created_at DESC",
        REQUEST_SELECT
    );
    let requests = sqlx::query_as::<_, SoilTestRequest>(&sql)
        .bind(claims.user_id)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(attach_results(&state.pool, requests).await?))
}

/// The agent worklist: everything assigned to them plus unassigned requests
/// in their home district.
pub async fn agent_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> SarubimaResult<Json<Vec<RequestWithResult>>> {
    claims.require_role("Agent")?;
    let sql = format!(
        "{} WHERE (r.agent_id = $1 OR (r.agent_id IS NULL AND r.district = $2))
         ORDER BY r.created_at DESC",
        REQUEST_SELECT
    );
    let requests = sqlx::query_as::<_, SoilTestRequest>(&sql)
        .bind(claims.user_id)
        .bind(claims.district.as_deref().unwrap_or(""))
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(attach_results(&state.pool, requests).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestListQuery {
    pub status: Option<String>,
    pub district: Option<String>,
    pub search: Option<String>,
    pub month: Option<u32>,
    pub year: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Admin listing with data-layer filtering and pagination.
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<RequestListQuery>,
) -> SarubimaResult<Json<Vec<SoilTestRequest>>> {
    claims.require_admin()?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(REQUEST_SELECT);
    qb.push(" WHERE 1=1");

    if let Some(status) = query.status.as_deref().filter(|s| *s != "All") {
        qb.push(" AND r.status = ").push_bind(status.to_string());
    }
    if let Some(district) = query.district.as_deref().filter(|d| *d != "All") {
        qb.push(" AND r.district = ").push_bind(district.to_string());
    }
    if let Some(month) = query.month {
        qb.push(" AND EXTRACT(MONTH FROM r.created_at)::int = ")
            .push_bind(month as i32);
    }
    if let Some(year) = query.year {
        qb.push(" AND EXTRACT(YEAR FROM r.created_at)::int = ")
            .push_bind(year);
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (f.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.phone LIKE ")
            .push_bind(pattern.clone())
            .push(" OR r.request_id ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    let per_page = query.per_page.unwrap_or(50).clamp(1, 200);
    let page = query.page.unwrap_or(1).max(1);
    qb.push(" ORDER BY r.created_at DESC LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind((page - 1) * per_page);

    let requests = qb
        .build_query_as::<SoilTestRequest>()
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(requests))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdatePayload {
    pub status: String,
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<String>,
    Json(payload): Json<StatusUpdatePayload>,
) -> SarubimaResult<Json<Value>> {
    claims.require_admin()?;
    let target = RequestStatus::parse(&payload.status).ok_or_else(|| {
        SarubimaError::Validation(format!("Unknown status: {}", payload.status))
    })?;
    update_status_internal(&state.pool, &request_id, target).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn update_status_internal(
    pool: &DbPool,
    request_id: &str,
    target: RequestStatus,
) -> SarubimaResult<()> {
    let request = fetch_request(pool, request_id).await?;
    let current = parse_stored_status(&request)?;

    if !current.can_transition_to(target) {
        return Err(SarubimaError::Validation(format!(
            "Illegal status transition: {} -> {}",
            current, target
        )));
    }

    sqlx::query(
        "UPDATE soil_test_requests SET status = $1, updated_at = NOW() WHERE request_id = $2",
    )
    .bind(target.as_str())
    .bind(request_id)
    .execute(pool)
    .await?;

    tracing::info!("Request {} status {} -> {}", request_id, current, target);
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusUpdatePayload {
    pub payment_status: String,
}

/// Admins may override payment state within the table's rules; agents only
/// get the cash-collection transition.
pub async fn update_payment_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<String>,
    Json(payload): Json<PaymentStatusUpdatePayload>,
) -> SarubimaResult<Json<Value>> {
    let target = PaymentStatus::parse(&payload.payment_status).ok_or_else(|| {
        SarubimaError::Validation(format!(
            "Unknown payment status: {}",
            payload.payment_status
        ))
    })?;

    match claims.role.as_str() {
        "Admin" => admin_set_payment_internal(&state.pool, &request_id, target).await?,
        "Agent" => {
            if target != PaymentStatus::CompletedCoc {
                return Err(SarubimaError::Forbidden(
                    "Agents may only confirm cash collection".to_string(),
                ));
            }
            collect_cash_internal(&state.pool, claims.user_id, &request_id).await?;
        }
        _ => {
            return Err(SarubimaError::Forbidden(
                "Administrator or Agent authority required".to_string(),
            ))
        }
    }

    Ok(Json(json!({ "success": true })))
}

pub async fn admin_set_payment_internal(
    pool: &DbPool,
    request_id: &str,
    target: PaymentStatus,
) -> SarubimaResult<()> {
    let request = fetch_request(pool, request_id).await?;
    let current = parse_stored_payment(&request)?;

    if !PaymentStatus::admin_can_set(current, target) {
        return Err(SarubimaError::Validation(format!(
            "Illegal payment transition: {} -> {}",
            current, target
        )));
    }

    sqlx::query(
        "UPDATE soil_test_requests SET payment_status = $1, updated_at = NOW() WHERE request_id = $2",
    )
    .bind(target.as_str())
    .bind(request_id)
    .execute(pool)
    .await?;

    tracing::info!("Request {} payment {} -> {}", request_id, current, target);
    Ok(())
}

/// The "Collect Cash" action at sample pickup.
pub async fn collect_cash_internal(
    pool: &DbPool,
    agent_id: i32,
    request_id: &str,
) -> SarubimaResult<()> {
    let request = fetch_request(pool, request_id).await?;
    ensure_agent_scope(pool, agent_id, &request).await?;

    let current = parse_stored_payment(&request)?;
    if !PaymentStatus::agent_can_set(current, PaymentStatus::CompletedCoc) {
        return Err(SarubimaError::Validation(format!(
            "Cash collection is only possible while payment is COCPending (currently {})",
            current
        )));
    }

    sqlx::query(
        "UPDATE soil_test_requests SET payment_status = $1, updated_at = NOW() WHERE request_id = $2",
    )
    .bind(PaymentStatus::CompletedCoc.as_str())
    .bind(request_id)
    .execute(pool)
    .await?;

    tracing::info!("Agent {} collected cash for request {}", agent_id, request_id);
    Ok(())
}

/// Agents may act on requests assigned to them, or unassigned ones in their
/// own district. The district comes from the user row, not the token.
pub(crate) async fn ensure_agent_scope(
    pool: &DbPool,
    agent_id: i32,
    request: &SoilTestRequest,
) -> SarubimaResult<()> {
    if request.agent_id == Some(agent_id) {
        return Ok(());
    }

    let agent = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(agent_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SarubimaError::NotFound("Agent not found".to_string()))?;

    if !agent.is_active {
        return Err(SarubimaError::Forbidden(
            "Account is on hold. Please contact the administrator.".to_string(),
        ));
    }
    if request.agent_id.is_none() && agent.district.as_deref() == Some(request.district.as_str()) {
        return Ok(());
    }

    Err(SarubimaError::Forbidden(
        "This request is outside your district or assigned to another agent".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentPayload {
    pub soil_collector_id: Option<i32>,
    pub crop_recommender_id: Option<i32>,
}

pub async fn assign_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<String>,
    Json(payload): Json<AssignmentPayload>,
) -> SarubimaResult<Json<Value>> {
    claims.require_admin()?;
    assign_internal(
        &state.pool,
        &request_id,
        payload.soil_collector_id,
        payload.crop_recommender_id,
    )
    .await?;
    Ok(Json(json!({ "success": true })))
}

/// Direct overwrite of both assignment slots; no double-booking checks.
pub async fn assign_internal(
    pool: &DbPool,
    request_id: &str,
    soil_collector_id: Option<i32>,
    crop_recommender_id: Option<i32>,
) -> SarubimaResult<()> {
    let request = fetch_request(pool, request_id).await?;
    let current = parse_stored_status(&request)?;
    if current.is_terminal() {
        return Err(SarubimaError::Validation(format!(
            "Cannot assign staff to a {} request",
            current
        )));
    }

    if let Some(id) = soil_collector_id {
        ensure_assignable(pool, id, "Agent").await?;
    }
    if let Some(id) = crop_recommender_id {
        ensure_assignable(pool, id, "Lab").await?;
    }

    sqlx::query(
        "UPDATE soil_test_requests SET agent_id = $1, recommender_id = $2, updated_at = NOW()
         WHERE request_id = $3",
    )
    .bind(soil_collector_id)
    .bind(crop_recommender_id)
    .bind(request_id)
    .execute(pool)
    .await?;

    tracing::info!(
        "Request {} assigned collector {:?} / recommender {:?}",
        request_id,
        soil_collector_id,
        crop_recommender_id
    );
    Ok(())
}

async fn ensure_assignable(pool: &DbPool, user_id: i32, role: &str) -> SarubimaResult<()> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SarubimaError::NotFound(format!("{} {} not found", role, user_id)))?;

    if user.role != role {
        return Err(SarubimaError::Validation(format!(
            "User {} is not a {}",
            user.name, role
        )));
    }
    if !user.is_active {
        return Err(SarubimaError::Validation(format!(
            "{} {} is on hold and cannot be assigned",
            role, user.name
        )));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CandidateQuery {
    pub district: Option<String>,
}

pub async fn list_agents(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<CandidateQuery>,
) -> SarubimaResult<Json<Vec<User>>> {
    claims.require_admin()?;
    Ok(Json(
        list_candidates(&state.pool, "Agent", query.district).await?,
    ))
}

pub async fn list_recommenders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<CandidateQuery>,
) -> SarubimaResult<Json<Vec<User>>> {
    claims.require_admin()?;
    Ok(Json(
        list_candidates(&state.pool, "Lab", query.district).await?,
    ))
}

/// Active staff of one role, optionally narrowed to a district.
pub(crate) async fn list_candidates(
    pool: &DbPool,
    role: &str,
    district: Option<String>,
) -> SarubimaResult<Vec<User>> {
    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT id, name, email, NULL AS password_hash, role, phone, district, address, nic,
                employee_id, registration_no, is_active, last_active, created_at, updated_at
         FROM users WHERE is_active = TRUE AND role = ",
    );
    qb.push_bind(role.to_string());
    if let Some(district) = district.filter(|d| d != "All" && !d.is_empty()) {
        qb.push(" AND district = ").push_bind(district);
    }
    qb.push(" ORDER BY name ASC");

    Ok(qb.build_query_as::<User>().fetch_all(pool).await?)
}
