use crate::commands::requests::{
    ensure_agent_scope, fetch_request, parse_stored_payment, parse_stored_status,
};
use crate::db::{DbPool, SoilTestResult};
use crate::error::{SarubimaError, SarubimaResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;
use crate::workflow::{PaymentStatus, RequestStatus};
use axum::extract::{Extension, Json, Path, State};
use serde::Deserialize;
use serde_json::{json, Value};

pub const SUNLIGHT_LEVELS: [&str; 4] = ["Full Sun", "Partial Sun", "Partial Shade", "Full Shade"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoilTestSubmission {
    pub ph: f64,
    pub sunlight: String,
    pub moisture: f64,
    pub soil_moisture: f64,
    pub conductivity: f64,
    pub woil: f64,
    pub other: Option<String>,
    /// Confirms the agent collected the cash payment alongside this
    /// submission. Required while the request is COCPending.
    #[serde(default)]
    pub collect_cash: bool,
}

impl SoilTestSubmission {
    fn validate(&self) -> SarubimaResult<()> {
        if !(0.0..=14.0).contains(&self.ph) {
            return Err(SarubimaError::Validation(
                "pH must be between 0 and 14".to_string(),
            ));
        }
        if !SUNLIGHT_LEVELS.contains(&self.sunlight.as_str()) {
            return Err(SarubimaError::Validation(format!(
                "Unknown sunlight level: {}",
                self.sunlight
            )));
        }
        if !(0.0..=100.0).contains(&self.moisture) || !(0.0..=100.0).contains(&self.soil_moisture) {
            return Err(SarubimaError::Validation(
                "Moisture percentages must be between 0 and 100".to_string(),
            ));
        }
        if self.conductivity < 0.0 || self.woil < 0.0 {
            return Err(SarubimaError::Validation(
                "Conductivity and WOIL readings cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn create_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<String>,
    Json(payload): Json<SoilTestSubmission>,
) -> SarubimaResult<Json<Value>> {
    claims.require_role("Agent")?;
    submit_result_internal(&state.pool, claims.user_id, &request_id, payload, false).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn update_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<String>,
    Json(payload): Json<SoilTestSubmission>,
) -> SarubimaResult<Json<Value>> {
    claims.require_role("Agent")?;
    submit_result_internal(&state.pool, claims.user_id, &request_id, payload, true).await?;
    Ok(Json(json!({ "success": true })))
}

/// Store the field measurements for a request. Creation also advances the
/// request to `Sample Collected`, and the cash-on-collection gate holds in
/// both directions: nothing is written while payment is still `COCPending`
/// unless the submission confirms the collection, in which case the payment
/// transition and the result land in one transaction.
pub async fn submit_result_internal(
    pool: &DbPool,
    agent_id: i32,
    request_id: &str,
    payload: SoilTestSubmission,
    is_update: bool,
) -> SarubimaResult<()> {
    payload.validate()?;

    let request = fetch_request(pool, request_id).await?;
    ensure_agent_scope(pool, agent_id, &request).await?;

    let status = parse_stored_status(&request)?;
    let payment = parse_stored_payment(&request)?;

    let existing: Option<(String,)> =
        sqlx::query_as("SELECT request_id FROM soil_test_results WHERE request_id = $1")
            .bind(request_id)
            .fetch_optional(pool)
            .await?;

    if is_update {
        if existing.is_none() {
            return Err(SarubimaError::NotFound(
                "No soil test result recorded for this request".to_string(),
            ));
        }
        if status.is_terminal() {
            return Err(SarubimaError::Validation(format!(
                "Cannot amend results for a {} request",
                status
            )));
        }
    } else {
        if existing.is_some() {
            return Err(SarubimaError::Validation(
                "A soil test result has already been recorded for this request".to_string(),
            ));
        }
        if !status.can_transition_to(RequestStatus::SampleCollected) {
            return Err(SarubimaError::Validation(format!(
                "Cannot record a soil test for a {} request",
                status
            )));
        }
    }

    let collect_cash = payment == PaymentStatus::CocPending;
    if collect_cash && !payload.collect_cash {
        return Err(SarubimaError::Validation(
            "Cash payment must be collected before submitting the soil test".to_string(),
        ));
    }

    let mut tx = pool.begin().await?;

    if is_update {
        sqlx::query(
            "UPDATE soil_test_results
             SET ph = $1, sunlight = $2, moisture = $3, soil_moisture = $4,
                 conductivity = $5, woil = $6, other = $7, updated_at = NOW()
             WHERE request_id = $8",
        )
        .bind(payload.ph)
        .bind(&payload.sunlight)
        .bind(payload.moisture)
        .bind(payload.soil_moisture)
        .bind(payload.conductivity)
        .bind(payload.woil)
        .bind(&payload.other)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;
    } else {
        sqlx::query(
            "INSERT INTO soil_test_results
                (request_id, ph, sunlight, moisture, soil_moisture, conductivity, woil, other)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(request_id)
        .bind(payload.ph)
        .bind(&payload.sunlight)
        .bind(payload.moisture)
        .bind(payload.soil_moisture)
        .bind(payload.conductivity)
        .bind(payload.woil)
        .bind(&payload.other)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE soil_test_requests
             SET status = $1, agent_id = COALESCE(agent_id, $2), updated_at = NOW()
             WHERE request_id = $3",
        )
        .bind(RequestStatus::SampleCollected.as_str())
        .bind(agent_id)
        .bind(request_id)
        .execute(&mut *tx)
        .await?;
    }

    if collect_cash {
        sqlx::query(
            "UPDATE soil_test_requests SET payment_status = $1, updated_at = NOW()
             WHERE request_id = $2",
        )
        .bind(PaymentStatus::CompletedCoc.as_str())
        .bind(request_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Agent {} {} soil test for request {}",
        agent_id,
        if is_update { "amended" } else { "recorded" },
        request_id
    );
    Ok(())
}

pub(crate) async fn fetch_result(
    pool: &DbPool,
    request_id: &str,
) -> SarubimaResult<SoilTestResult> {
    sqlx::query_as::<_, SoilTestResult>(
        "SELECT t.*, rb.name AS recommended_by_name
         FROM soil_test_results t
         LEFT JOIN users rb ON t.recommended_by = rb.id
         WHERE t.request_id = $1",
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| {
        SarubimaError::NotFound("No soil test result recorded for this request".to_string())
    })
}
