use crate::commands::requests::{fetch_request, parse_stored_status};
use crate::commands::results::fetch_result;
use crate::db::{DbPool, DistrictTestCount, LabTest};
use crate::error::{SarubimaError, SarubimaResult};
use crate::middleware::auth::Claims;
use crate::state::AppState;
use crate::workflow::{CropsInput, RequestStatus};
use axum::extract::{Extension, Json, Path, State};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const LAB_TEST_SELECT: &str = r#"
SELECT r.request_id, r.district, r.status, f.name AS farmer_name, a.name AS agent_name,
       r.created_at,
       t.ph, t.sunlight, t.moisture, t.soil_moisture, t.conductivity, t.woil, t.other,
       t.recommended_crops, rb.name AS recommended_by_name, t.recommended_at, t.notes
FROM soil_test_requests r
JOIN soil_test_results t ON t.request_id = r.request_id
JOIN users f ON r.farmer_id = f.id
LEFT JOIN users a ON r.agent_id = a.id
LEFT JOIN users rb ON t.recommended_by = rb.id
"#;

/// The lab worklist: collected samples awaiting a recommendation plus the
/// already-completed ones.
pub async fn lab_tests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> SarubimaResult<Json<Vec<LabTest>>> {
    claims.require_role("Lab")?;
    let sql = format!(
        "{} WHERE r.status IN ('Sample Collected', 'Completed') ORDER BY r.created_at DESC",
        LAB_TEST_SELECT
    );
    let tests = sqlx::query_as::<_, LabTest>(&sql)
        .fetch_all(&state.pool)
        .await?;
    Ok(Json(tests))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabAnalytics {
    pub total_tests: i64,
    pub completed_tests: i64,
    pub pending_tests: i64,
    pub tests_by_district: Vec<DistrictTestCount>,
}

pub async fn lab_analytics(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> SarubimaResult<Json<LabAnalytics>> {
    claims.require_role("Lab")?;

    let (total_tests, completed_tests, pending_tests): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COUNT(*) FILTER (WHERE status = 'Completed'),
                COUNT(*) FILTER (WHERE status = 'Sample Collected')
         FROM soil_test_requests
         WHERE status IN ('Sample Collected', 'Completed')",
    )
    .fetch_one(&state.pool)
    .await?;

    let tests_by_district = sqlx::query_as::<_, DistrictTestCount>(
        "SELECT district, COUNT(*) AS count
         FROM soil_test_requests
         WHERE status IN ('Sample Collected', 'Completed')
         GROUP BY district
         ORDER BY count DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(LabAnalytics {
        total_tests,
        completed_tests,
        pending_tests,
        tests_by_district,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationPayload {
    pub crops: CropsInput,
    pub notes: Option<String>,
}

pub async fn submit_recommendation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<String>,
    Json(payload): Json<RecommendationPayload>,
) -> SarubimaResult<Json<Value>> {
    claims.require_role("Lab")?;
    let crops = payload.crops.normalize();
    submit_recommendation_internal(&state.pool, claims.user_id, &request_id, crops, payload.notes)
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// Record the crop recommendation and complete the request in one
/// transaction. `Completed` is what unlocks the farmer's report download, so
/// the recommendation is the completing action.
pub async fn submit_recommendation_internal(
    pool: &DbPool,
    lab_id: i32,
    request_id: &str,
    crops: Vec<String>,
    notes: Option<String>,
) -> SarubimaResult<()> {
    if crops.is_empty() {
        return Err(SarubimaError::Validation(
            "Recommendation cannot be empty".to_string(),
        ));
    }

    let request = fetch_request(pool, request_id).await?;
    let status = parse_stored_status(&request)?;
    if status == RequestStatus::Completed {
        return Err(SarubimaError::Validation(
            "This test already has a recommendation".to_string(),
        ));
    }
    if !status.can_transition_to(RequestStatus::Completed) {
        return Err(SarubimaError::Validation(format!(
            "Cannot recommend crops for a {} request",
            status
        )));
    }

    // The result row must exist before a recommendation can attach to it
    fetch_result(pool, request_id).await?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE soil_test_results
         SET recommended_crops = $1, recommended_by = $2, recommended_at = NOW(),
             notes = $3, updated_at = NOW()
         WHERE request_id = $4",
    )
    .bind(&crops)
    .bind(lab_id)
    .bind(&notes)
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE soil_test_requests
         SET status = $1, recommender_id = COALESCE(recommender_id, $2), updated_at = NOW()
         WHERE request_id = $3",
    )
    .bind(RequestStatus::Completed.as_str())
    .bind(lab_id)
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        "Lab user {} recommended {:?} for request {}",
        lab_id,
        crops,
        request_id
    );
    Ok(())
}
