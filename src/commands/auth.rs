use crate::db::{DbPool, User};
use crate::error::{SarubimaError, SarubimaResult};
use crate::middleware::auth::issue_token;
use crate::state::AppState;
use crate::workflow;
use axum::extract::{Json, State};
use bcrypt::{hash, verify, DEFAULT_COST};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: String,
    pub district: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> SarubimaResult<Json<LoginResponse>> {
    let response = login_internal(&state.pool, &payload.email, &payload.password).await?;
    Ok(Json(response))
}

pub async fn login_internal(
    pool: &DbPool,
    email: &str,
    password: &str,
) -> SarubimaResult<LoginResponse> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || password.trim().is_empty() {
        return Err(SarubimaError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| SarubimaError::Auth("Invalid email or password".to_string()))?;

    let password_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| SarubimaError::Auth("Invalid email or password".to_string()))?;

    if !verify(password, password_hash)? {
        return Err(SarubimaError::Auth(
            "Invalid email or password".to_string(),
        ));
    }

    if !user.is_active {
        return Err(SarubimaError::Auth(
            "Account is on hold. Please contact the administrator.".to_string(),
        ));
    }

    let token = issue_token(&user)?;

    let _ = sqlx::query("UPDATE users SET last_active = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(pool)
        .await;

    tracing::info!("User {} ({}) logged in", user.email, user.role);

    Ok(LoginResponse {
        token,
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
        district: user.district,
    })
}

/// Role-agnostic registration input assembled by the role-specific handlers.
#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: &'static str,
    pub phone: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub nic: Option<String>,
    pub registration_no: Option<String>,
    pub employee_prefix: Option<&'static str>,
}

pub async fn register_user_internal(pool: &DbPool, new_user: NewUser) -> SarubimaResult<i32> {
    let email = new_user.email.trim().to_lowercase();
    if new_user.name.trim().is_empty() || email.is_empty() || new_user.password.trim().is_empty() {
        return Err(SarubimaError::Validation(
            "Name, email and password are required".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(SarubimaError::Validation(
            "Invalid email address".to_string(),
        ));
    }
    if let Some(district) = &new_user.district {
        if !workflow::is_known_district(district) {
            return Err(SarubimaError::Validation(format!(
                "Unknown district: {}",
                district
            )));
        }
    }

    let existing: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(pool)
        .await?;
    if existing.0 > 0 {
        return Err(SarubimaError::Validation(
            "Email already registered".to_string(),
        ));
    }

    let hashed = hash(new_user.password, DEFAULT_COST)?;

    let mut tx = pool.begin().await?;

    let row: (i32,) = sqlx::query_as(
        "INSERT INTO users (name, email, password_hash, role, phone, district, address, nic, registration_no)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING id",
    )
    .bind(new_user.name.trim())
    .bind(&email)
    .bind(hashed)
    .bind(new_user.role)
    .bind(&new_user.phone)
    .bind(&new_user.district)
    .bind(&new_user.address)
    .bind(&new_user.nic)
    .bind(&new_user.registration_no)
    .fetch_one(&mut *tx)
    .await?;

    let user_id = row.0;

    // Staff accounts get a stable human-readable id shown in assignment lists
    if let Some(prefix) = new_user.employee_prefix {
        sqlx::query("UPDATE users SET employee_id = $1 WHERE id = $2")
            .bind(format!("{}-{:04}", prefix, user_id))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    tracing::info!("Registered {} account for {}", new_user.role, email);
    Ok(user_id)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerRegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(alias = "id")]
    pub nic: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub password: String,
}

pub async fn register_farmer(
    State(state): State<AppState>,
    Json(payload): Json<FarmerRegisterRequest>,
) -> SarubimaResult<Json<Value>> {
    register_user_internal(
        &state.pool,
        NewUser {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            role: "Farmer",
            phone: payload.phone,
            district: None,
            address: payload.address,
            nic: Some(payload.nic),
            registration_no: None,
            employee_prefix: None,
        },
    )
    .await?;

    Ok(Json(
        json!({ "success": true, "message": "Farmer registered successfully" }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub district: String,
    pub nic: String,
    pub password: String,
}

pub async fn register_agent(
    State(state): State<AppState>,
    Json(payload): Json<AgentRegisterRequest>,
) -> SarubimaResult<Json<Value>> {
    register_user_internal(
        &state.pool,
        NewUser {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            role: "Agent",
            phone: payload.phone,
            district: Some(payload.district),
            address: None,
            nic: Some(payload.nic),
            registration_no: None,
            employee_prefix: Some("AG"),
        },
    )
    .await?;

    Ok(Json(
        json!({ "success": true, "message": "Agent registered successfully" }),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabRegisterRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub district: String,
    pub registration_no: String,
    pub password: String,
}

pub async fn register_lab(
    State(state): State<AppState>,
    Json(payload): Json<LabRegisterRequest>,
) -> SarubimaResult<Json<Value>> {
    register_user_internal(
        &state.pool,
        NewUser {
            name: payload.name,
            email: payload.email,
            password: payload.password,
            role: "Lab",
            phone: payload.phone,
            district: Some(payload.district),
            address: payload.address,
            nic: None,
            registration_no: Some(payload.registration_no),
            employee_prefix: Some("LB"),
        },
    )
    .await?;

    Ok(Json(
        json!({ "success": true, "message": "Lab staff registered successfully" }),
    ))
}
