use crate::db::User;
use crate::error::{SarubimaError, SarubimaResult};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: i32,
    pub name: String,
    pub role: String,
    pub district: Option<String>,
    pub exp: usize,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == "Admin"
    }

    pub fn require_admin(&self) -> SarubimaResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(SarubimaError::Forbidden(
                "Administrator authority required".to_string(),
            ))
        }
    }

    pub fn require_role(&self, role: &str) -> SarubimaResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(SarubimaError::Forbidden(format!(
                "{} authority required",
                role
            )))
        }
    }
}

pub fn get_jwt_secret() -> Vec<u8> {
    std::env::var("JWT_SECRET")
        .unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, using insecure default!");
            "insecure-development-secret-key-replace-me-immediately".to_string()
        })
        .into_bytes()
}

/// Issue a 24h bearer token for a freshly authenticated user.
pub fn issue_token(user: &User) -> SarubimaResult<String> {
    let exp = (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize;
    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        name: user.name.clone(),
        role: user.role.clone(),
        district: user.district.clone(),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(&get_jwt_secret()),
    )
    .map_err(|e| SarubimaError::Internal(format!("Token encoding failed: {}", e)))
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = request.uri().path();
    let public_routes = vec![
        "/api/auth/login",
        "/api/auth/farmers/register",
        "/api/auth/agents/register",
        "/api/auth/labs/register",
    ];

    if !path.starts_with("/api/") || public_routes.contains(&path) {
        return Ok(next.run(request).await);
    }

    // 1. Extract the Authorization header
    let auth_header = match request.headers().get(header::AUTHORIZATION) {
        Some(header) => header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?,
        None => return Err(StatusCode::UNAUTHORIZED),
    };

    if !auth_header.starts_with("Bearer ") {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = &auth_header["Bearer ".len()..];

    // 2. Validate the token
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(&get_jwt_secret()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // 3. Touch the presence marker that drives the online-users view
    let _ = sqlx::query("UPDATE users SET last_active = NOW() WHERE id = $1")
        .bind(token_data.claims.user_id)
        .execute(&state.pool)
        .await;

    // 4. Attach the claims to the request extensions
    request.extensions_mut().insert(token_data.claims);

    Ok(next.run(request).await)
}
