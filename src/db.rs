use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{FromRow, Pool, Postgres};
use std::str::FromStr;

use crate::error::{SarubimaError, SarubimaResult};

pub type DbPool = Pool<Postgres>;

pub async fn init_pool_with_options(opts: PgConnectOptions) -> SarubimaResult<DbPool> {
    // connect_lazy_with returns the pool immediately. It does not validate connection.
    Ok(PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .idle_timeout(std::time::Duration::from_secs(120))
        .max_lifetime(std::time::Duration::from_secs(300))
        .connect_lazy_with(opts))
}

pub async fn init_pool(database_url: &str) -> SarubimaResult<DbPool> {
    let opts = PgConnectOptions::from_str(database_url)
        .map_err(|e| SarubimaError::Internal(format!("Invalid DB URL: {}", e)))?
        .ssl_mode(PgSslMode::Disable);

    init_pool_with_options(opts).await
}

pub async fn init_database(pool: &DbPool) -> SarubimaResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    let _ = ensure_seeds(pool).await;
    tracing::info!("Database ready");
    Ok(())
}

/// Seed the bootstrap administrator account so a fresh deployment is usable.
async fn ensure_seeds(pool: &DbPool) -> SarubimaResult<()> {
    let admin_email =
        std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@sarubima.lk".to_string());

    let admin_exists: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = 'Admin'")
        .fetch_one(pool)
        .await
        .unwrap_or((0,));
    if admin_exists.0 == 0 {
        if let Ok(hash) = bcrypt::hash("admin", bcrypt::DEFAULT_COST) {
            let _ = sqlx::query(
                "INSERT INTO users (name, email, password_hash, role) VALUES ($1, $2, $3, 'Admin') ON CONFLICT DO NOTHING",
            )
            .bind("Administrator")
            .bind(&admin_email)
            .bind(hash)
            .execute(pool)
            .await;
            tracing::warn!("Seeded default admin account '{}'", admin_email);
        }
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub role: String,
    pub phone: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub nic: Option<String>,
    pub employee_id: Option<String>,
    pub registration_no: Option<String>,
    pub is_active: bool,
    pub last_active: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SoilTestRequest {
    pub request_id: String,
    pub farmer_id: i32,
    #[sqlx(default)]
    pub farmer_name: Option<String>,
    pub phone: String,
    pub district: String,
    pub address: String,
    pub land_size: Decimal,
    pub land_unit: String,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub crops: Vec<String>,
    pub number_of_tests: i32,
    pub total_cost: i32,
    pub payment_method: String,
    pub payment_status: String,
    pub status: String,
    pub agent_id: Option<i32>,
    #[sqlx(default)]
    pub agent_name: Option<String>,
    #[sqlx(default)]
    pub agent_employee_id: Option<String>,
    pub recommender_id: Option<i32>,
    #[sqlx(default)]
    pub recommender_name: Option<String>,
    #[sqlx(default)]
    pub recommender_employee_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SoilTestResult {
    pub request_id: String,
    pub ph: f64,
    pub sunlight: String,
    pub moisture: f64,
    pub soil_moisture: f64,
    pub conductivity: f64,
    pub woil: f64,
    pub other: Option<String>,
    pub recommended_crops: Option<Vec<String>>,
    pub recommended_by: Option<i32>,
    #[sqlx(default)]
    pub recommended_by_name: Option<String>,
    pub recommended_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lab view of a request: the measurements joined flat onto the request row.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LabTest {
    pub request_id: String,
    pub district: String,
    pub status: String,
    #[sqlx(default)]
    pub farmer_name: Option<String>,
    #[sqlx(default)]
    pub agent_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub ph: f64,
    pub sunlight: String,
    pub moisture: f64,
    pub soil_moisture: f64,
    pub conductivity: f64,
    pub woil: f64,
    pub other: Option<String>,
    #[sqlx(default)]
    pub recommended_crops: Option<Vec<String>>,
    #[sqlx(default)]
    pub recommended_by_name: Option<String>,
    #[sqlx(default)]
    pub recommended_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, FromRow, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub total: Option<i64>,
    pub pending: Option<i64>,
    pub scheduled: Option<i64>,
    pub sample_collected: Option<i64>,
    pub in_progress: Option<i64>,
    pub completed: Option<i64>,
    pub cancelled: Option<i64>,
}

#[derive(Debug, Serialize, FromRow, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub total_users: Option<i64>,
    pub farmers: Option<i64>,
    pub agents: Option<i64>,
    pub lab_staff: Option<i64>,
    pub held_users: Option<i64>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DistrictTestCount {
    pub district: String,
    pub count: i64,
}

#[derive(Debug, Serialize, FromRow, Default)]
#[serde(rename_all = "camelCase")]
pub struct RevenueTotals {
    pub total_revenue: Option<i64>,
    pub completed_tests: Option<i64>,
    pub pending_payments: Option<i64>,
    pub cash_payments: Option<i64>,
    pub card_payments: Option<i64>,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRevenueRow {
    pub month: String,
    pub total_revenue: Option<i64>,
    pub completed_tests: Option<i64>,
    pub pending_payments: Option<i64>,
}
