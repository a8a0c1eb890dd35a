use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub screening_id: i64,
    pub total_price: f64,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub version: i64,
}
