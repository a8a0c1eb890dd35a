use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Screening {
    pub id: i64,
    pub movie_id: i64,
    pub starts_at: DateTime<Utc>,
    pub venue: String,
    pub seat_rows: i32,
    pub seats_per_row: i32,
    pub seat_count: i32,
    pub ticket_price: f64,
    pub is_active: bool,
}
