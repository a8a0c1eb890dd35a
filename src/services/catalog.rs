//! Каталог: фильмы, сеансы и генерация мест.
//!
//! Справочные данные, читаются часто и меняются редко. Места создаются
//! один раз вместе с сеансом и дальше живут только через ядро
//! бронирования.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use crate::errors::{BookingError, CoreResult};
use crate::models::Seat;

#[derive(Debug, Clone, Deserialize)]
pub struct NewScreening {
    pub movie_id: i64,
    pub starts_at: DateTime<Utc>,
    pub venue: String,
    pub seat_rows: i32,
    pub seats_per_row: i32,
    pub ticket_price: f64,
}

pub async fn create_movie(
    pool: &PgPool,
    title: &str,
    duration_minutes: i32,
    price: f64,
) -> CoreResult<i64> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO movies (title, duration_minutes, price)
         VALUES ($1, $2, $3)
         RETURNING id",
    )
    .bind(title)
    .bind(duration_minutes)
    .bind(price)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Создать сеанс и сразу сгенерировать все его места.
///
/// Сеанс без полного набора мест существовать не должен, поэтому обе
/// вставки идут в одной транзакции.
pub async fn create_screening(pool: &PgPool, req: &NewScreening) -> CoreResult<i64> {
    let seat_count =
        layout_seat_count(req.seat_rows, req.seats_per_row).ok_or(BookingError::InvalidSelection)?;

    let movie_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movies WHERE id = $1)")
        .bind(req.movie_id)
        .fetch_one(pool)
        .await?;
    if !movie_exists {
        return Err(BookingError::NotFound);
    }

    let mut tx = pool.begin().await?;

    let screening_id: i64 = sqlx::query_scalar(
        "INSERT INTO screenings
             (movie_id, starts_at, venue, seat_rows, seats_per_row, seat_count, ticket_price)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING id",
    )
    .bind(req.movie_id)
    .bind(req.starts_at)
    .bind(&req.venue)
    .bind(req.seat_rows)
    .bind(req.seats_per_row)
    .bind(seat_count)
    .bind(req.ticket_price)
    .fetch_one(&mut *tx)
    .await?;

    // Все места зала разом, все Available
    sqlx::query(
        r#"
        INSERT INTO seats (screening_id, "row", number)
        SELECT $1, r, n
        FROM generate_series(1, $2) AS r, generate_series(1, $3) AS n
        "#,
    )
    .bind(screening_id)
    .bind(req.seat_rows)
    .bind(req.seats_per_row)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        "screening {} created: movie {}, {} seats",
        screening_id, req.movie_id, seat_count
    );
    Ok(screening_id)
}

/// Снять сеанс с продажи. Места и существующие брони не трогаем.
pub async fn deactivate_screening(pool: &PgPool, screening_id: i64) -> CoreResult<()> {
    let updated = sqlx::query("UPDATE screenings SET is_active = FALSE WHERE id = $1")
        .bind(screening_id)
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(BookingError::NotFound);
    }
    Ok(())
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ScreeningView {
    pub id: i64,
    pub movie_id: i64,
    pub title: String,
    pub starts_at: DateTime<Utc>,
    pub venue: String,
    pub seat_count: i32,
    pub ticket_price: f64,
}

pub async fn list_screenings(pool: &PgPool) -> CoreResult<Vec<ScreeningView>> {
    let screenings = sqlx::query_as::<_, ScreeningView>(
        "SELECT s.id, s.movie_id, m.title, s.starts_at, s.venue, s.seat_count,
                s.ticket_price::FLOAT8 AS ticket_price
         FROM screenings s
         JOIN movies m ON m.id = s.movie_id
         WHERE s.is_active
         ORDER BY s.starts_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(screenings)
}

/// Карта зала для отображения. Снимок без гарантий свежести: занятость
/// перепроверяется на записи.
pub async fn screening_seats(pool: &PgPool, screening_id: i64) -> CoreResult<Vec<Seat>> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM screenings WHERE id = $1)")
        .bind(screening_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(BookingError::NotFound);
    }

    let seats = sqlx::query_as::<_, Seat>(
        r#"
        SELECT id, screening_id, "row", number, status, booking_id, version
        FROM seats
        WHERE screening_id = $1
        ORDER BY "row", number
        "#,
    )
    .bind(screening_id)
    .fetch_all(pool)
    .await?;

    Ok(seats)
}

// Размер зала; None при некорректной или переполняющей раскладке
fn layout_seat_count(rows: i32, seats_per_row: i32) -> Option<i32> {
    if rows <= 0 || seats_per_row <= 0 {
        return None;
    }
    rows.checked_mul(seats_per_row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_multiplies_rows_by_width() {
        assert_eq!(layout_seat_count(5, 10), Some(50));
        assert_eq!(layout_seat_count(1, 1), Some(1));
    }

    #[test]
    fn degenerate_layouts_are_rejected() {
        assert_eq!(layout_seat_count(0, 10), None);
        assert_eq!(layout_seat_count(10, 0), None);
        assert_eq!(layout_seat_count(-3, 4), None);
        assert_eq!(layout_seat_count(i32::MAX, 2), None);
    }
}
