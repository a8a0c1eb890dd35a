//! Транзакционное ядро бронирования.
//!
//! Бронь на несколько мест создается и снимается как одна единица
//! работы: либо все места меняют статус и бронь записана, либо
//! состояние БД остается байт-в-байт прежним.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::info;

use crate::errors::{BookingError, CoreResult};
use crate::models::{Booking, SeatStatus};
use crate::services::concurrency::try_transition_seat;

#[derive(sqlx::FromRow)]
struct SeatForUpdate {
    id: i64,
    status: String,
    version: i64,
}

/// Создать бронь пользователя на набор мест одного сеанса.
///
/// Проверка доступности и условные записи выполняются в одной
/// транзакции: писатель, проигравший гонку за любое из мест, получает
/// `SeatConflict`, и ни одно место не остается занятым частично.
pub async fn create_booking(
    pool: &PgPool,
    user_id: i64,
    screening_id: i64,
    seat_ids: &[i64],
) -> CoreResult<i64> {
    let requested = normalize_selection(seat_ids)?;

    let mut tx = pool.begin().await?;

    let ticket_price: Option<f64> = sqlx::query_scalar(
        "SELECT ticket_price::FLOAT8 FROM screenings WHERE id = $1 AND is_active",
    )
    .bind(screening_id)
    .fetch_optional(&mut *tx)
    .await?;
    let ticket_price = ticket_price.ok_or(BookingError::NotFound)?;

    // Места грузим строго в рамках сеанса: чужой или несуществующий id
    // просто не вернется, и разница в количестве отменит операцию
    let seats: Vec<SeatForUpdate> = sqlx::query_as(
        "SELECT id, status, version FROM seats WHERE id = ANY($1) AND screening_id = $2",
    )
    .bind(&requested)
    .bind(screening_id)
    .fetch_all(&mut *tx)
    .await?;

    if seats.len() != requested.len() {
        return Err(BookingError::InvalidSelection);
    }
    if seats
        .iter()
        .any(|s| s.status != SeatStatus::Available.as_str())
    {
        return Err(BookingError::SeatConflict);
    }

    let total_price = total_price(seats.len(), ticket_price);

    let booking_id: i64 = sqlx::query_scalar(
        "INSERT INTO bookings (user_id, screening_id, total_price, created_at, status)
         VALUES ($1, $2, $3, $4, 'Confirmed')
         RETURNING id",
    )
    .bind(user_id)
    .bind(screening_id)
    .bind(total_price)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    // Каждое место занимаем со сверкой версии, прочитанной выше.
    // Параллельный коммит по тому же месту даст 0 затронутых строк
    for seat in &seats {
        let won = try_transition_seat(
            &mut tx,
            seat.id,
            seat.version,
            SeatStatus::Booked,
            Some(booking_id),
        )
        .await?;

        if !won {
            tx.rollback().await?;
            return Err(BookingError::SeatConflict);
        }
    }

    tx.commit().await?;

    info!(
        "booking {} created: user {}, screening {}, {} seats",
        booking_id,
        user_id,
        screening_id,
        seats.len()
    );
    Ok(booking_id)
}

/// Снять бронь и вернуть ее места в продажу.
///
/// Версия брони сверяется при удалении; несовпадение откатывает и уже
/// выполненное освобождение мест.
pub async fn cancel_booking(
    pool: &PgPool,
    user_id: i64,
    booking_id: i64,
    expected_version: i64,
) -> CoreResult<()> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT user_id FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_optional(pool)
        .await?;

    match owner {
        None => return Err(BookingError::NotFound),
        // Чужая бронь - отдельный отказ, не "не найдено"
        Some(owner_id) if owner_id != user_id => return Err(BookingError::NotAuthorized),
        Some(_) => {}
    }

    let mut tx = pool.begin().await?;

    let seats: Vec<SeatForUpdate> = sqlx::query_as(
        "SELECT id, status, version FROM seats WHERE booking_id = $1",
    )
    .bind(booking_id)
    .fetch_all(&mut *tx)
    .await?;

    for seat in &seats {
        let won = try_transition_seat(&mut tx, seat.id, seat.version, SeatStatus::Available, None)
            .await?;
        if !won {
            tx.rollback().await?;
            return Err(stale_booking(pool, booking_id).await?);
        }
    }

    let deleted = sqlx::query("DELETE FROM bookings WHERE id = $1 AND version = $2")
        .bind(booking_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted != 1 {
        tx.rollback().await?;
        return Err(stale_booking(pool, booking_id).await?);
    }

    tx.commit().await?;

    info!(
        "booking {} cancelled by user {}, {} seats released",
        booking_id,
        user_id,
        seats.len()
    );
    Ok(())
}

/* ---------- чтение истории ---------- */

#[derive(Debug, Serialize)]
pub struct BookingSeatView {
    pub id: i64,
    pub row: i32,
    pub number: i32,
}

#[derive(Debug, Serialize)]
pub struct BookingView {
    pub id: i64,
    pub screening_id: i64,
    pub total_price: f64,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub version: i64,
    pub seats: Vec<BookingSeatView>,
}

/// Брони пользователя с местами. Чтение без версий: к моменту записи
/// оно может устареть, это разрешается на записи, не здесь.
pub async fn list_user_bookings(pool: &PgPool, user_id: i64) -> CoreResult<Vec<BookingView>> {
    let rows = sqlx::query(
        r#"
        SELECT b.id AS bid, b.screening_id AS screening_id,
               b.total_price::FLOAT8 AS total_price, b.created_at AS created_at,
               b.status AS status, b.version AS version,
               s.id AS seat_id, s."row" AS seat_row, s.number AS seat_number
        FROM bookings b
        LEFT JOIN seats s ON s.booking_id = b.id
        WHERE b.user_id = $1
        ORDER BY b.created_at DESC, s."row", s.number
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut map: BTreeMap<i64, BookingView> = BTreeMap::new();
    for r in rows {
        let bid: i64 = r.get("bid");
        let entry = map.entry(bid).or_insert_with(|| BookingView {
            id: bid,
            screening_id: r.get("screening_id"),
            total_price: r.get("total_price"),
            created_at: r.get("created_at"),
            status: r.get("status"),
            version: r.get("version"),
            seats: Vec::new(),
        });
        if let Ok(seat_id) = r.try_get::<i64, _>("seat_id") {
            entry.seats.push(BookingSeatView {
                id: seat_id,
                row: r.get("seat_row"),
                number: r.get("seat_number"),
            });
        }
    }

    Ok(map.into_values().collect())
}

/* ---------- helpers ---------- */

// Набор мест из запроса: без дубликатов, непустой
fn normalize_selection(seat_ids: &[i64]) -> CoreResult<Vec<i64>> {
    let unique: BTreeSet<i64> = seat_ids.iter().copied().collect();
    if unique.is_empty() {
        return Err(BookingError::InvalidSelection);
    }
    Ok(unique.into_iter().collect())
}

fn total_price(seat_count: usize, ticket_price: f64) -> f64 {
    seat_count as f64 * ticket_price
}

// Актуальное состояние брони для ответа StaleWrite
async fn stale_booking(pool: &PgPool, booking_id: i64) -> CoreResult<BookingError> {
    let current: Option<Booking> = sqlx::query_as(
        "SELECT id, user_id, screening_id, total_price::FLOAT8 AS total_price,
                created_at, status, version
         FROM bookings WHERE id = $1",
    )
    .bind(booking_id)
    .fetch_optional(pool)
    .await?;

    Ok(match current {
        Some(booking) => BookingError::StaleWrite {
            current: serde_json::to_value(&booking).unwrap_or_default(),
        },
        None => BookingError::NotFound,
    })
}
