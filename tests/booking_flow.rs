//! Интеграционные тесты ядра бронирования поверх живого Postgres.
//!
//! Запуск: `DATABASE_URL=postgres://... cargo test --test booking_flow`.
//! Без DATABASE_URL тесты тихо пропускаются, чтобы не требовать БД от
//! каждого окружения сборки.

use chrono::Utc;
use sqlx::PgPool;

use cinema_booking::database::Database;
use cinema_booking::errors::BookingError;
use cinema_booking::models::SeatStatus;
use cinema_booking::services::catalog::{self, NewScreening};
use cinema_booking::services::concurrency::{apply_user_update, ProfileChanges};
use cinema_booking::services::users;
use cinema_booking::services::booking;

/* ---------- инфраструктура ---------- */

async fn test_pool() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping: DATABASE_URL is not set");
            return None;
        }
    };

    let db = Database::new(&url, 5).await.expect("db connect");
    db.run_migrations().await.expect("migrations");
    Some(db.pool)
}

// Уникальный суффикс, чтобы прогоны не спотыкались об UNIQUE(email)
fn unique(tag: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    format!("{tag}-{nanos}")
}

async fn create_user(pool: &PgPool, tag: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO users (email, password_hash, first_name, last_name)
         VALUES ($1, 'not-a-hash', 'Test', 'User')
         RETURNING id",
    )
    .bind(format!("{}@example.com", unique(tag)))
    .fetch_one(pool)
    .await
    .expect("insert user")
}

async fn create_screening(pool: &PgPool, rows: i32, per_row: i32, price: f64) -> i64 {
    let movie_id: i64 = sqlx::query_scalar(
        "INSERT INTO movies (title, duration_minutes, price)
         VALUES ($1, 120, $2)
         RETURNING id",
    )
    .bind(unique("movie"))
    .bind(price)
    .fetch_one(pool)
    .await
    .expect("insert movie");

    catalog::create_screening(
        pool,
        &NewScreening {
            movie_id,
            starts_at: Utc::now(),
            venue: "Зал 1".to_string(),
            seat_rows: rows,
            seats_per_row: per_row,
            ticket_price: price,
        },
    )
    .await
    .expect("create screening")
}

async fn seat_ids(pool: &PgPool, screening_id: i64) -> Vec<i64> {
    sqlx::query_scalar(
        r#"SELECT id FROM seats WHERE screening_id = $1 ORDER BY "row", number"#,
    )
    .bind(screening_id)
    .fetch_all(pool)
    .await
    .expect("load seats")
}

#[derive(sqlx::FromRow)]
struct SeatState {
    status: String,
    booking_id: Option<i64>,
    version: i64,
}

async fn seat_state(pool: &PgPool, seat_id: i64) -> SeatState {
    sqlx::query_as("SELECT status, booking_id, version FROM seats WHERE id = $1")
        .bind(seat_id)
        .fetch_one(pool)
        .await
        .expect("seat state")
}

async fn booking_version(pool: &PgPool, booking_id: i64) -> i64 {
    sqlx::query_scalar("SELECT version FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_one(pool)
        .await
        .expect("booking version")
}

/* ---------- создание брони ---------- */

#[tokio::test]
async fn booking_takes_all_requested_seats_and_nothing_else() {
    let Some(pool) = test_pool().await else { return };

    let screening = create_screening(&pool, 1, 3, 10.0).await;
    let seats = seat_ids(&pool, screening).await;
    let u1 = create_user(&pool, "u1").await;
    let u2 = create_user(&pool, "u2").await;

    // Первый покупатель берет A1 и A2
    let booking_id = booking::create_booking(&pool, u1, screening, &[seats[0], seats[1]])
        .await
        .expect("first booking");

    let total: f64 = sqlx::query_scalar(
        "SELECT total_price::FLOAT8 FROM bookings WHERE id = $1",
    )
    .bind(booking_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(total, 20.0);

    for id in [seats[0], seats[1]] {
        let s = seat_state(&pool, id).await;
        assert_eq!(s.status, SeatStatus::Booked.as_str());
        assert_eq!(s.booking_id, Some(booking_id));
    }

    // Второй просит A2 и B1: конфликт, и B1 не должен пострадать
    let err = booking::create_booking(&pool, u2, screening, &[seats[1], seats[2]])
        .await
        .expect_err("overlap must conflict");
    assert!(matches!(err, BookingError::SeatConflict));

    let b1 = seat_state(&pool, seats[2]).await;
    assert_eq!(b1.status, SeatStatus::Available.as_str());
    assert_eq!(b1.booking_id, None);
}

#[tokio::test]
async fn concurrent_overlapping_bookings_have_exactly_one_winner() {
    let Some(pool) = test_pool().await else { return };

    let screening = create_screening(&pool, 2, 2, 5.0).await;
    let seats = seat_ids(&pool, screening).await;
    let u1 = create_user(&pool, "racer1").await;
    let u2 = create_user(&pool, "racer2").await;

    let first_seats = [seats[0], seats[1]];
    let second_seats = [seats[1], seats[3]];
    let first = booking::create_booking(&pool, u1, screening, &first_seats);
    let second = booking::create_booking(&pool, u2, screening, &second_seats);
    let (r1, r2) = tokio::join!(first, second);

    // Ровно один победитель, проигравший видит конфликт мест
    assert!(r1.is_ok() != r2.is_ok(), "r1={:?} r2={:?}", r1, r2);
    let (winner_seats, loser) = if r1.is_ok() {
        (vec![seats[0], seats[1]], r2)
    } else {
        (vec![seats[1], seats[3]], r1)
    };
    assert!(matches!(loser, Err(BookingError::SeatConflict)));

    // Занятые места сеанса - ровно места победителя
    let booked: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM seats WHERE screening_id = $1 AND status = 'Booked' ORDER BY id",
    )
    .bind(screening)
    .fetch_all(&pool)
    .await
    .unwrap();
    let mut expected = winner_seats.clone();
    expected.sort();
    assert_eq!(booked, expected);
}

#[tokio::test]
async fn cross_screening_and_empty_selections_are_rejected() {
    let Some(pool) = test_pool().await else { return };

    let s1 = create_screening(&pool, 1, 2, 8.0).await;
    let s2 = create_screening(&pool, 1, 2, 8.0).await;
    let foreign = seat_ids(&pool, s2).await[0];
    let own = seat_ids(&pool, s1).await[0];
    let user = create_user(&pool, "picky").await;

    let err = booking::create_booking(&pool, user, s1, &[own, foreign])
        .await
        .expect_err("foreign seat id");
    assert!(matches!(err, BookingError::InvalidSelection));

    let err = booking::create_booking(&pool, user, s1, &[])
        .await
        .expect_err("empty selection");
    assert!(matches!(err, BookingError::InvalidSelection));

    // Ничего не должно быть занято после обоих отказов
    let own_state = seat_state(&pool, own).await;
    assert_eq!(own_state.status, SeatStatus::Available.as_str());

    let err = booking::create_booking(&pool, user, 0, &[own])
        .await
        .expect_err("unknown screening");
    assert!(matches!(err, BookingError::NotFound));
}

/* ---------- отмена ---------- */

#[tokio::test]
async fn cancel_releases_seats_for_the_next_customer() {
    let Some(pool) = test_pool().await else { return };

    let screening = create_screening(&pool, 1, 2, 12.5).await;
    let seats = seat_ids(&pool, screening).await;
    let u1 = create_user(&pool, "owner").await;
    let u2 = create_user(&pool, "next").await;

    let before: Vec<SeatState> = {
        let mut v = Vec::new();
        for &id in &seats {
            v.push(seat_state(&pool, id).await);
        }
        v
    };

    let booking_id = booking::create_booking(&pool, u1, screening, &seats)
        .await
        .expect("booking");
    let version = booking_version(&pool, booking_id).await;

    booking::cancel_booking(&pool, u1, booking_id, version)
        .await
        .expect("cancel");

    // Полный круг возвращает место в исходное состояние, кроме версии
    for (i, &id) in seats.iter().enumerate() {
        let after = seat_state(&pool, id).await;
        assert_eq!(after.status, SeatStatus::Available.as_str());
        assert_eq!(after.booking_id, None);
        assert_eq!(after.version, before[i].version + 2);
    }

    // Бронь удалена целиком
    let gone: Option<i64> = sqlx::query_scalar("SELECT id FROM bookings WHERE id = $1")
        .bind(booking_id)
        .fetch_optional(&pool)
        .await
        .unwrap();
    assert_eq!(gone, None);

    // Следующий покупатель берет те же места без остаточных блокировок
    booking::create_booking(&pool, u2, screening, &seats)
        .await
        .expect("rebooking after cancel");
}

#[tokio::test]
async fn stale_cancel_changes_nothing() {
    let Some(pool) = test_pool().await else { return };

    let screening = create_screening(&pool, 1, 2, 10.0).await;
    let seats = seat_ids(&pool, screening).await;
    let user = create_user(&pool, "stale").await;

    let booking_id = booking::create_booking(&pool, user, screening, &seats)
        .await
        .expect("booking");
    let version = booking_version(&pool, booking_id).await;

    let err = booking::cancel_booking(&pool, user, booking_id, version + 1)
        .await
        .expect_err("stale version");
    assert!(matches!(err, BookingError::StaleWrite { .. }));

    // Бронь и места ровно в том же состоянии
    for &id in &seats {
        let s = seat_state(&pool, id).await;
        assert_eq!(s.status, SeatStatus::Booked.as_str());
        assert_eq!(s.booking_id, Some(booking_id));
    }
    assert_eq!(booking_version(&pool, booking_id).await, version);
}

#[tokio::test]
async fn cancel_checks_ownership_before_touching_anything() {
    let Some(pool) = test_pool().await else { return };

    let screening = create_screening(&pool, 1, 1, 10.0).await;
    let seats = seat_ids(&pool, screening).await;
    let owner = create_user(&pool, "owner").await;
    let stranger = create_user(&pool, "stranger").await;

    let booking_id = booking::create_booking(&pool, owner, screening, &seats)
        .await
        .expect("booking");
    let version = booking_version(&pool, booking_id).await;

    let err = booking::cancel_booking(&pool, stranger, booking_id, version)
        .await
        .expect_err("not the owner");
    assert!(matches!(err, BookingError::NotAuthorized));

    let err = booking::cancel_booking(&pool, owner, booking_id + 1_000_000, version)
        .await
        .expect_err("unknown booking");
    assert!(matches!(err, BookingError::NotFound));

    let s = seat_state(&pool, seats[0]).await;
    assert_eq!(s.status, SeatStatus::Booked.as_str());
}

/* ---------- профиль ---------- */

#[tokio::test]
async fn stale_profile_edit_returns_authoritative_values() {
    let Some(pool) = test_pool().await else { return };

    let user = create_user(&pool, "profile").await;

    let first = ProfileChanges {
        first_name: "Анна".to_string(),
        last_name: "Иванова".to_string(),
        phone: Some("+7-900-000-00-00".to_string()),
        date_of_birth: None,
    };
    let applied = apply_user_update(&pool, user, 1, &first)
        .await
        .expect("first edit");
    assert_eq!(applied.version, 2);

    // Второй редактор пришел со старой версией
    let second = ProfileChanges {
        first_name: "Борис".to_string(),
        last_name: "Петров".to_string(),
        phone: None,
        date_of_birth: None,
    };
    let err = apply_user_update(&pool, user, 1, &second)
        .await
        .expect_err("stale edit");

    match err {
        BookingError::StaleWrite { current } => {
            assert_eq!(current["first_name"], "Анна");
            assert_eq!(current["version"], 2);
        }
        other => panic!("expected StaleWrite, got {:?}", other),
    }

    // В БД остались значения первого редактора
    let stored: (String, i64) =
        sqlx::query_as("SELECT first_name, version FROM users WHERE id = $1")
            .bind(user)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stored, ("Анна".to_string(), 2));

    let err = apply_user_update(&pool, user + 1_000_000, 1, &second)
        .await
        .expect_err("unknown user");
    assert!(matches!(err, BookingError::NotFound));
}

/* ---------- каскадное удаление ---------- */

#[tokio::test]
async fn user_cascade_releases_seats_and_bookings() {
    let Some(pool) = test_pool().await else { return };

    let screening = create_screening(&pool, 1, 2, 6.0).await;
    let seats = seat_ids(&pool, screening).await;
    let admin = create_user(&pool, "admin").await;
    let victim = create_user(&pool, "victim").await;

    booking::create_booking(&pool, victim, screening, &seats)
        .await
        .expect("booking");

    users::delete_user(&pool, admin, victim, 1)
        .await
        .expect("cascade delete");

    for &id in &seats {
        let s = seat_state(&pool, id).await;
        assert_eq!(s.status, SeatStatus::Available.as_str());
        assert_eq!(s.booking_id, None);
    }

    let bookings_left: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE user_id = $1")
            .bind(victim)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(bookings_left, 0);

    let user_left: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
        .bind(victim)
        .fetch_optional(&pool)
        .await
        .unwrap();
    assert_eq!(user_left, None);
}

#[tokio::test]
async fn stale_cascade_aborts_whole_operation() {
    let Some(pool) = test_pool().await else { return };

    let screening = create_screening(&pool, 1, 1, 6.0).await;
    let seats = seat_ids(&pool, screening).await;
    let admin = create_user(&pool, "admin2").await;
    let victim = create_user(&pool, "victim2").await;

    let booking_id = booking::create_booking(&pool, victim, screening, &seats)
        .await
        .expect("booking");

    let err = users::delete_user(&pool, admin, victim, 999)
        .await
        .expect_err("stale user version");
    assert!(matches!(err, BookingError::StaleWrite { .. }));

    // Каскад не должен был тронуть ни бронь, ни место
    let s = seat_state(&pool, seats[0]).await;
    assert_eq!(s.status, SeatStatus::Booked.as_str());
    assert_eq!(s.booking_id, Some(booking_id));

    let err = users::delete_user(&pool, admin, admin, 1)
        .await
        .expect_err("self delete");
    assert!(matches!(err, BookingError::NotAuthorized));
}

/* ---------- инвариант реестра мест ---------- */

#[tokio::test]
async fn booked_seats_and_bookings_stay_consistent() {
    let Some(pool) = test_pool().await else { return };

    let screening = create_screening(&pool, 2, 3, 4.0).await;
    let seats = seat_ids(&pool, screening).await;
    let u1 = create_user(&pool, "inv1").await;
    let u2 = create_user(&pool, "inv2").await;

    let b1 = booking::create_booking(&pool, u1, screening, &seats[0..2])
        .await
        .expect("b1");
    booking::create_booking(&pool, u2, screening, &seats[2..4])
        .await
        .expect("b2");
    booking::cancel_booking(&pool, u1, b1, booking_version(&pool, b1).await)
        .await
        .expect("cancel b1");

    // Занятое место всегда ссылается на бронь того же сеанса, и наоборот
    let orphans: i64 = sqlx::query_scalar(
        "SELECT COUNT(*)
         FROM seats s
         LEFT JOIN bookings b ON b.id = s.booking_id AND b.screening_id = s.screening_id
         WHERE s.screening_id = $1
           AND ((s.status = 'Booked') <> (b.id IS NOT NULL))",
    )
    .bind(screening)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(orphans, 0);
}
