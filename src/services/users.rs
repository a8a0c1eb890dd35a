//! Пользователи: профиль, список и каскадное удаление.

use sqlx::PgPool;
use tracing::info;

use crate::errors::{BookingError, CoreResult};
use crate::models::{SeatStatus, User};

pub async fn load_profile(pool: &PgPool, user_id: i64) -> CoreResult<User> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(BookingError::NotFound)
}

pub async fn list_users(pool: &PgPool) -> CoreResult<Vec<User>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
        .fetch_all(pool)
        .await?;
    Ok(users)
}

/// Удалить пользователя вместе со всеми его бронями.
///
/// Порядок жесткий и явный: сначала места всех броней возвращаются в
/// продажу, затем удаляются брони, последним - сам пользователь со
/// сверкой версии. Несовпадение версии откатывает весь каскад: ни одно
/// место и ни одна бронь не меняются.
pub async fn delete_user(
    pool: &PgPool,
    acting_admin_id: i64,
    user_id: i64,
    expected_version: i64,
) -> CoreResult<()> {
    // Удалить собственную учетную запись нельзя
    if acting_admin_id == user_id {
        return Err(BookingError::NotAuthorized);
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        "UPDATE seats
         SET status = $1, booking_id = NULL, version = version + 1
         WHERE booking_id IN (SELECT id FROM bookings WHERE user_id = $2)",
    )
    .bind(SeatStatus::Available.as_str())
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM bookings WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    let deleted = sqlx::query("DELETE FROM users WHERE id = $1 AND version = $2")
        .bind(user_id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    if deleted != 1 {
        tx.rollback().await?;

        // Различаем "пользователя нет" и "версию перебил другой администратор"
        let current: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        return Err(match current {
            Some(user) => BookingError::StaleWrite {
                current: serde_json::to_value(&user).unwrap_or_default(),
            },
            None => BookingError::NotFound,
        });
    }

    tx.commit().await?;

    info!("user {} deleted, bookings released", user_id);
    Ok(())
}

/// Создает начального администратора при старте, если его еще нет.
pub async fn ensure_admin(pool: &PgPool, email: &str, password: &str) -> anyhow::Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(email)
        .fetch_one(pool)
        .await?;
    if exists {
        return Ok(());
    }

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    sqlx::query(
        "INSERT INTO users (email, password_hash, first_name, is_admin)
         VALUES ($1, $2, 'Admin', TRUE)",
    )
    .bind(email)
    .bind(hash)
    .execute(pool)
    .await?;

    info!("bootstrap admin {} created", email);
    Ok(())
}
