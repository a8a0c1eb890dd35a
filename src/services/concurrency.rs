//! Разрешение конфликтов параллельной записи.
//!
//! Все изменяемые сущности несут колонку `version`. Запись выполняется
//! одним условным UPDATE: `... SET version = version + 1 WHERE id = $id
//! AND version = $expected`. Ноль затронутых строк означает, что версию
//! уже перебил параллельный писатель; тогда операция завершается
//! `StaleWrite` с актуальными значениями строки, и решение о повторе
//! остается за вызывающей стороной. Ядро само никогда не повторяет.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};

use crate::errors::{BookingError, CoreResult};
use crate::models::SeatStatus;

/// Поля профиля, доступные для правки. Email и признак администратора
/// этим путем не меняются.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileChanges {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Итог успешной записи: новая версия, которую вызывающая сторона
/// должна предъявить при следующем изменении.
#[derive(Debug, Serialize)]
pub struct AppliedUpdate {
    pub version: i64,
}

/// Обновить поля пользователя со сверкой версии.
///
/// Используется и для самостоятельной правки профиля, и для
/// административного редактирования - дисциплина одна и та же.
pub async fn apply_user_update(
    pool: &PgPool,
    user_id: i64,
    expected_version: i64,
    changes: &ProfileChanges,
) -> CoreResult<AppliedUpdate> {
    let new_version: Option<i64> = sqlx::query_scalar(
        "UPDATE users
         SET first_name = $1, last_name = $2, phone = $3, date_of_birth = $4,
             version = version + 1
         WHERE id = $5 AND version = $6
         RETURNING version",
    )
    .bind(&changes.first_name)
    .bind(&changes.last_name)
    .bind(&changes.phone)
    .bind(changes.date_of_birth)
    .bind(user_id)
    .bind(expected_version)
    .fetch_optional(pool)
    .await?;

    match new_version {
        Some(version) => Ok(AppliedUpdate { version }),
        None => Err(stale_user(pool, user_id).await?),
    }
}

/// Перевести место в новое состояние, только если его версия не менялась
/// с момента чтения. Возвращает false, если строку уже переписали.
pub async fn try_transition_seat(
    tx: &mut Transaction<'_, Postgres>,
    seat_id: i64,
    expected_version: i64,
    to: SeatStatus,
    booking_id: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let updated = sqlx::query(
        "UPDATE seats
         SET status = $1, booking_id = $2, version = version + 1
         WHERE id = $3 AND version = $4",
    )
    .bind(to.as_str())
    .bind(booking_id)
    .bind(seat_id)
    .bind(expected_version)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

// Актуальное состояние пользователя для ответа StaleWrite. Если строки
// уже нет, конфликт превращается в NotFound.
async fn stale_user(pool: &PgPool, user_id: i64) -> CoreResult<BookingError> {
    let current: Option<crate::models::User> =
        sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    Ok(match current {
        Some(user) => BookingError::StaleWrite {
            current: serde_json::to_value(&user).unwrap_or_default(),
        },
        None => BookingError::NotFound,
    })
}
