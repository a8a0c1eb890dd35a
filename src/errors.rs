use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Исходы операций ядра бронирования.
///
/// Каждый вариант соответствует отдельному сообщению для пользователя;
/// общий "что-то пошло не так" остается только за ошибками хранилища.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Запись не найдена")]
    NotFound,

    #[error("Операция не разрешена")]
    NotAuthorized,

    #[error("Некорректный выбор мест")]
    InvalidSelection,

    #[error("Одно или несколько мест уже заняты")]
    SeatConflict,

    /// Версия записи устарела. `current` — актуальные значения из БД,
    /// чтобы вызывающая сторона показала их пользователю, а не гадала.
    #[error("Запись изменена другим пользователем")]
    StaleWrite { current: serde_json::Value },

    #[error("Не удалось выполнить операцию")]
    TransactionFailed(#[from] sqlx::Error),
}

pub type CoreResult<T> = Result<T, BookingError>;

impl BookingError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::NotAuthorized => StatusCode::FORBIDDEN,
            Self::InvalidSelection => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SeatConflict | Self::StaleWrite { .. } => StatusCode::CONFLICT,
            Self::TransactionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        if let Self::TransactionFailed(ref e) = self {
            tracing::error!("store failure: {:?}", e);
        }

        let status = self.status();
        let message = self.to_string();
        let body = match self {
            Self::StaleWrite { current } => json!({ "error": message, "current": current }),
            _ => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
