use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::BookingError;
use crate::services::booking;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", get(get_user_bookings))
        .route("/bookings", post(create_booking))
        .route("/bookings/cancel", patch(cancel_booking))
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
#[derive(Debug, Deserialize)]
struct CreateBookingRequest {
    screening_id: i64,
    seat_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct CreateBookingResponse {
    id: i64,
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    if req.screening_id <= 0 {
        return Err(BookingError::InvalidSelection);
    }

    let id =
        booking::create_booking(&state.db.pool, user.user_id, req.screening_id, &req.seat_ids)
            .await?;

    Ok((StatusCode::CREATED, Json(CreateBookingResponse { id })))
}

// GET /api/bookings
async fn get_user_bookings(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
) -> Result<impl IntoResponse, BookingError> {
    let bookings = booking::list_user_bookings(&state.db.pool, user.user_id).await?;
    Ok((StatusCode::OK, Json(bookings)))
}

// PATCH /api/bookings/cancel
#[derive(Debug, Deserialize)]
struct CancelBookingRequest {
    booking_id: i64,
    // версия брони, которую видел пользователь
    version: i64,
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: crate::middleware::AuthUser,
    Json(req): Json<CancelBookingRequest>,
) -> Result<impl IntoResponse, BookingError> {
    if req.booking_id <= 0 {
        return Err(BookingError::InvalidSelection);
    }

    booking::cancel_booking(&state.db.pool, user.user_id, req.booking_id, req.version).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({"message": "Бронь успешно отменена, места освобождены"})),
    ))
}
