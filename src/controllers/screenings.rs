use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::errors::BookingError;
use crate::middleware::AdminUser;
use crate::services::catalog::{self, NewScreening};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/screenings", get(list_screenings))
        .route("/screenings", post(create_screening))
        .route("/screenings/{id}/seats", get(get_seat_map))
        .route("/screenings/{id}/deactivate", patch(deactivate_screening))
        .route("/movies", post(create_movie))
}

// GET /api/screenings
async fn list_screenings(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BookingError> {
    let screenings = catalog::list_screenings(&state.db.pool).await?;
    Ok((StatusCode::OK, Json(screenings)))
}

// GET /api/screenings/{id}/seats
async fn get_seat_map(
    State(state): State<Arc<AppState>>,
    Path(screening_id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    let seats = catalog::screening_seats(&state.db.pool, screening_id).await?;
    Ok((StatusCode::OK, Json(seats)))
}

// POST /api/movies
#[derive(Debug, Deserialize)]
struct CreateMovieRequest {
    title: String,
    duration_minutes: i32,
    price: f64,
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<CreateMovieRequest>,
) -> Result<impl IntoResponse, BookingError> {
    if req.title.trim().is_empty() || req.duration_minutes <= 0 || req.price < 0.0 {
        return Err(BookingError::InvalidSelection);
    }

    let id =
        catalog::create_movie(&state.db.pool, &req.title, req.duration_minutes, req.price).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

// POST /api/screenings
async fn create_screening(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Json(req): Json<NewScreening>,
) -> Result<impl IntoResponse, BookingError> {
    if req.venue.trim().is_empty() || req.ticket_price < 0.0 {
        return Err(BookingError::InvalidSelection);
    }

    let id = catalog::create_screening(&state.db.pool, &req).await?;

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

// PATCH /api/screenings/{id}/deactivate
async fn deactivate_screening(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(screening_id): Path<i64>,
) -> Result<impl IntoResponse, BookingError> {
    catalog::deactivate_screening(&state.db.pool, screening_id).await?;
    Ok((
        StatusCode::OK,
        Json(json!({"message": "Сеанс снят с продажи"})),
    ))
}
