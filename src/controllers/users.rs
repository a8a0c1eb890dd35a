use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::errors::BookingError;
use crate::middleware::{AdminUser, AuthUser};
use crate::services::concurrency::{apply_user_update, ProfileChanges};
use crate::services::users;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/profile", patch(update_profile))
        .route("/users", get(list_users))
        .route("/users/{id}", patch(admin_update_user))
        .route("/users/{id}", delete(delete_user))
}

/* ---------- профиль ---------- */

// GET /api/profile
async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, BookingError> {
    let profile = users::load_profile(&state.db.pool, user.user_id).await?;
    Ok((StatusCode::OK, Json(profile)))
}

// PATCH /api/profile
#[derive(Debug, Deserialize)]
struct UpdateUserRequest {
    // версия, которую видел редактор; несовпадение вернет актуальные значения
    version: i64,
    #[serde(flatten)]
    changes: ProfileChanges,
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let applied =
        apply_user_update(&state.db.pool, user.user_id, req.version, &req.changes).await?;
    Ok((StatusCode::OK, Json(applied)))
}

/* ---------- администрирование ---------- */

// GET /api/users
async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, BookingError> {
    let all = users::list_users(&state.db.pool).await?;
    Ok((StatusCode::OK, Json(all)))
}

// PATCH /api/users/{id}
async fn admin_update_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(user_id): Path<i64>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, BookingError> {
    let applied = apply_user_update(&state.db.pool, user_id, req.version, &req.changes).await?;
    Ok((StatusCode::OK, Json(applied)))
}

// DELETE /api/users/{id}?version=N
#[derive(Debug, Deserialize)]
struct DeleteUserQuery {
    version: i64,
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    admin: AdminUser,
    Path(user_id): Path<i64>,
    Query(q): Query<DeleteUserQuery>,
) -> Result<impl IntoResponse, BookingError> {
    users::delete_user(&state.db.pool, admin.0.user_id, user_id, q.version).await?;
    Ok((
        StatusCode::OK,
        Json(json!({"message": "Пользователь удален, его брони сняты"})),
    ))
}
