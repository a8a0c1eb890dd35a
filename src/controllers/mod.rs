pub mod bookings;
pub mod screenings;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(screenings::routes())
        .merge(bookings::routes())
        .merge(users::routes())
}
