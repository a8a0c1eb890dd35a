pub mod booking;
pub mod movie;
pub mod screening;
pub mod seat;
pub mod user;

pub use booking::Booking;
pub use movie::Movie;
pub use screening::Screening;
pub use seat::{Seat, SeatStatus};
pub use user::User;
