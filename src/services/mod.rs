pub mod booking;
pub mod catalog;
pub mod concurrency;
pub mod users;
