use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Статус места в зале.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatStatus {
    Available,
    /// Зарезервировано под будущий механизм удержания места на время
    /// оформления. Текущий протокол переводит место сразу в Booked,
    /// этот статус нигде не выставляется.
    Locked,
    Booked,
}

impl SeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Locked => "Locked",
            Self::Booked => "Booked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(Self::Available),
            "Locked" => Some(Self::Locked),
            "Booked" => Some(Self::Booked),
            _ => None,
        }
    }
}

impl std::fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Seat {
    pub id: i64,
    pub screening_id: i64,
    pub row: i32,
    pub number: i32,
    pub status: String,
    pub booking_id: Option<i64>,
    pub version: i64,
}

impl Seat {
    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available.as_str()
    }
}
