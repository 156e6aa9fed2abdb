//! Wire types exchanged with the booking API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token for authenticated endpoints
    pub access_token: String,
    pub user_id: i64,
    pub email: String,
    pub name: String,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

/// Generic acknowledgement (`{"message": "..."}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// Refresh response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
}

/// A movie in the catalogue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub movie_id: i64,
    pub title: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub description: String,
    /// Running time in minutes
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub url_image: Option<String>,
}

/// A scheduled screening of a movie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Show {
    pub show_id: i64,
    pub movie_id: i64,
    #[serde(default)]
    pub movie_title: Option<String>,
    pub show_time: DateTime<Utc>,
}

/// Seat availability as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Booked,
    #[serde(other)]
    Unknown,
}

/// A seat in a show's auditorium
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub seat_id: i64,
    /// Row letter followed by the seat number, e.g. `C7`
    pub seat_name: String,
    pub status: SeatStatus,
}

impl Seat {
    pub fn is_available(&self) -> bool {
        self.status == SeatStatus::Available
    }
}

/// Booking request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRequest {
    pub seats: Vec<i64>,
}

/// A booked ticket from the user's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub booking_id: i64,
    pub show_id: i64,
    pub title: String,
    pub seat_name: String,
    pub show_time: DateTime<Utc>,
    pub book_at: DateTime<Utc>,
}

impl Ticket {
    /// Whether the screening has not started yet at `now`
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.show_time > now
    }
}
