//! Public catalogue: movies, showtimes and seat maps

use super::{ApiRequest, CinemaClient, ClientError};
use crate::types::{Movie, Seat, Show};

impl CinemaClient {
    /// List all movies
    pub async fn list_movies(&self) -> Result<Vec<Movie>, ClientError> {
        let movies: Option<Vec<Movie>> = self.send(&ApiRequest::get("/movies")).await?;
        Ok(movies.unwrap_or_default())
    }

    /// List showtimes of a movie
    pub async fn list_shows(&self, movie_id: i64) -> Result<Vec<Show>, ClientError> {
        let request = ApiRequest::get("/shows").query("movie_id", movie_id);
        let shows: Option<Vec<Show>> = self.send(&request).await?;
        Ok(shows.unwrap_or_default())
    }

    /// Seat map of a show
    pub async fn list_seats(&self, show_id: i64) -> Result<Vec<Seat>, ClientError> {
        let request = ApiRequest::get("/seats").query("show_id", show_id);
        let seats: Option<Vec<Seat>> = self.send(&request).await?;
        Ok(seats.unwrap_or_default())
    }
}
