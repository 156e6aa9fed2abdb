//! Booking and ticket history (authenticated)

use super::{ApiRequest, CinemaClient, ClientError};
use crate::types::{BookRequest, Ticket};
use tracing::info;

impl CinemaClient {
    /// Book the given seats for the signed-in user
    ///
    /// The server books all seats or none; seats taken in the meantime
    /// surface as [`ClientError::Conflict`].
    pub async fn book_seats(&self, seat_ids: &[i64]) -> Result<(), ClientError> {
        if seat_ids.is_empty() {
            return Err(ClientError::Validation(
                "select at least one seat".to_string(),
            ));
        }

        let request = ApiRequest::post("/book")
            .json(&BookRequest {
                seats: seat_ids.to_vec(),
            })?
            .authenticated();
        self.send_value(&request).await?;

        info!(seats = ?seat_ids, "seats booked");
        Ok(())
    }

    /// Tickets booked by the signed-in user
    pub async fn my_tickets(&self) -> Result<Vec<Ticket>, ClientError> {
        let request = ApiRequest::get("/tickets").authenticated();
        let tickets: Option<Vec<Ticket>> = self.send(&request).await?;
        Ok(tickets.unwrap_or_default())
    }
}
