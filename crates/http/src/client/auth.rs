//! Account and session client methods

use super::{ApiRequest, CinemaClient, ClientError};
use crate::types::{LoginRequest, LoginResponse, MessageResponse, RegisterRequest};
use cinema_core::{Session, validation};
use tracing::info;

impl CinemaClient {
    /// Sign in and store the returned session
    ///
    /// The server also sets the refresh cookie, which the client's cookie jar
    /// keeps for later refreshes.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        validation::validate_login(email, password)?;

        let request = ApiRequest::post("/auth/login").json(&LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        })?;
        let response: LoginResponse = self.send(&request).await?;

        let session = Session::new(response.access_token).with_user(
            response.user_id,
            response.email,
            response.name,
        );
        self.session.set(session.clone())?;

        info!(user_id = response.user_id, "logged in");
        Ok(session)
    }

    /// Create an account
    ///
    /// `confirm_password` is compared with `password` locally when given.
    /// Returns the server's acknowledgement message.
    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
        confirm_password: Option<&str>,
    ) -> Result<String, ClientError> {
        validation::validate_registration(full_name, email, password, confirm_password)?;

        let request = ApiRequest::post("/auth/register").json(&RegisterRequest {
            full_name: full_name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        })?;
        let value = self.send_value(&request).await?;
        let response: MessageResponse = serde_json::from_value(value).unwrap_or_default();

        info!(email = %email.trim(), "registered account");
        Ok(response.message)
    }

    /// Explicitly refresh the access token
    ///
    /// Joins a refresh already in flight. A failed refresh ends the session.
    pub async fn refresh_session(&self) -> Result<(), ClientError> {
        self.refresh_access_token()
            .await
            .map(|_| ())
            .map_err(|err| ClientError::Unauthenticated(err.to_string()))
    }

    /// Forget the local session
    pub fn logout(&self) -> Result<(), ClientError> {
        self.session.clear()?;
        info!("logged out");
        Ok(())
    }

    /// The signed-in user's session, if any
    pub fn current_session(&self) -> Option<Session> {
        self.session.get()
    }
}
