//! Cinema booking API client
//!
//! Every call goes through [`CinemaClient::send`], which guards
//! authenticated requests: a 401 on a call that carried the session's bearer
//! token triggers one shared token refresh (see [`refresh`]) followed by a
//! single replay of the same [`ApiRequest`]. The refresh credential itself is
//! an HTTP-only cookie kept by the client's cookie jar and never surfaces in
//! this API.

pub mod auth;
pub mod booking;
pub mod catalog;
pub mod config;
pub mod error;
pub mod refresh;
pub mod request;

pub use config::ClientConfig;
pub use error::ClientError;
pub use refresh::{RefreshCoordinator, RefreshError, RefreshHandle, RefreshResult};
pub use request::ApiRequest;

use crate::types::RefreshResponse;
use cinema_core::{MemorySessionStore, SessionStore};
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Header carrying the static client API key
pub const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Endpoint minting a new access token from the refresh cookie
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback invoked when the session ends because authentication failed
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Cinema API client
#[derive(Clone)]
pub struct CinemaClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
    refresh: RefreshCoordinator,
    on_session_expired: Option<SessionExpiredHook>,
}

impl CinemaClient {
    /// Create a new client with default configuration
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a new client builder
    pub fn builder() -> CinemaClientBuilder {
        CinemaClientBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The session store this client reads tokens from
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// The refresh coordinator shared by this client's clones
    pub const fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    /// Whether a session token is present
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Execute a request and decode its body
    ///
    /// A `{"response": ...}` envelope around the body is unwrapped first.
    pub async fn send<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ClientError> {
        let (status, value) = self.execute(request).await?;
        serde_json::from_value(value).map_err(|e| ClientError::invalid_response(status, e))
    }

    /// Execute a request and return its body as raw JSON
    ///
    /// Empty bodies become `null`, non-JSON bodies a JSON string.
    pub async fn send_value(&self, request: &ApiRequest) -> Result<Value, ClientError> {
        self.execute(request).await.map(|(_, value)| value)
    }

    async fn execute(&self, request: &ApiRequest) -> Result<(StatusCode, Value), ClientError> {
        let sent_token = if request.requires_auth {
            self.session.access_token()
        } else {
            None
        };

        let response = self.dispatch(request, sent_token.as_deref()).await?;

        if !(request.requires_auth && response.status() == StatusCode::UNAUTHORIZED) {
            return read_response(response).await;
        }

        debug!(
            method = %request.method,
            path = %request.path,
            "access token rejected"
        );

        // A refresh that finished while this request was in flight already
        // produced a usable token.
        let retry_token = match (sent_token.as_deref(), self.session.access_token()) {
            (sent, Some(current)) if sent != Some(current.as_str()) => {
                debug!("session token changed while request was in flight");
                current
            }
            // Another caller's refresh already failed and ended the session
            (Some(_), None) => {
                return Err(ClientError::Unauthenticated("session expired".to_string()));
            }
            _ => self
                .refresh_access_token()
                .await
                .map_err(|err| ClientError::Unauthenticated(err.to_string()))?,
        };

        let retry = self.dispatch(request, Some(&retry_token)).await?;

        if retry.status() == StatusCode::UNAUTHORIZED {
            let body = retry.text().await.unwrap_or_default();
            warn!(path = %request.path, "request rejected again after token refresh");
            self.end_session();
            return Err(ClientError::Unauthenticated(error_message(
                StatusCode::UNAUTHORIZED,
                &body,
            )));
        }

        read_response(retry).await
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path));

        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!(
            method = %request.method,
            path = %request.path,
            authenticated = token.is_some(),
            "sending request"
        );

        Ok(builder.send().await?)
    }

    /// Obtain a new access token, joining any refresh already in flight
    ///
    /// On failure the session is cleared and the session-expired hook runs,
    /// once per refresh regardless of how many callers were waiting. The
    /// outcome is also applied to this client's store, which differs from
    /// the refreshing client's store when a coordinator is shared.
    pub async fn refresh_access_token(&self) -> RefreshResult {
        let client = self.clone();
        let result = self
            .refresh
            .begin_or_join(move || async move {
                let result = client.request_new_access_token().await;
                match &result {
                    Ok(_) => info!("access token refreshed"),
                    Err(err) => {
                        warn!(error = %err, "token refresh failed, ending session");
                        client.end_session();
                    }
                }
                result
            })
            .await;

        self.adopt_refresh_outcome(&result);
        result
    }

    fn adopt_refresh_outcome(&self, result: &RefreshResult) {
        match result {
            Ok(token) => {
                if self.session.access_token().as_deref() != Some(token.as_str())
                    && let Err(err) = self.session.set_access_token(token)
                {
                    warn!(error = %err, "failed to store refreshed access token");
                }
            }
            Err(_) => {
                if self.session.get().is_some()
                    && let Err(err) = self.session.clear()
                {
                    warn!(error = %err, "failed to clear session");
                }
            }
        }
    }

    async fn request_new_access_token(&self) -> RefreshResult {
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .send()
            .await
            .map_err(|e| RefreshError::Failed(ClientError::from(e).to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(RefreshError::Rejected);
        }

        let body = response
            .text()
            .await
            .map_err(|e| RefreshError::Failed(ClientError::from(e).to_string()))?;

        if !status.is_success() {
            return Err(RefreshError::Failed(error_message(status, &body)));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| RefreshError::Failed(format!("invalid refresh response: {e}")))?;
        let refreshed: RefreshResponse = serde_json::from_value(unwrap_envelope(value))
            .map_err(|e| RefreshError::Failed(format!("invalid refresh response: {e}")))?;

        let token = refreshed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| RefreshError::Failed("no access token in refresh response".into()))?;

        self.session
            .set_access_token(&token)
            .map_err(|e| RefreshError::Failed(e.to_string()))?;

        Ok(token)
    }

    /// Clear the session and tell the listener the user must sign in again
    ///
    /// The listener only runs when there was a session to lose.
    fn end_session(&self) {
        let had_session = self.session.get().is_some();
        if let Err(err) = self.session.clear() {
            warn!(error = %err, "failed to clear session");
        }
        if had_session && let Some(hook) = &self.on_session_expired {
            hook();
        }
    }
}

impl std::fmt::Debug for CinemaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CinemaClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.is_authenticated())
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

async fn read_response(response: Response) -> Result<(StatusCode, Value), ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = error_message(status, &body);
        debug!(status = status.as_u16(), %message, "request failed");
        return Err(ClientError::from_status(status, message));
    }

    if body.trim().is_empty() {
        return Ok((status, Value::Null));
    }

    let value = match serde_json::from_str::<Value>(&body) {
        Ok(value) => unwrap_envelope(value),
        Err(_) => Value::String(body),
    };
    Ok((status, value))
}

/// Strip the `{"response": ...}` wrapper the API adds to some payloads
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("response") => {
            map.remove("response").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Human readable message from an error response body
///
/// Looks at `error` (a string, or an object of per-field messages) and then
/// `message`, falling back to the raw body and finally the status reason.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        match map.get("error") {
            Some(Value::String(message)) if !message.is_empty() => return message.clone(),
            Some(Value::Object(fields)) => {
                let joined = fields
                    .values()
                    .map(|value| match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return if joined.is_empty() {
                    "invalid input".to_string()
                } else {
                    joined
                };
            }
            _ => {}
        }

        if let Some(Value::String(message)) = map.get("message")
            && !message.is_empty()
        {
            return message.clone();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        trimmed.to_string()
    }
}

/// Builder for [`CinemaClient`]
#[derive(Default)]
pub struct CinemaClientBuilder {
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    session: Option<Arc<dyn SessionStore>>,
    refresh: Option<RefreshCoordinator>,
    cookie_jar: Option<Arc<Jar>>,
    on_session_expired: Option<SessionExpiredHook>,
}

impl CinemaClientBuilder {
    /// Start from loaded configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut builder = Self::default()
            .base_url(&config.base_url)
            .timeout(Duration::from_secs(config.timeout_secs));
        if let Some(api_key) = &config.api_key {
            builder = builder.api_key(api_key);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent);
        }
        builder
    }

    /// Set the base URL
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the API key sent with every request
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use `store` for the session instead of an in-memory one
    #[must_use]
    pub fn session_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.session = Some(store);
        self
    }

    /// Share refresh state with other clients
    #[must_use]
    pub fn refresh_coordinator(mut self, coordinator: RefreshCoordinator) -> Self {
        self.refresh = Some(coordinator);
        self
    }

    /// Keep cookies (including the refresh cookie) in `jar`
    #[must_use]
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.cookie_jar = Some(jar);
        self
    }

    /// Run `hook` whenever the session ends because authentication failed
    #[must_use]
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    /// Build the client
    pub fn build(self) -> Result<CinemaClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        if let Some(api_key) = &self.api_key {
            let mut value = HeaderValue::from_str(api_key).map_err(|_| {
                ClientError::Configuration("api_key contains invalid characters".into())
            })?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| concat!("cinema-client/", env!("CARGO_PKG_VERSION")).to_string());

        let mut client_builder = ClientBuilder::new()
            .default_headers(headers)
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .user_agent(user_agent);

        client_builder = match self.cookie_jar {
            Some(jar) => client_builder.cookie_provider(jar),
            None => client_builder.cookie_store(true),
        };

        let client = client_builder
            .build()
            .map_err(|e| ClientError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(CinemaClient {
            client,
            base_url,
            session: self
                .session
                .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
            refresh: self.refresh.unwrap_or_default(),
            on_session_expired: self.on_session_expired,
        })
    }
}
