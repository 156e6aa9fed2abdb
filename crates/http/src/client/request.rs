//! Replayable request descriptors

use super::ClientError;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

/// Everything needed to issue (and re-issue) one API call
///
/// The descriptor is plain data: after a token refresh the client sends the
/// same value again with the new bearer token.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, including any query string
    pub path: String,
    pub body: Option<Value>,
    /// Attach the session's bearer token and refresh it on 401
    pub requires_auth: bool,
}

impl ApiRequest {
    /// Create a public request without a body
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            requires_auth: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Mark the request as requiring the session's bearer token
    #[must_use]
    pub const fn authenticated(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Attach a JSON body
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ClientError::Validation(format!("request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Append a query parameter to the path
    #[must_use]
    pub fn query(mut self, key: &str, value: impl std::fmt::Display) -> Self {
        let separator = if self.path.contains('?') { '&' } else { '?' };
        let encoded: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(key, &value.to_string())
            .finish();
        self.path = format!("{}{separator}{encoded}", self.path);
        self
    }
}
