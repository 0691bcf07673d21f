//! Bearer token acquisition
//!
//! Every call to [`TokenManager::get_token`] performs a full login. Tokens
//! issued by the vendor are short-lived and their lifetime is not published,
//! so nothing is cached between steps.

use careflow_common::{Credentials, Error, Result};
use serde_json::Value;
use tracing::debug;

use crate::client::{ApiClient, ApiRequest};
use crate::endpoints;

/// Opaque bearer token
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    /// Short prefix that is safe to log
    pub fn preview(&self) -> String {
        let head: String = self.0.chars().take(12).collect();
        format!("{}...", head)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({})", self.preview())
    }
}

/// Performs the login round-trip
#[derive(Clone)]
pub struct TokenManager {
    client: ApiClient,
    credentials: Credentials,
}

impl TokenManager {
    pub fn new(client: ApiClient, credentials: Credentials) -> Self {
        Self { client, credentials }
    }

    /// Log in and return a fresh token.
    ///
    /// Transport failures come back as [`Error::Transport`] so callers may
    /// retry them. A non-200 status or a body without a token is
    /// [`Error::Auth`].
    pub async fn get_token(&self) -> Result<Credential> {
        let body = serde_json::json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
            "xTENANTID": self.client.tenant_id(),
        });

        let response = self
            .client
            .execute(ApiRequest::post(endpoints::LOGIN).json(body), None)
            .await?;

        if response.status != 200 {
            return Err(Error::Auth(format!(
                "login returned HTTP {}: {}",
                response.status,
                response.body_text()
            )));
        }

        let token = response
            .json()
            .and_then(extract_access_token)
            .ok_or_else(|| Error::Auth("login response has no access_token".into()))?;

        let credential = Credential::new(token);
        debug!("Obtained token {}", credential.preview());
        Ok(credential)
    }
}

fn extract_access_token(body: &Value) -> Option<String> {
    body.pointer("/data/access_token")
        .or_else(|| body.get("access_token"))
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
