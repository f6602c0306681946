//! OAuth session held in an integration's credentials.
//!
//! Credential keys: `access_token`, `refresh_token`, `expires_at` (RFC 3339)
//! and an optional `token_uri` overriding the configured token endpoint.
//! Unknown keys are carried through rotation untouched.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use workmate_core::error::{WorkmateError, WorkmateResult};
use workmate_core::model::Credentials;

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Google usually omits this on refresh
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Session {
    credentials: Credentials,
}

impl Session {
    pub fn new(credentials: Credentials) -> Self {
        Session { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn access_token(&self) -> WorkmateResult<&str> {
        self.credentials
            .get_str("access_token")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                WorkmateError::Authentication("No Google access token stored".into())
            })
    }

    pub fn refresh_token(&self) -> WorkmateResult<&str> {
        self.credentials
            .get_str("refresh_token")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                WorkmateError::Authentication(
                    "No refresh token stored. Reconnect the Google account".into(),
                )
            })
    }

    pub fn token_uri(&self) -> Option<&str> {
        self.credentials.get_str("token_uri")
    }

    fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.credentials
            .get_str("expires_at")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// A token without a recorded expiry is assumed valid until the API
    /// rejects it.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        if self.access_token().is_err() {
            return true;
        }
        self.expires_at().is_some_and(|expires_at| now >= expires_at)
    }

    pub fn apply(&mut self, tokens: TokenResponse, now: DateTime<Utc>) {
        self.credentials.set("access_token", tokens.access_token);
        if let Some(refresh_token) = tokens.refresh_token.filter(|t| !t.is_empty()) {
            self.credentials.set("refresh_token", refresh_token);
        }
        let expires_at = tokens
            .expires_in
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        if let Some(expires_at) = expires_at {
            self.credentials.set("expires_at", expires_at.to_rfc3339());
        }
    }
}
