//! Username/password exchange for an access token

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{Error, GitHubClient, Result};

/// Basic-auth credentials supplied by the user
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
struct AuthorizationRequest {
    note: String,
}

#[derive(Deserialize)]
struct AuthorizationResponse {
    token: String,
}

/// Note attached to the created authorization, unique per second
pub fn authorization_note(now: SystemTime) -> String {
    let secs = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("gh-backup_{}", secs)
}

impl GitHubClient {
    /// Exchange `credentials` for an access token
    ///
    /// Only HTTP 201 counts as success; any other status is an auth error.
    pub async fn exchange_credentials(&self, credentials: &Credentials) -> Result<String> {
        let url = self.endpoint(&["authorizations"]);
        let url_str = url.to_string();
        let body = AuthorizationRequest {
            note: authorization_note(SystemTime::now()),
        };

        debug!(url = %url_str, username = %credentials.username, "Requesting access token");

        let response = self
            .request(self.http().post(url))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&url_str, e))?;

        let status = response.status();
        if status != reqwest::StatusCode::CREATED {
            return Err(Error::Auth {
                status: status.as_u16(),
                url: url_str,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(&url_str, e))?;
        let parsed: AuthorizationResponse =
            serde_json::from_str(&text).map_err(|e| Error::Parse {
                url: url_str.clone(),
                message: e.to_string(),
            })?;

        info!(username = %credentials.username, "Obtained access token");
        Ok(parsed.token)
    }
}
