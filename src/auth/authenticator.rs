//! Token provider implementation
//!
//! Fetches a fresh access token on every call. There is no caching: the
//! paginator asks for a new credential before each page.

use super::types::{AccessCredential, AuthConfig};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Source of access credentials
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Acquire a credential for the next request
    async fn get_token(&self) -> Result<AccessCredential>;
}

/// Authenticator that exchanges configured secrets for bearer tokens
pub struct Authenticator {
    /// Auth configuration
    config: AuthConfig,
    /// HTTP client for token requests
    http_client: Client,
}

impl Authenticator {
    /// Create a new authenticator with the given config
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            http_client: Client::new(),
        }
    }

    /// Create an authenticator with a custom HTTP client
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    /// Get the current auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Fetch OAuth2 token using client credentials flow
    async fn fetch_client_credentials(
        &self,
        token_url: &str,
        client_id: &str,
        client_secret: &str,
        scopes: &[String],
    ) -> Result<AccessCredential> {
        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            ("client_id", client_id.to_string()),
            ("client_secret", client_secret.to_string()),
        ];

        if !scopes.is_empty() {
            form.push(("scope", scopes.join(" ")));
        }

        let response = self
            .http_client
            .post(token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::auth(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::auth(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            return Err(Error::OAuth2 {
                message: format!("Token request failed with status {}: {body}", status.as_u16()),
            });
        }

        let token_response: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            Error::OAuth2 {
                message: format!("Unusable token response: {e}"),
            }
        })?;
        token_response.into_credential()
    }
}

#[async_trait]
impl TokenProvider for Authenticator {
    async fn get_token(&self) -> Result<AccessCredential> {
        match &self.config {
            AuthConfig::ClientCredentials {
                token_url,
                client_id,
                client_secret,
                scopes,
            } => {
                let credential = self
                    .fetch_client_credentials(token_url, client_id, client_secret, scopes)
                    .await?;
                debug!(expires_at = ?credential.expires_at(), "Acquired access token");
                Ok(credential)
            }
            AuthConfig::Bearer { token } => Ok(AccessCredential::new(token.clone())),
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// OAuth2 token response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_credential(self) -> Result<AccessCredential> {
        if self.access_token.is_empty() {
            return Err(Error::auth("token response carried an empty access_token"));
        }
        Ok(match self.expires_in {
            Some(secs) => AccessCredential::expires_in(self.access_token, secs),
            None => AccessCredential::new(self.access_token),
        })
    }
}
