//! Auth configuration and credential types

use chrono::{DateTime, Utc};
use std::fmt;

/// Default Microsoft identity platform host
pub const DEFAULT_LOGIN_HOST: &str = "https://login.microsoftonline.com";

/// Default scope for the Graph API
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Authentication configuration (secrets already resolved)
#[derive(Clone)]
pub enum AuthConfig {
    /// OAuth2 Client Credentials flow
    ClientCredentials {
        /// Token endpoint URL
        token_url: String,
        /// Client ID
        client_id: String,
        /// Client secret
        client_secret: String,
        /// Requested scopes
        scopes: Vec<String>,
    },

    /// A fixed bearer token, handed out unchanged on every request
    Bearer {
        /// The bearer token
        token: String,
    },
}

impl AuthConfig {
    /// Client credentials against a tenant's v2.0 token endpoint
    pub fn client_credentials(
        login_host: &str,
        tenant_id: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self::ClientCredentials {
            token_url: token_endpoint(login_host, tenant_id),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientCredentials {
                token_url,
                client_id,
                scopes,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("token_url", token_url)
                .field("client_id", client_id)
                .field("scopes", scopes)
                .finish_non_exhaustive(),
            Self::Bearer { .. } => f.debug_struct("Bearer").finish_non_exhaustive(),
        }
    }
}

/// Build the v2.0 token endpoint for a tenant
pub fn token_endpoint(login_host: &str, tenant_id: &str) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        login_host.trim_end_matches('/'),
        tenant_id.trim_matches('/')
    )
}

/// Bearer token for the collection endpoint
///
/// Acquired once per page and dropped after that page's fetch.
#[derive(Clone)]
pub struct AccessCredential {
    token: String,
    acquired_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessCredential {
    /// Create a credential with no known expiry
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            acquired_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Create a credential that expires in N seconds from now
    pub fn expires_in(token: impl Into<String>, seconds: i64) -> Self {
        let acquired_at = Utc::now();
        Self {
            token: token.into(),
            acquired_at,
            expires_at: Some(acquired_at + chrono::Duration::seconds(seconds)),
        }
    }

    /// The bearer token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the token was handed out
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Reported expiry, if the token endpoint gave one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessCredential")
            .field("acquired_at", &self.acquired_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
