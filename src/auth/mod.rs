//! Authentication module
//!
//! Supports: OAuth2 client credentials, static bearer token
//!
//! The `Authenticator` hands out a freshly fetched `AccessCredential` on
//! every call; callers decide how often to ask.

mod authenticator;
mod types;

pub use authenticator::{Authenticator, TokenProvider};
pub use types::{
    token_endpoint, AccessCredential, AuthConfig, DEFAULT_LOGIN_HOST, DEFAULT_SCOPE,
};
