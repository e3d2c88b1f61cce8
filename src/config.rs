//! Extraction configuration
//!
//! Loaded from a YAML or JSON file. `${VAR}` references inside string values
//! are replaced with environment variables after parsing, so secrets can
//! stay out of the file.

use crate::auth::{AuthConfig, DEFAULT_LOGIN_HOST, DEFAULT_SCOPE};
use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::output::DEFAULT_FILE_PREFIX;
use crate::pagination::{PageConfig, PaginatorConfig, RetryPolicy};
use crate::types::{JsonObject, JsonValue};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Regex for matching environment references: ${NAME}
static ENV_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env reference pattern is valid")
});

/// Default API host
pub const DEFAULT_API_BASE: &str = "https://graph.microsoft.com";

/// Default first request: directory users with the attributes the loader uses
pub const DEFAULT_INITIAL_PATH: &str = "/v1.0/users?$select=id,accountEnabled,userPrincipalName,displayName,surname,givenName,jobTitle,manager,state,country,mobilePhone";

/// Complete extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// API host; also the prefix stripped from next-page links
    pub api_base: String,

    /// Identity platform host for the token endpoint
    pub login_host: String,

    /// Directory tenant
    pub tenant_id: Option<String>,

    /// Explicit token endpoint (overrides login_host + tenant_id)
    pub token_url: Option<String>,

    /// OAuth2 client ID
    pub client_id: Option<String>,

    /// OAuth2 client secret
    pub client_secret: Option<String>,

    /// Pre-issued bearer token used instead of client credentials
    pub access_token: Option<String>,

    /// Requested scopes
    pub scopes: Vec<String>,

    /// First request path
    pub initial_path: String,

    /// Page layout
    pub page: PageConfig,

    /// Body re-read policy
    pub retry: RetryPolicy,

    /// Directory for row files
    pub output_dir: PathBuf,

    /// Row file name prefix
    pub file_prefix: String,

    /// Also write a JSON rendition of the row file
    pub emit_json: bool,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Optional request pacing
    pub rate_limit: Option<RateLimiterConfig>,

    /// Extra headers sent with every page request
    pub headers: HashMap<String, String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            login_host: DEFAULT_LOGIN_HOST.to_string(),
            tenant_id: None,
            token_url: None,
            client_id: None,
            client_secret: None,
            access_token: None,
            scopes: vec![DEFAULT_SCOPE.to_string()],
            initial_path: DEFAULT_INITIAL_PATH.to_string(),
            page: PageConfig::default(),
            retry: RetryPolicy::default(),
            output_dir: PathBuf::from("."),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            emit_json: false,
            timeout_secs: 120,
            rate_limit: None,
            headers: HashMap::new(),
        }
    }
}

impl ExtractConfig {
    /// Load from a file; `.json` parses as JSON, anything else as YAML
    ///
    /// `${VAR}` references in string values are replaced from the process
    /// environment. Comments are never expanded.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound {
                path: path.display().to_string(),
            },
            _ => Error::config(format!("Failed to read config file: {e}")),
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let lookup = |name: &str| std::env::var(name).ok();
        if is_json {
            Self::from_json_with_env(&content, lookup)
        } else {
            Self::from_yaml_with_env(&content, lookup)
        }
    }

    /// Parse YAML text (no environment expansion)
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON text (no environment expansion)
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML text, expanding `${VAR}` in string values via `lookup`
    pub fn from_yaml_with_env<F>(yaml: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let document: JsonValue = serde_yaml::from_str(yaml)?;
        Self::from_document(document, &lookup)
    }

    /// Parse JSON text, expanding `${VAR}` in string values via `lookup`
    pub fn from_json_with_env<F>(json: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let document: JsonValue = serde_json::from_str(json)?;
        Self::from_document(document, &lookup)
    }

    fn from_document<F>(mut document: JsonValue, lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // an empty YAML file is a null document
        if document.is_null() {
            document = JsonValue::Object(JsonObject::new());
        }
        expand_strings(&mut document, lookup)?;

        let config: Self = serde_json::from_value(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values that serde cannot
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api_base)
            .map_err(|e| Error::invalid_value("api_base", e.to_string()))?;

        if !self.initial_path.starts_with('/') {
            return Err(Error::invalid_value(
                "initial_path",
                "must be a path starting with '/'",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_value("retry.max_attempts", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(Error::invalid_value("timeout_secs", "must be at least 1"));
        }
        if self.file_prefix.is_empty() || self.file_prefix.contains(['/', '\\']) {
            return Err(Error::invalid_value(
                "file_prefix",
                "must be a non-empty file name",
            ));
        }
        if self.page.id_field.is_empty() {
            return Err(Error::invalid_value("page.id_field", "must not be empty"));
        }
        Ok(())
    }

    /// Token source for the run
    ///
    /// A configured `access_token` wins; otherwise client credentials are
    /// required along with `token_url` or `tenant_id`.
    pub fn auth_config(&self) -> Result<AuthConfig> {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Ok(AuthConfig::Bearer {
                token: token.clone(),
            });
        }

        let client_id = required(self.client_id.as_ref(), "client_id")?;
        let client_secret = required(self.client_secret.as_ref(), "client_secret")?;

        let token_url = match (&self.token_url, &self.tenant_id) {
            (Some(url), _) if !url.is_empty() => url.clone(),
            (_, Some(tenant)) if !tenant.is_empty() => {
                crate::auth::token_endpoint(&self.login_host, tenant)
            }
            _ => return Err(Error::missing_field("tenant_id")),
        };

        Ok(AuthConfig::ClientCredentials {
            token_url,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scopes: self.scopes.clone(),
        })
    }

    /// HTTP client settings for the collection endpoint
    pub fn http_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .base_url(&self.api_base)
            .timeout(Duration::from_secs(self.timeout_secs));
        if let Some(limit) = self.rate_limit {
            builder = builder.rate_limit(limit);
        }
        for (key, value) in &self.headers {
            builder = builder.header(key, value);
        }
        builder.build()
    }

    /// Paginator settings
    pub fn paginator_config(&self) -> PaginatorConfig {
        PaginatorConfig {
            api_base: self.api_base.clone(),
            page: self.page.clone(),
            retry: self.retry.clone(),
        }
    }
}

fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::missing_field(field))
}

fn expand_strings<F>(value: &mut JsonValue, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        JsonValue::String(text) if text.contains("${") => {
            *text = expand_env(text, lookup)?;
        }
        JsonValue::Array(items) => {
            for item in items {
                expand_strings(item, lookup)?;
            }
        }
        JsonValue::Object(fields) => {
            for field in fields.values_mut() {
                expand_strings(field, lookup)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Replace `${NAME}` references using `lookup`
///
/// An unset variable is an error; `$` without braces is left alone.
pub fn expand_env<F>(text: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = None;
    let expanded = ENV_REGEX.replace_all(text, |caps: &Captures<'_>| {
        let name = &caps[1];
        lookup(name).unwrap_or_else(|| {
            missing.get_or_insert_with(|| name.to_string());
            String::new()
        })
    });

    match missing {
        Some(name) => Err(Error::config(format!(
            "environment variable {name} is not set"
        ))),
        None => Ok(expanded.into_owned()),
    }
}
