//! Next-page cursor normalization
//!
//! The collection endpoint returns the next page as an absolute URL on the
//! API host. Requests are issued by path, so the host prefix is removed.

use crate::error::{Error, Result};
use url::Url;

/// Reduce an absolute next-page URL to a request path
///
/// The path and query string are kept verbatim when the link starts with
/// `api_base`. Links on the same host under a different scheme or spelling
/// are reduced via URL parsing. Links to another host are rejected.
pub fn normalize_cursor(next_link: &str, api_base: &str) -> Result<String> {
    let base = api_base.trim_end_matches('/');

    if let Some(rest) = next_link.strip_prefix(base) {
        if rest.is_empty() {
            return Ok("/".to_string());
        }
        if rest.starts_with('/') || rest.starts_with('?') {
            return Ok(ensure_leading_slash(rest));
        }
    }

    if next_link.starts_with('/') {
        return Ok(next_link.to_string());
    }

    let link = Url::parse(next_link)?;
    let expected = Url::parse(base)?;

    if !link
        .host_str()
        .zip(expected.host_str())
        .is_some_and(|(a, b)| a.eq_ignore_ascii_case(b))
    {
        return Err(Error::malformed(format!(
            "next page link {next_link} is not on {base}"
        )));
    }

    let mut path = link.path().to_string();
    if let Some(query) = link.query() {
        path.push('?');
        path.push_str(query);
    }
    Ok(path)
}

fn ensure_leading_slash(rest: &str) -> String {
    if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{rest}")
    }
}
