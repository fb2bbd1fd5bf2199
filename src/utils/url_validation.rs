//! URL validation for configured endpoints
//!
//! Session and negotiation endpoints carry credentials (a server-side key or an
//! ephemeral client secret), so they must be HTTPS. Plain HTTP is accepted only
//! for loopback hosts and only when explicitly allowed for local development.

use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur during URL validation
#[derive(Debug, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL format: {0}")]
    InvalidFormat(#[from] url::ParseError),

    #[error("URL scheme must be HTTPS, got: {0}")]
    HttpsRequired(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("Plain HTTP is only allowed for loopback hosts, got: {0}")]
    InsecureRemoteHost(String),
}

/// Checks whether a URL host is the local machine.
pub fn is_loopback_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(ip) => IpAddr::V4(*ip).is_loopback(),
        Host::Ipv6(ip) => IpAddr::V6(*ip).is_loopback(),
    }
}

/// Validates an endpoint URL.
///
/// # Arguments
/// * `url` - The endpoint to validate
/// * `allow_insecure_localhost` - Accept `http://` for loopback hosts
///
/// # Returns
/// * `Ok(Url)` - The parsed URL
/// * `Err(UrlValidationError)` - If the URL is malformed or not secure enough
pub fn validate_endpoint_url(
    url: &str,
    allow_insecure_localhost: bool,
) -> Result<Url, UrlValidationError> {
    let parsed = Url::parse(url)?;
    let host = parsed.host().ok_or(UrlValidationError::MissingHost)?;

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if allow_insecure_localhost => {
            if is_loopback_host(&host) {
                Ok(parsed)
            } else {
                Err(UrlValidationError::InsecureRemoteHost(host.to_string()))
            }
        }
        other => Err(UrlValidationError::HttpsRequired(other.to_string())),
    }
}
