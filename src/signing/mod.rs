//! OKX v5 request signing.
//!
//! Private endpoints require four headers:
//! - `OK-ACCESS-KEY`: the API key
//! - `OK-ACCESS-SIGN`: base64(HMAC-SHA256(secret, timestamp + METHOD + requestPath + body))
//! - `OK-ACCESS-TIMESTAMP`: ISO-8601 UTC with milliseconds
//! - `OK-ACCESS-PASSPHRASE`: the passphrase chosen when the key was created
//!
//! `requestPath` includes the query string for GET requests.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use crate::config::OkxCredentials;
use crate::error::TradingError;

type HmacSha256 = Hmac<Sha256>;

/// Current time in the format OKX expects, e.g. `2024-01-01T00:00:00.000Z`.
pub fn timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Compute the `OK-ACCESS-SIGN` value.
pub fn sign(
    secret: &str,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<String, TradingError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| TradingError::SigningError(format!("failed to init signer: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(method.to_uppercase().as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the authentication headers for one request.
pub fn auth_headers(
    credentials: &OkxCredentials,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<Vec<(&'static str, String)>, TradingError> {
    auth_headers_at(credentials, &timestamp(), method, request_path, body)
}

fn auth_headers_at(
    credentials: &OkxCredentials,
    timestamp: &str,
    method: &str,
    request_path: &str,
    body: &str,
) -> Result<Vec<(&'static str, String)>, TradingError> {
    let signature = sign(&credentials.secret, timestamp, method, request_path, body)?;

    debug!(method, request_path, "Signed request");

    let mut headers = vec![
        ("OK-ACCESS-KEY", credentials.api_key.clone()),
        ("OK-ACCESS-SIGN", signature),
        ("OK-ACCESS-TIMESTAMP", timestamp.to_string()),
        ("OK-ACCESS-PASSPHRASE", credentials.password.clone()),
    ];
    if credentials.simulated {
        headers.push(("x-simulated-trading", "1".to_string()));
    }
    Ok(headers)
}
