//! URL canonicalization and stable content hashing
//!
//! Two deliberately distinct dedup keys live here:
//!
//! - `item_hash`: fingerprint of the *normalized locator* embedded in a
//!   reclamation's details. Keys the Safe-Item Registry and the
//!   pending-reclamation gate.
//! - `details_hash`: fingerprint of the *full opaque details payload*.
//!   Keys notification dedup, so two reclamations about the same URL with
//!   different evidence still produce separate alert entries.

use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

use crate::types::{Result, VerdictError};

/// Normalize a raw item locator into its canonical form.
///
/// Parses as a URL, strips query string and fragment, strips trailing
/// slashes from the path, and re-serializes scheme + authority + path.
/// URLs differing only in query/fragment/trailing slash normalize
/// identically.
pub fn normalize_locator(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VerdictError::InvalidLocator("empty locator".to_string()));
    }

    let parsed = Url::parse(trimmed)
        .map_err(|e| VerdictError::InvalidLocator(format!("{}: {}", trimmed, e)))?;

    // Opaque URLs (mailto:, data:) carry no authority and cannot key a registry entry
    if parsed.cannot_be_a_base() || !parsed.has_host() {
        return Err(VerdictError::InvalidLocator(format!(
            "locator has no authority: {}",
            trimmed
        )));
    }

    let authority = parsed.authority();
    if authority.is_empty() {
        return Err(VerdictError::InvalidLocator(format!(
            "locator has no authority: {}",
            trimmed
        )));
    }

    let path = parsed.path().trim_end_matches('/');

    Ok(format!("{}://{}{}", parsed.scheme(), authority, path))
}

/// Stable hash key for a normalized locator.
///
/// SHA-256 over the UTF-8 bytes of the fixed-shape canonical representation
/// `{"url":"<normalized>"}`, hex-encoded.
pub fn item_hash(raw_locator: &str) -> Result<String> {
    let normalized = normalize_locator(raw_locator)?;
    let canonical = serde_json::json!({ "url": normalized }).to_string();
    Ok(sha256_hex(canonical.as_bytes()))
}

/// Stable hash of an opaque details payload (notification dedup key)
pub fn details_hash(details: &str) -> String {
    sha256_hex(details.as_bytes())
}

/// Recover the item locator embedded in a details payload.
///
/// When the payload parses as a JSON object the `"url"` field is the
/// locator; otherwise the raw string itself is treated as the locator.
pub fn extract_locator(details: &str) -> Result<String> {
    match serde_json::from_str::<Value>(details) {
        Ok(Value::Object(map)) => match map.get("url").and_then(Value::as_str) {
            Some(url) => Ok(url.to_string()),
            None => Err(VerdictError::InvalidLocator(
                "details payload has no \"url\" field".to_string(),
            )),
        },
        Ok(Value::String(s)) => Ok(s),
        _ => Ok(details.trim().to_string()),
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
