//! Source URL validation and object naming for captured documents.

use url::Url;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Only secure sources may be captured.
const REQUIRED_SCHEME: &str = "https";

/// Extension appended to every stored capture.
pub const CAPTURE_EXTENSION: &str = "pdf";

/// Content type served for downloads.
pub const CAPTURE_CONTENT_TYPE: &str = "application/pdf";

/// File stem used when the source URL has no usable path segment.
const FALLBACK_STEM: &str = "document";

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Parse and validate a capture source URL.
///
/// Rules:
/// - Must parse as an absolute URL.
/// - Scheme must be `https`.
/// - When `allowed_hosts` is non-empty, the host must be one of them
///   (case-insensitive).
pub fn validate_source_url(raw: &str, allowed_hosts: &[String]) -> Result<Url, CoreError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| CoreError::Validation(format!("Invalid URL '{raw}': {e}")))?;

    if url.scheme() != REQUIRED_SCHEME {
        return Err(CoreError::Validation(format!(
            "Invalid URL '{raw}': scheme must be {REQUIRED_SCHEME}"
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| CoreError::Validation(format!("Invalid URL '{raw}': missing host")))?;

    if !allowed_hosts.is_empty() && !allowed_hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
        return Err(CoreError::Validation(format!(
            "Invalid URL '{raw}': host '{host}' is not allowed"
        )));
    }

    Ok(url)
}

/// Validate that an owner key is usable as a path segment and map key.
pub fn validate_owner(owner: &str) -> Result<(), CoreError> {
    let owner = owner.trim();
    if owner.is_empty() {
        return Err(CoreError::Validation("Owner must not be empty".to_string()));
    }
    if owner == "." || owner == ".." || owner.contains('/') || owner.contains('\\') {
        return Err(CoreError::Validation(format!(
            "Owner '{owner}' must not contain path separators"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Object naming
// ---------------------------------------------------------------------------

/// Object-store path of the capture of `source_url` for `owner`:
/// `<owner>/<last path segment>.pdf`.
pub fn object_path(owner: &str, source_url: &str) -> String {
    let stem = Url::parse(source_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        })
        .unwrap_or_else(|| FALLBACK_STEM.to_string());

    format!("{owner}/{stem}.{CAPTURE_EXTENSION}")
}
