//! Conditional-request helpers
//!
//! ETag list matching, `if-range` validation, and HTTP date formatting.
//! Final 304 evaluation belongs to the host; these helpers exist so it can
//! compute its verdict from a prepared response descriptor.

use chrono::{DateTime, Utc};
use std::time::SystemTime;

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a timestamp in the standard HTTP date format
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE_FORMAT).to_string()
}

/// Check a client ETag list (`if-none-match` style) against a quoted ETag.
///
/// Supports single tags, comma-separated lists, and the `*` wildcard.
pub fn etag_matches(header: Option<&str>, etag: &str) -> bool {
    header.is_some_and(|client| {
        client
            .split(',')
            .any(|candidate| candidate.trim() == etag || candidate.trim() == "*")
    })
}

/// Validate an `if-range` precondition.
///
/// A quoted value is compared against the current ETag (weak tags never
/// match); anything else is treated as an HTTP date and must equal the
/// current `last-modified` exactly. A missing header always validates.
pub fn if_range_matches(header: Option<&str>, etag: Option<&str>, last_modified: &str) -> bool {
    let Some(value) = header else {
        return true;
    };
    let value = value.trim();
    if value.starts_with("W/") {
        return false;
    }
    if value.starts_with('"') {
        return etag == Some(value);
    }
    value == last_modified
}

/// Host-side 304 evaluation from the prepared ETag and modification time.
///
/// `if-none-match` takes precedence over `if-modified-since` when both are
/// present, per the usual precondition ordering.
pub fn not_modified(
    if_none_match: Option<&str>,
    if_modified_since: Option<&str>,
    etag: Option<&str>,
    modified: SystemTime,
) -> bool {
    if if_none_match.is_some() {
        return match etag {
            Some(etag) => etag_matches(if_none_match, etag),
            None => false,
        };
    }
    let Some(since) = if_modified_since else {
        return false;
    };
    let Ok(since) = DateTime::parse_from_rfc2822(&since.replace("GMT", "+0000")) else {
        return false;
    };
    let modified = DateTime::<Utc>::from(modified);
    // HTTP dates carry whole seconds only
    modified.timestamp() <= since.timestamp()
}
