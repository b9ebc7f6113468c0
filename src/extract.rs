//! Version token extraction primitives.
//!
//! Each function pulls a raw version token out of one part of a request and
//! borrows from its input. An empty token is reported as `None`, never as
//! an empty string, so callers can treat "present but blank" the same as
//! "absent".

use http::HeaderMap;

/// Placeholder marking the version position in path and media-type patterns.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Errors produced while parsing a `{version}` pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern is missing the {{version}} placeholder")]
    MissingPlaceholder,

    #[error("pattern starts with the {{version}} placeholder")]
    PlaceholderAtStart,
}

/// A pattern split around its `{version}` placeholder.
///
/// `"/v{version}/"` yields prefix `"/v"` and suffix `"/"`;
/// `"application/vnd.api.{version}+json"` yields prefix
/// `"application/vnd.api."` and suffix `"+json"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPattern {
    pattern: String,
    prefix: String,
    suffix: String,
}

impl VersionPattern {
    /// Parse a pattern, pre-extracting the text around the placeholder.
    ///
    /// The prefix must be non-empty: it is what discriminates a versioned
    /// path or media type from any other one.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let start = pattern
            .find(VERSION_PLACEHOLDER)
            .ok_or(PatternError::MissingPlaceholder)?;
        if start == 0 {
            return Err(PatternError::PlaceholderAtStart);
        }

        Ok(Self {
            pattern: pattern.to_string(),
            prefix: pattern[..start].to_string(),
            suffix: pattern[start + VERSION_PLACEHOLDER.len()..].to_string(),
        })
    }

    /// The pattern as configured.
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Literal text before the placeholder.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Literal text after the placeholder (may be empty).
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Whether path candidates should also be tried in `"v" + segment` form.
    pub fn joins_v(&self) -> bool {
        self.prefix.ends_with('v')
    }
}

fn non_empty(token: &str) -> Option<&str> {
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Find `name=` in a raw, undecoded query string.
///
/// The parameter must start the query or follow a `&`, so searching for `v`
/// never matches inside `version=v2`. The first occurrence wins.
pub fn from_query<'a>(query: &'a str, name: &str) -> Option<&'a str> {
    if name.is_empty() {
        return None;
    }

    let query = query.strip_prefix('?').unwrap_or(query);
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(name)?.strip_prefix('='))
        .and_then(non_empty)
}

/// Look up a header value; the first value wins when the header repeats.
///
/// Header names are case-insensitive. Values that are not visible ASCII
/// are ignored rather than lossily converted.
pub fn from_headers<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    if name.is_empty() {
        return None;
    }

    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .and_then(non_empty)
}

/// Take the path segment that directly follows `prefix`.
///
/// `from_path("/v2/users", "/v")` is `Some("2")`.
pub fn from_path<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }

    let rest = path.strip_prefix(prefix)?;
    let end = rest.find('/').unwrap_or(rest.len());
    non_empty(&rest[..end])
}

/// Scan the comma-separated media types of an `Accept` value for the first
/// one shaped like `prefix{version}suffix`.
///
/// With an empty suffix the token ends at the first `;` or `,`, so
/// `application/vnd.api.v2; q=0.9` still yields `v2`.
pub fn from_accept<'a>(accept: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }

    for media_type in accept.split(',') {
        let Some(rest) = media_type.trim().strip_prefix(prefix) else {
            continue;
        };

        let token = if suffix.is_empty() {
            let end = rest.find([';', ',']).unwrap_or(rest.len());
            &rest[..end]
        } else {
            match rest.find(suffix) {
                Some(end) => &rest[..end],
                None => continue,
            }
        };

        let token = token.trim();
        if token.contains(';') || token.contains(char::is_whitespace) {
            continue;
        }
        if let Some(version) = non_empty(token) {
            return Some(version);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_pattern() {
        let pattern = VersionPattern::parse("/v{version}/").unwrap();
        assert_eq!(pattern.prefix(), "/v");
        assert_eq!(pattern.suffix(), "/");
        assert!(pattern.joins_v());

        let pattern = VersionPattern::parse("application/vnd.api.{version}+json").unwrap();
        assert_eq!(pattern.prefix(), "application/vnd.api.");
        assert_eq!(pattern.suffix(), "+json");
        assert!(!pattern.joins_v());
    }

    #[test]
    fn test_parse_pattern_errors() {
        assert_eq!(
            VersionPattern::parse("/api/"),
            Err(PatternError::MissingPlaceholder)
        );
        assert_eq!(
            VersionPattern::parse("{version}/users"),
            Err(PatternError::PlaceholderAtStart)
        );
    }

    #[test]
    fn test_query_anchoring() {
        assert_eq!(from_query("v=v2", "v"), Some("v2"));
        assert_eq!(from_query("page=1&v=v3&x=y", "v"), Some("v3"));
        assert_eq!(from_query("?v=v2", "v"), Some("v2"));
        assert_eq!(from_query("version=v9", "v"), None);
        assert_eq!(from_query("xv=v9", "v"), None);
        assert_eq!(from_query("version=v9&v=v4", "v"), Some("v4"));
    }

    #[test]
    fn test_query_empty_and_missing() {
        assert_eq!(from_query("v=", "v"), None);
        assert_eq!(from_query("v", "v"), None);
        assert_eq!(from_query("", "v"), None);
        assert_eq!(from_query("v=v2", ""), None);
    }

    #[test]
    fn test_header_lookup() {
        let mut headers = HeaderMap::new();
        headers.append("x-api-version", HeaderValue::from_static(" v2 "));
        headers.append("x-api-version", HeaderValue::from_static("v3"));

        assert_eq!(from_headers(&headers, "X-API-Version"), Some("v2"));
        assert_eq!(from_headers(&headers, "X-Other"), None);
        assert_eq!(from_headers(&headers, "not a header name"), None);
    }

    #[test]
    fn test_header_rejects_opaque_bytes() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-version",
            HeaderValue::from_bytes("v\u{e9}".as_bytes()).unwrap(),
        );
        assert_eq!(from_headers(&headers, "x-api-version"), None);

        headers.insert("x-api-version", HeaderValue::from_static("   "));
        assert_eq!(from_headers(&headers, "x-api-version"), None);
    }

    #[test]
    fn test_path_segment() {
        assert_eq!(from_path("/v2/users", "/v"), Some("2"));
        assert_eq!(from_path("/v2", "/v"), Some("2"));
        assert_eq!(from_path("/api/v10/orders/7", "/api/v"), Some("10"));
        assert_eq!(from_path("/v/users", "/v"), None);
        assert_eq!(from_path("/users", "/v"), None);
        assert_eq!(from_path("", "/v"), None);
    }

    #[test]
    fn test_accept_with_suffix() {
        let prefix = "application/vnd.api.";
        assert_eq!(
            from_accept("application/vnd.api.v2+json", prefix, "+json"),
            Some("v2")
        );
        assert_eq!(
            from_accept(
                "text/html, application/vnd.api.v3+json;q=0.9",
                prefix,
                "+json"
            ),
            Some("v3")
        );
        assert_eq!(from_accept("application/json", prefix, "+json"), None);
    }

    #[test]
    fn test_accept_without_suffix() {
        let prefix = "application/vnd.api.";
        assert_eq!(
            from_accept("application/vnd.api.v2; q=0.8", prefix, ""),
            Some("v2")
        );
        assert_eq!(
            from_accept("application/json; version=3", "application/json; version=", ""),
            Some("3")
        );
    }

    #[test]
    fn test_accept_malformed() {
        let prefix = "application/vnd.api.";
        assert_eq!(from_accept(";;;,,,", prefix, "+json"), None);
        assert_eq!(from_accept("application/vnd.api.+json", prefix, "+json"), None);
        assert_eq!(from_accept("application/vnd.api.", prefix, ""), None);
        assert_eq!(
            from_accept("application/vnd.api.v 2+json", prefix, "+json"),
            None
        );
        assert_eq!(
            from_accept(
                "application/vnd.api.+json, application/vnd.api.v4+json",
                prefix,
                "+json"
            ),
            Some("v4")
        );
    }
}
