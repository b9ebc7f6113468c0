//! Lifecycle response headers.
//!
//! Implements the headers emitted for versioned responses:
//! - `X-API-Version` identifying the served version
//! - Deprecation header (draft-ietf-httpapi-deprecation-header)
//! - Sunset header (RFC 8594)
//! - Link header pointing at migration documentation
//! - Warning 299 (RFC 7234)

use chrono::{DateTime, SecondsFormat, Utc};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

pub const VERSION_HEADER: &str = "X-API-Version";
pub const DEPRECATION_HEADER: &str = "Deprecation";
pub const SUNSET_HEADER: &str = "Sunset";
pub const LINK_HEADER: &str = "Link";
pub const WARNING_HEADER: &str = "Warning";

/// Destination for response headers.
///
/// `set_header` replaces any existing value and returns `false` when the
/// name or value cannot be represented as an HTTP header.
pub trait HeaderSink {
    fn set_header(&mut self, name: &str, value: &str) -> bool;
}

impl HeaderSink for HeaderMap {
    fn set_header(&mut self, name: &str, value: &str) -> bool {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.insert(name, value);
                true
            }
            _ => false,
        }
    }
}

impl<B> HeaderSink for http::Response<B> {
    fn set_header(&mut self, name: &str, value: &str) -> bool {
        self.headers_mut().set_header(name, value)
    }
}

/// Plain map sink; keeps header names exactly as written.
///
/// Keys are case-sensitive: `x-api-version` and `X-API-Version` are two
/// separate entries. Use a `HeaderMap` when names must fold.
impl HeaderSink for HashMap<String, String> {
    fn set_header(&mut self, name: &str, value: &str) -> bool {
        if HeaderValue::from_str(value).is_err() {
            return false;
        }
        self.insert(name.to_string(), value.to_string());
        true
    }
}

/// Format a datetime as an HTTP date (RFC 7231 / RFC 1123).
/// Example: Sun, 06 Nov 1994 08:49:37 GMT
pub fn format_http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// `Link` value for a version's documentation.
///
/// Before sunset both relations are advertised; past sunset only
/// `rel="sunset"` remains.
pub fn link_value(url: &str, past_sunset: bool) -> String {
    if past_sunset {
        format!("<{}>; rel=\"sunset\"", url)
    } else {
        format!("<{}>; rel=\"deprecation\", rel=\"sunset\"", url)
    }
}

/// `Warning: 299` value announcing a deprecated version.
pub fn warning_value(version: &str, sunset: &DateTime<Utc>) -> String {
    format!(
        "299 - \"API {} is deprecated and will be removed on {}. Please upgrade to a supported version.\"",
        version,
        sunset.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// Generate a "410 Gone" response body for a version past its sunset.
pub fn gone_response_body(
    version: &str,
    sunset: Option<&DateTime<Utc>>,
    documentation_url: Option<&str>,
) -> String {
    let mut response = serde_json::json!({
        "error": "version_sunset",
        "message": format!("API version {} has been removed", version),
        "version": version,
    });

    if let Some(sunset) = sunset {
        response["sunset"] = serde_json::Value::String(sunset.to_rfc3339());
    }

    if let Some(docs) = documentation_url {
        response["documentation"] = serde_json::Value::String(docs.to_string());
    }

    serde_json::to_string_pretty(&response).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sunset() -> DateTime<Utc> {
        "2025-12-31T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_format_http_date() {
        let dt: DateTime<Utc> = "2025-06-01T12:00:00Z".parse().unwrap();
        assert_eq!(format_http_date(&dt), "Sun, 01 Jun 2025 12:00:00 GMT");
    }

    #[test]
    fn test_link_value() {
        assert_eq!(
            link_value("https://docs.example.com/v1", false),
            "<https://docs.example.com/v1>; rel=\"deprecation\", rel=\"sunset\""
        );
        assert_eq!(
            link_value("https://docs.example.com/v1", true),
            "<https://docs.example.com/v1>; rel=\"sunset\""
        );
    }

    #[test]
    fn test_warning_value() {
        assert_eq!(
            warning_value("v1", &sunset()),
            "299 - \"API v1 is deprecated and will be removed on 2025-12-31T00:00:00Z. \
             Please upgrade to a supported version.\""
        );
    }

    #[test]
    fn test_header_map_sink() {
        let mut headers = HeaderMap::new();
        assert!(headers.set_header(VERSION_HEADER, "v1"));
        assert!(headers.set_header(VERSION_HEADER, "v2"));
        assert_eq!(headers.get("x-api-version").unwrap(), "v2");
        assert_eq!(headers.get_all("x-api-version").iter().count(), 1);

        assert!(!headers.set_header(VERSION_HEADER, "v1\r\nX-Injected: 1"));
        assert!(!headers.set_header("bad header", "v1"));
        assert_eq!(headers.get("x-api-version").unwrap(), "v2");
    }

    #[test]
    fn test_response_sink() {
        let mut response = http::Response::new(());
        assert!(response.set_header(SUNSET_HEADER, &format_http_date(&sunset())));
        assert_eq!(
            response.headers().get("sunset").unwrap(),
            "Wed, 31 Dec 2025 00:00:00 GMT"
        );
    }

    #[test]
    fn test_map_sink_preserves_case() {
        let mut headers = HashMap::new();
        assert!(headers.set_header(DEPRECATION_HEADER, "true"));
        assert!(!headers.set_header(VERSION_HEADER, "v1\n"));
        assert_eq!(headers.get("Deprecation").map(String::as_str), Some("true"));
        assert!(!headers.contains_key(VERSION_HEADER));
    }

    #[test]
    fn test_map_sink_keys_are_case_sensitive() {
        let mut headers = HashMap::new();
        assert!(headers.set_header("x-api-version", "v1"));
        assert!(headers.set_header("X-API-Version", "v2"));
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("x-api-version").map(String::as_str), Some("v1"));
    }

    #[test]
    fn test_gone_response_body() {
        let body = gone_response_body("v1", Some(&sunset()), Some("https://docs.example.com/v1"));
        assert!(body.contains("version_sunset"));
        assert!(body.contains("has been removed"));
        assert!(body.contains("2025-12-31"));
        assert!(body.contains("docs.example.com"));

        let body = gone_response_body("v1", None, None);
        assert!(!body.contains("sunset\":"));
        assert!(!body.contains("documentation"));
    }
}
