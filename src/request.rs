//! Read-only view of an inbound request.

use http::HeaderMap;

/// The parts of a request the version engine reads.
///
/// Implemented for [`http::Request`] and [`http::request::Parts`]; hosts
/// with their own request type only need to expose these three accessors.
pub trait RequestView {
    /// URL path, without query string.
    fn path(&self) -> &str;

    /// Raw, undecoded query string without the leading `?`.
    fn raw_query(&self) -> Option<&str>;

    /// Full multi-valued header collection.
    fn headers(&self) -> &HeaderMap;
}

impl<B> RequestView for http::Request<B> {
    fn path(&self) -> &str {
        self.uri().path()
    }

    fn raw_query(&self) -> Option<&str> {
        self.uri().query()
    }

    fn headers(&self) -> &HeaderMap {
        http::Request::headers(self)
    }
}

impl RequestView for http::request::Parts {
    fn path(&self) -> &str {
        self.uri.path()
    }

    fn raw_query(&self) -> Option<&str> {
        self.uri.query()
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_view() {
        let request = http::Request::builder()
            .uri("/v2/users?v=v3&page=1")
            .header("X-API-Version", "v4")
            .body(())
            .unwrap();

        assert_eq!(RequestView::path(&request), "/v2/users");
        assert_eq!(request.raw_query(), Some("v=v3&page=1"));
        assert!(RequestView::headers(&request).contains_key("x-api-version"));

        let (parts, _) = request.into_parts();
        assert_eq!(RequestView::path(&parts), "/v2/users");
        assert_eq!(parts.raw_query(), Some("v=v3&page=1"));
    }

    #[test]
    fn test_request_without_query() {
        let request = http::Request::builder().uri("/users").body(()).unwrap();
        assert_eq!(request.raw_query(), None);
    }
}
