//! HTTP/1.1 request parsing using the [`httparse`] crate.

use std::sync::OnceLock;

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};
use crate::bind::Values;

/// Media type of URL-encoded form bodies.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Errors that can occur while parsing an HTTP/1.1 request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
}

/// A parsed HTTP/1.1 request.
///
/// Created by [`Request::parse`] from a raw byte buffer, or assembled with
/// [`Request::new`]. Query and form values are parsed on first access and
/// cached for the life of the request.
///
/// # Examples
///
/// ```
/// use httpctx::http::request::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, _offset) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query_param("name"), Some("world"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    query: Option<String>,
    body: Option<Bytes>,
    query_values: OnceLock<Values>,
    post_form: OnceLock<Values>,
    form: OnceLock<Values>,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Creates an HTTP/1.1 request for `target` (`/path?query`) with no
    /// headers and no body.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method,
            path,
            version: 1,
            headers: Headers::new(),
            query,
            body: None,
            query_values: OnceLock::new(),
            post_form: OnceLock::new(),
            form: OnceLock::new(),
        }
    }

    /// Appends a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attaches a body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Parse a raw HTTP/1.1 request from a byte slice.
    ///
    /// Returns the parsed `Request` and the byte offset at which the body begins
    /// in `buf` (i.e. immediately after the `\r\n\r\n` header terminator).
    ///
    /// The request carries a body when it declares `Content-Length` or
    /// `Transfer-Encoding`, or when bytes follow the header block. With a
    /// `Content-Length`, the body is cut to that length.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed to complete the request headers,
    ///   or fewer body bytes than `Content-Length` declares are present.
    /// - [`RequestError::Parse`] — the data is malformed and cannot be parsed.
    /// - [`RequestError::MissingField`] — a required field (method, path, version) is absent.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method = Method::from(
            raw_req
                .method
                .ok_or(RequestError::MissingField { field: "method" })?,
        );

        let raw_path = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?;
        let (path, query) = split_target(raw_path);

        let version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let rest = &buf[body_offset..];
        let declared_len = header_map
            .get("content-length")
            .and_then(|v| v.trim().parse::<usize>().ok());
        let body = match declared_len {
            Some(len) if rest.len() < len => return Err(RequestError::Incomplete),
            Some(len) => Some(Bytes::copy_from_slice(&rest[..len])),
            None if header_map.contains("transfer-encoding") || !rest.is_empty() => {
                Some(Bytes::copy_from_slice(rest))
            }
            None => None,
        };

        Ok((
            Self {
                method,
                path,
                version,
                headers: header_map,
                query,
                body,
                query_values: OnceLock::new(),
                post_form: OnceLock::new(),
                form: OnceLock::new(),
            },
            body_offset,
        ))
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path (without the query string).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the HTTP minor version number (0 = HTTP/1.0, 1 = HTTP/1.1).
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the raw query string (without the leading `?`), if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Returns the first query value for `key`.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query().get(key)
    }

    /// Returns the body, or `None` if the request has no body stream.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns the media type of the body, lowercased and without parameters.
    pub fn media_type(&self) -> Option<String> {
        let content_type = self.headers.get("content-type")?;
        let essence = content_type.split(';').next().unwrap_or_default().trim();
        Some(essence.to_ascii_lowercase())
    }

    /// Parsed query string values.
    pub fn query(&self) -> &Values {
        self.query_values.get_or_init(|| {
            self.query
                .as_deref()
                .map(Values::parse)
                .unwrap_or_default()
        })
    }

    /// Values from a URL-encoded body of a POST, PUT or PATCH request.
    ///
    /// Empty for every other method and content type.
    pub fn post_form(&self) -> &Values {
        self.post_form.get_or_init(|| {
            let has_form_body = matches!(self.method, Method::Post | Method::Put | Method::Patch)
                && self.media_type().as_deref() == Some(FORM_URLENCODED);
            match &self.body {
                Some(body) if has_form_body => Values::parse_bytes(body),
                _ => Values::new(),
            }
        })
    }

    /// Body form values followed by query values, per key.
    pub fn form(&self) -> &Values {
        self.form.get_or_init(|| {
            let mut form = self.post_form().clone();
            form.merge(self.query());
            form
        })
    }

}

fn split_target(target: &str) -> (String, Option<String>) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
        None => (target.to_owned(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let (req, offset) = Request::parse(raw).unwrap();
        assert_eq!(req.method().as_str(), "GET");
        assert_eq!(req.path(), "/");
        assert_eq!(req.version(), 1);
        assert_eq!(req.headers().get("host"), Some("localhost"));
        assert_eq!(offset, raw.len());
        assert!(req.body().is_none());
    }

    #[test]
    fn parse_query_string() {
        let raw = b"GET /search?q=rust%21&page=2&q=again HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query_string(), Some("q=rust%21&page=2&q=again"));
        assert_eq!(req.query_param("q"), Some("rust!"));
        assert_eq!(req.query_param("page"), Some("2"));
        assert_eq!(req.query().get_all("q").count(), 2);
    }

    #[test]
    fn incomplete_request() {
        let raw = b"GET / HTTP/1.1\r\nHost:";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn content_length_bounds_body() {
        let raw = b"POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: 5\r\n\r\nhelloEXTRA";
        let (req, body_offset) = Request::parse(raw).unwrap();
        assert_eq!(&raw[body_offset..body_offset + 5], b"hello");
        assert_eq!(req.body().map(|b| b.as_ref()), Some(&b"hello"[..]));
    }

    #[test]
    fn short_body_is_incomplete() {
        let raw = b"POST /submit HTTP/1.1\r\nContent-Length: 100\r\n\r\nname=Al";
        assert!(matches!(Request::parse(raw), Err(RequestError::Incomplete)));
    }

    #[test]
    fn zero_content_length_is_an_empty_body() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
        let (req, _) = Request::parse(raw).unwrap();
        assert_eq!(req.body().map(Bytes::len), Some(0));
    }

    #[test]
    fn post_form_from_urlencoded_body() {
        let req = Request::new(Method::Post, "/submit?name=query&extra=1")
            .with_header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .with_body("name=body&age=30");
        assert_eq!(req.post_form().get("name"), Some("body"));
        assert!(req.post_form().get("extra").is_none());

        let names: Vec<_> = req.form().get_all("name").collect();
        assert_eq!(names, vec!["body", "query"]);
        assert_eq!(req.form().get("extra"), Some("1"));
        assert_eq!(req.form().get("age"), Some("30"));
    }

    #[test]
    fn post_form_ignores_other_methods_and_types() {
        let get = Request::new(Method::Get, "/")
            .with_header("Content-Type", FORM_URLENCODED)
            .with_body("a=1");
        assert!(get.post_form().is_empty());

        let json = Request::new(Method::Post, "/")
            .with_header("Content-Type", "application/json")
            .with_body("{}");
        assert!(json.post_form().is_empty());
    }

    #[test]
    fn media_type_strips_parameters() {
        let req = Request::new(Method::Post, "/").with_header("content-type", "Text/HTML; charset=utf-8");
        assert_eq!(req.media_type().as_deref(), Some("text/html"));
    }
}
