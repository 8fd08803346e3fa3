//! Per-request serving context
//!
//! A borrowed view of the pieces of a request the serving core needs. The
//! host extracts it once and hands it to `serve_file`/`serve_dir`.

use hyper::header::{self, HeaderMap};
use hyper::{Method, Request};

/// Request context for one serving attempt
#[derive(Debug, Clone, Copy, Default)]
pub struct ServeRequest<'a> {
    /// Logical sub-path selected by the route (the "rest of path" param)
    pub path: &'a str,
    /// Full request URL path, used for trailing-slash redirects
    pub raw_path: &'a str,
    /// HEAD request: full headers, empty body
    pub head: bool,
    /// The host already evaluated preconditions and decided on 304; the
    /// core must not open or stat anything
    pub not_modified: bool,
    pub range: Option<&'a str>,
    pub if_range: Option<&'a str>,
    pub accept_encoding: Option<&'a str>,
    /// Carried for the host's conditional evaluation, unused by the core
    pub if_none_match: Option<&'a str>,
    /// Carried for the host's conditional evaluation, unused by the core
    pub if_modified_since: Option<&'a str>,
}

impl<'a> ServeRequest<'a> {
    /// Extract the serving context from a hyper request.
    ///
    /// `rest` is the route's path-parameter selection; when the host router
    /// has none, the full URL path is used.
    pub fn from_request<B>(req: &'a Request<B>, rest: Option<&'a str>) -> Self {
        let headers = req.headers();
        Self {
            path: rest.unwrap_or_else(|| req.uri().path()),
            raw_path: req.uri().path(),
            head: req.method() == Method::HEAD,
            not_modified: false,
            range: header_str(headers, header::RANGE.as_str()),
            if_range: header_str(headers, header::IF_RANGE.as_str()),
            accept_encoding: header_str(headers, header::ACCEPT_ENCODING.as_str()),
            if_none_match: header_str(headers, header::IF_NONE_MATCH.as_str()),
            if_modified_since: header_str(headers, header::IF_MODIFIED_SINCE.as_str()),
        }
    }

    /// Same context with the host's 304 verdict applied
    pub fn with_not_modified(mut self, not_modified: bool) -> Self {
        self.not_modified = not_modified;
        self
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
