//! Response descriptors and their conversion to hyper responses

use crate::error::ServeError;
use crate::fs::FileBody;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use log::warn;
use std::io;

/// Body type every serving path converges on
pub type ResponseBody = BoxBody<Bytes, io::Error>;

/// Fully-described response: status, headers, and a body source.
///
/// The body is either already in memory or a byte-windowed stream that owns
/// its file descriptor.
#[derive(Debug)]
pub struct ResponseDescriptor {
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: BodySource,
}

#[derive(Debug)]
enum BodySource {
    Empty,
    Buffer(Bytes),
    Stream(FileBody),
}

impl ResponseDescriptor {
    pub(crate) fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: BodySource::Empty,
        }
    }

    pub(crate) fn buffer(status: StatusCode, bytes: Bytes) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: BodySource::Buffer(bytes),
        }
    }

    pub(crate) fn stream(status: StatusCode, body: FileBody) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: BodySource::Stream(body),
        }
    }

    /// Insert a header, dropping (and logging) values that are not valid
    /// header text rather than failing the whole response.
    pub(crate) fn set_header(&mut self, name: HeaderName, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(err) => warn!("dropping invalid {name} header value: {err}"),
        }
    }

    /// Bytes the body will carry, if knowable without streaming
    pub fn body_len(&self) -> Option<u64> {
        match &self.body {
            BodySource::Empty => Some(0),
            BodySource::Buffer(bytes) => Some(bytes.len() as u64),
            BodySource::Stream(body) => Some(body.remaining()),
        }
    }

    /// Convert into a hyper response, transferring body ownership.
    pub fn into_response(self) -> Response<ResponseBody> {
        let body = match self.body {
            BodySource::Empty => empty_body(),
            BodySource::Buffer(bytes) => full_body(bytes),
            BodySource::Stream(file_body) => file_body.boxed(),
        };
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

pub(crate) fn empty_body() -> ResponseBody {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

pub(crate) fn full_body(bytes: Bytes) -> ResponseBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

/// Build the plain-text error response for a classified failure.
///
/// 416 carries the `content-range: bytes */<length>` framing the protocol
/// requires; `Internal` stays opaque to the client.
pub fn error_response(err: &ServeError) -> Response<ResponseBody> {
    let status = err.status();
    let reason = status.canonical_reason().unwrap_or("Error");
    let mut response = Response::new(full_body(Bytes::from(format!(
        "{} {reason}",
        status.as_u16()
    ))));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );

    if let ServeError::RangeNotSatisfiable { length } = err {
        if let Ok(value) = HeaderValue::from_str(&format!("bytes */{length}")) {
            response.headers_mut().insert(header::CONTENT_RANGE, value);
        }
    }
    response
}
