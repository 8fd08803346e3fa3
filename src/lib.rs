//! Static-content serving core for hyper hosts.
//!
//! Answers HTTP requests with file or directory contents: opens and stats
//! the file, negotiates byte ranges and precompressed variants, computes and
//! caches a content fingerprint with at most one concurrent computation per
//! file identity, and guarantees the descriptor is released on every exit
//! path.
//!
//! The host framework keeps its own responsibilities: routing, connection
//! management, conditional-request (304) evaluation, and transmission. This
//! crate produces a [`ResponseDescriptor`] the host converts with
//! [`ResponseDescriptor::into_response`].
//!
//! ```no_run
//! use hyperserve::{FileService, FileOptions, PathSource, ServeRequest};
//!
//! # async fn example() -> Result<(), hyperserve::ServeError> {
//! let service = FileService::new();
//! let opts = FileOptions {
//!     confine: Some("/srv/www".into()),
//!     ..FileOptions::default()
//! };
//! let req = ServeRequest {
//!     path: "assets/app.js",
//!     range: Some("bytes=0-1023"),
//!     ..ServeRequest::default()
//! };
//! let descriptor = service
//!     .serve_file(&req, &PathSource::from("assets/app.js"), &opts)
//!     .await?;
//! let response = descriptor.into_response();
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod etag;
pub mod fs;
pub mod http;
pub mod resolve;
pub mod serve;

pub use error::{ForbiddenReason, ServeError};
pub use etag::{CacheStatsSnapshot, EtagMode, FingerprintCache};
pub use serve::{
    error_response, ByteWindow, CompressedVariant, DirOptions, DirRoots, Disposition, FileOptions,
    FileService, ListingContext, ListingEntry, ListingPage, ListingRenderer, PathSource,
    PrecompressedLookup, ResponseBody, ResponseDescriptor, ServeRequest,
};
