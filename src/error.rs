//! Serving failure taxonomy
//!
//! Classification happens at the lowest layer that sees the I/O error code;
//! everything above re-raises the classified failure unchanged.

use hyper::StatusCode;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Why a request was refused with 403
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForbiddenReason {
    /// Resolved path falls outside the confinement root
    PathEscapesRoot,
    /// Filesystem permission denied
    PermissionDenied,
    /// A file was required but the path names a directory
    IsDirectory,
    /// Directory has no usable index and listing is disabled
    ListingDenied,
}

impl std::fmt::Display for ForbiddenReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::PathEscapesRoot => "path escapes confinement root",
            Self::PermissionDenied => "permission denied",
            Self::IsDirectory => "path is a directory",
            Self::ListingDenied => "directory listing denied",
        };
        f.write_str(text)
    }
}

/// Structured serving failure
///
/// `Internal` retains the offending path and the underlying error for
/// server-side logging; clients only ever see the mapped status code.
#[derive(Debug, Clone, Error)]
pub enum ServeError {
    #[error("not found")]
    NotFound,

    #[error("forbidden: {reason}")]
    Forbidden { reason: ForbiddenReason },

    #[error("range not satisfiable against length {length}")]
    RangeNotSatisfiable { length: u64 },

    #[error("i/o failure at {}: {source}", path.display())]
    Internal {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },
}

impl ServeError {
    pub fn forbidden(reason: ForbiddenReason) -> Self {
        Self::Forbidden { reason }
    }

    pub fn internal(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Internal {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Classify a raw filesystem error for `path`
    ///
    /// Missing files and NUL-carrying paths are `NotFound`, permission
    /// problems are `Forbidden`, anything else is `Internal` with the path
    /// attached.
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::forbidden(ForbiddenReason::PermissionDenied),
            _ => Self::internal(path, source),
        }
    }

    /// Final HTTP status the host should map this failure to
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::RangeNotSatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
