//! File-serving orchestration
//!
//! One request attempt walks resolve → open → stat → compressed lookup →
//! fingerprint → range negotiation → stream. Every failure path closes the
//! open handle before the error propagates; once the body stream exists it
//! owns the descriptor instead.

use crate::error::ServeError;
use crate::etag::{simple_fingerprint, CacheKey, CacheStatsSnapshot, EtagMode, FingerprintCache};
use crate::fs::{FileHandle, ResourceDescriptor};
use crate::http::conditional::{http_date, if_range_matches};
use crate::http::range::{negotiate, RangeOutcome};
use crate::http::{encoding, mime};
use crate::resolve;
use crate::serve::options::{FileOptions, PathSource, PrecompressedLookup};
use crate::serve::request::ServeRequest;
use crate::serve::response::ResponseDescriptor;
use hyper::header;
use hyper::StatusCode;
use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Root-scope serving system: owns the process-wide fingerprint cache and
/// hands out response descriptors for file and directory requests.
///
/// Construct one per process and share it; the cache key already embeds
/// enough file identity that independent caches converge, but sharing keeps
/// the coalescing guarantee meaningful.
#[derive(Debug, Clone, Default)]
pub struct FileService {
    etags: Arc<FingerprintCache>,
}

impl FileService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity 0 disables fingerprint storage (computations still coalesce)
    pub fn with_cache_capacity(capacity: usize) -> Self {
        Self {
            etags: Arc::new(FingerprintCache::new(capacity)),
        }
    }

    /// Fingerprint-cache activity counters
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.etags.stats()
    }

    /// Prepare a response for one file request.
    ///
    /// Returns the descriptor to transmit, or a classified failure for the
    /// host to map (404/403/416/500). When the host has already decided on
    /// 304 (`req.not_modified`), nothing is resolved, opened, or stated.
    pub async fn serve_file(
        &self,
        req: &ServeRequest<'_>,
        source: &PathSource,
        opts: &FileOptions,
    ) -> Result<ResponseDescriptor, ServeError> {
        if req.not_modified {
            return Ok(ResponseDescriptor::empty(StatusCode::NOT_MODIFIED));
        }

        let logical = produce_path(req, source)?;
        let resolved = resolve::resolve(&logical, opts.confine.as_deref())?;

        let mut handle = FileHandle::open(resolved.clone()).await?;
        let mut stat = handle.stat().await?;

        // The primary path keys content-type even when a sibling is served.
        let primary_path = resolved;
        let mut content_encoding: Option<String> = None;

        if let (Some(lookup), None) = (&opts.precompressed, &opts.window) {
            if let Some((encoding, sibling, sibling_stat)) =
                lookup_precompressed(req.accept_encoding, &primary_path, lookup).await
            {
                debug!(
                    "serving precompressed {encoding} sibling for {}",
                    primary_path.display()
                );
                handle.close();
                handle = sibling;
                stat = sibling_stat;
                content_encoding = Some(encoding);
            }
        }

        // Fixed byte window clamps against the real length.
        let (window_start, total) = match opts.window {
            Some(window) => {
                let start = window.start.min(stat.len);
                let end = window.end.map_or(stat.len, |end| end.clamp(start, stat.len));
                (start, end - start)
            }
            None => (0, stat.len),
        };

        let last_modified = http_date(stat.modified);
        let etag = match opts.etag {
            EtagMode::Hash => {
                let key = CacheKey::new(handle.path(), &stat);
                match self.etags.fingerprint(key).await {
                    Ok(tag) => Some(format!("\"{tag}\"")),
                    Err(err) => {
                        handle.close();
                        return Err(err);
                    }
                }
            }
            EtagMode::Simple => Some(format!("\"{}\"", simple_fingerprint(&stat))),
            EtagMode::Disabled => None,
        };

        let (status, body_start, body_len, content_range) = if opts.ranges {
            let precondition = if_range_matches(req.if_range, etag.as_deref(), &last_modified);
            match negotiate(req.range, total, precondition, false) {
                RangeOutcome::Full => (StatusCode::OK, window_start, total, None),
                RangeOutcome::Partial(range) => (
                    StatusCode::PARTIAL_CONTENT,
                    window_start + range.start,
                    range.len(),
                    Some(format!("bytes {}-{}/{total}", range.start, range.end)),
                ),
                RangeOutcome::NotSatisfiable => {
                    handle.close();
                    return Err(ServeError::RangeNotSatisfiable { length: total });
                }
            }
        } else {
            (StatusCode::OK, window_start, total, None)
        };

        let mut descriptor = if req.head || body_len == 0 {
            handle.close();
            ResponseDescriptor::empty(status)
        } else {
            let body = handle.into_body(body_start, body_len).await?;
            ResponseDescriptor::stream(status, body)
        };

        descriptor.set_header(header::CONTENT_TYPE, content_type_for(&primary_path));
        descriptor.set_header(header::CONTENT_LENGTH, &body_len.to_string());
        descriptor.set_header(header::LAST_MODIFIED, &last_modified);
        if let Some(etag) = &etag {
            descriptor.set_header(header::ETAG, etag);
        }
        if opts.ranges {
            descriptor.set_header(header::ACCEPT_RANGES, "bytes");
        }
        if let Some(range) = &content_range {
            descriptor.set_header(header::CONTENT_RANGE, range);
        }
        if let Some(encoding) = &content_encoding {
            descriptor.set_header(header::CONTENT_ENCODING, encoding);
            descriptor.set_header(header::VARY, "accept-encoding");
        }
        if let Some(disposition) = opts.disposition.header_value() {
            descriptor.set_header(header::CONTENT_DISPOSITION, &disposition);
        }

        Ok(descriptor)
    }
}

fn produce_path(req: &ServeRequest<'_>, source: &PathSource) -> Result<PathBuf, ServeError> {
    match source {
        PathSource::Fixed(path) => Ok(path.clone()),
        PathSource::Produced(produce) => produce.as_ref()(req).map_err(|reason| {
            ServeError::internal(
                req.path,
                io::Error::other(format!("path producer failed: {reason}")),
            )
        }),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    mime::content_type(path.extension().and_then(|ext| ext.to_str()))
}

/// Probe for a precompressed sibling the client accepts.
///
/// A missing sibling (or one that turns out to be a directory) is a silent
/// fallback to the primary file; only genuinely unexpected failures stop
/// the lookup.
async fn lookup_precompressed(
    accept_encoding: Option<&str>,
    primary: &Path,
    lookup: &PrecompressedLookup,
) -> Option<(String, FileHandle, ResourceDescriptor)> {
    for variant in &lookup.variants {
        if !encoding::accepts(accept_encoding, &variant.encoding) {
            continue;
        }
        let mut sibling_path = primary.as_os_str().to_owned();
        sibling_path.push(&variant.suffix);
        let sibling_path = PathBuf::from(sibling_path);

        let Ok(mut sibling) = FileHandle::open(sibling_path).await else {
            continue;
        };
        match sibling.stat().await {
            Ok(stat) => return Some((variant.encoding.clone(), sibling, stat)),
            // stat already closed the sibling handle on failure
            Err(_) => continue,
        }
    }
    None
}
