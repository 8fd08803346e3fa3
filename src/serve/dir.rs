//! Directory-serving orchestration
//!
//! A thin consumer of the file-serving core: candidate base directories are
//! tried in order, a `NotFound` means "try the next", and only the directory
//! condition branches into index resolution and listing.

use crate::error::{ForbiddenReason, ServeError};
use crate::serve::file::FileService;
use crate::serve::options::{
    DirOptions, DirRoots, FileOptions, ListingContext, ListingEntry, ListingPage, PathSource,
};
use crate::serve::request::ServeRequest;
use crate::serve::response::ResponseDescriptor;
use hyper::body::Bytes;
use hyper::header;
use hyper::StatusCode;
use log::debug;
use std::io;
use std::path::{Path, PathBuf};

impl FileService {
    /// Prepare a response for a directory-backed route.
    ///
    /// Tries each candidate base directory in order; within one, a sub-path
    /// is served as a file, retried once with the default extension, or,
    /// when it names a directory, resolved through index files and finally
    /// the listing. Exhausting all candidates is a `NotFound`.
    pub async fn serve_dir(
        &self,
        req: &ServeRequest<'_>,
        roots: &DirRoots,
        opts: &DirOptions,
    ) -> Result<ResponseDescriptor, ServeError> {
        if req.not_modified {
            return Ok(ResponseDescriptor::empty(StatusCode::NOT_MODIFIED));
        }

        let sub = req.path.trim_start_matches('/');
        if !opts.show_hidden && is_hidden_path(sub) {
            return Err(ServeError::NotFound);
        }

        let candidates = produce_roots(req, roots)?;
        for root in &candidates {
            match self.try_root(req, root, sub, opts).await {
                Err(ServeError::NotFound) => {
                    debug!("no match under {}, trying next candidate", root.display());
                }
                outcome => return outcome,
            }
        }
        Err(ServeError::NotFound)
    }

    async fn try_root(
        &self,
        req: &ServeRequest<'_>,
        root: &Path,
        sub: &str,
        opts: &DirOptions,
    ) -> Result<ResponseDescriptor, ServeError> {
        let fopts = FileOptions {
            confine: Some(root.to_path_buf()),
            ..opts.file.clone()
        };

        match self
            .serve_file(req, &PathSource::Fixed(PathBuf::from(sub)), &fopts)
            .await
        {
            Err(ServeError::NotFound) => {
                if let Some(ext) = &opts.default_extension {
                    if !sub.is_empty() && !sub.ends_with('/') {
                        let retry = format!("{sub}.{ext}");
                        return self
                            .serve_file(req, &PathSource::Fixed(PathBuf::from(retry)), &fopts)
                            .await;
                    }
                }
                Err(ServeError::NotFound)
            }
            Err(ServeError::Forbidden {
                reason: ForbiddenReason::IsDirectory,
            }) => self.serve_directory(req, root, sub, opts, &fopts).await,
            outcome => outcome,
        }
    }

    async fn serve_directory(
        &self,
        req: &ServeRequest<'_>,
        root: &Path,
        sub: &str,
        opts: &DirOptions,
        fopts: &FileOptions,
    ) -> Result<ResponseDescriptor, ServeError> {
        // Directory URLs need the trailing slash before relative links in an
        // index page or listing can resolve.
        if opts.redirect_to_slash && !req.raw_path.is_empty() && !req.raw_path.ends_with('/') {
            let mut descriptor =
                ResponseDescriptor::buffer(StatusCode::FOUND, Bytes::from("Redirecting..."));
            descriptor.set_header(header::LOCATION, &format!("{}/", req.raw_path));
            descriptor.set_header(header::CONTENT_TYPE, "text/plain; charset=utf-8");
            return Ok(descriptor);
        }

        let sub_dir = sub.trim_end_matches('/');
        for index in &opts.index {
            let candidate = if sub_dir.is_empty() {
                index.clone()
            } else {
                format!("{sub_dir}/{index}")
            };
            match self
                .serve_file(req, &PathSource::Fixed(PathBuf::from(&candidate)), fopts)
                .await
            {
                Err(ServeError::NotFound) => {}
                Err(ServeError::Forbidden {
                    reason: ForbiddenReason::IsDirectory,
                }) => {
                    // an index entry that is a directory is a config error
                    return Err(ServeError::internal(
                        root.join(&candidate),
                        io::Error::other("index candidate is a directory"),
                    ));
                }
                outcome => return outcome,
            }
        }

        if !opts.listing {
            return Err(ServeError::forbidden(ForbiddenReason::ListingDenied));
        }
        self.render_listing(req, root, sub_dir, opts).await
    }

    async fn render_listing(
        &self,
        req: &ServeRequest<'_>,
        root: &Path,
        sub: &str,
        opts: &DirOptions,
    ) -> Result<ResponseDescriptor, ServeError> {
        let dir_path = crate::resolve::resolve(Path::new(sub), Some(root))?;
        let entries = read_entries(&dir_path, opts.show_hidden).await?;

        let at_root = sub.is_empty();
        let request_path = if req.raw_path.is_empty() {
            req.path
        } else {
            req.raw_path
        };
        let ctx = ListingContext {
            request_path,
            entries: &entries,
            at_root,
        };
        let page = match &opts.renderer {
            Some(renderer) => renderer.render(&ctx),
            None => default_listing(&ctx),
        };

        let body = Bytes::from(page.body);
        let body_len = body.len();
        let mut descriptor = if req.head {
            ResponseDescriptor::empty(StatusCode::OK)
        } else {
            ResponseDescriptor::buffer(StatusCode::OK, body)
        };
        descriptor.set_header(header::CONTENT_TYPE, &page.content_type);
        descriptor.set_header(header::CONTENT_LENGTH, &body_len.to_string());
        Ok(descriptor)
    }
}

fn produce_roots(req: &ServeRequest<'_>, roots: &DirRoots) -> Result<Vec<PathBuf>, ServeError> {
    match roots {
        DirRoots::Fixed(roots) => Ok(roots.clone()),
        DirRoots::Produced(produce) => produce.as_ref()(req).map_err(|reason| {
            ServeError::internal(
                req.path,
                io::Error::other(format!("directory producer failed: {reason}")),
            )
        }),
    }
}

/// A path segment is hidden when any component starts with `.`; bare `.`
/// and `..` are directory navigation, not hidden names.
fn is_hidden_path(sub: &str) -> bool {
    sub.split('/')
        .any(|segment| segment.starts_with('.') && segment != "." && segment != "..")
}

async fn read_entries(dir: &Path, show_hidden: bool) -> Result<Vec<ListingEntry>, ServeError> {
    let mut reader = tokio::fs::read_dir(dir)
        .await
        .map_err(|err| ServeError::internal(dir, err))?;

    let mut entries = Vec::new();
    loop {
        let entry = reader
            .next_entry()
            .await
            .map_err(|err| ServeError::internal(dir, err))?;
        let Some(entry) = entry else { break };

        let name = entry.file_name().to_string_lossy().into_owned();
        if !show_hidden && name.starts_with('.') {
            continue;
        }
        // an entry that vanishes mid-listing is skipped, not fatal
        let Ok(meta) = entry.metadata().await else {
            debug!("skipping unreadable listing entry {name}");
            continue;
        };
        entries.push(ListingEntry {
            is_dir: meta.is_dir(),
            len: meta.len(),
            modified: meta.modified().ok(),
            name,
        });
    }

    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));
    Ok(entries)
}

/// Minimal HTML listing with a parent link when not at the configured root
fn default_listing(ctx: &ListingContext<'_>) -> ListingPage {
    let title = escape_html(ctx.request_path);
    let mut body = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\n<body>\n<h1>Index of {title}</h1>\n<ul>\n"
    );
    if !ctx.at_root {
        body.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for entry in ctx.entries {
        let name = escape_html(&entry.name);
        if entry.is_dir {
            body.push_str(&format!("<li><a href=\"{name}/\">{name}/</a></li>\n"));
        } else {
            body.push_str(&format!("<li><a href=\"{name}\">{name}</a></li>\n"));
        }
    }
    body.push_str("</ul>\n</body>\n</html>\n");
    ListingPage {
        content_type: "text/html; charset=utf-8".to_string(),
        body,
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
