//! Serving layer
//!
//! Orchestrates path resolution, file access, fingerprinting, and range
//! negotiation into response descriptors for file- and directory-backed
//! routes.

mod dir;
mod file;
mod options;
mod request;
mod response;

pub use file::FileService;
pub use options::{
    ByteWindow, CompressedVariant, DirOptions, DirRoots, Disposition, FileOptions, ListingContext,
    ListingEntry, ListingPage, ListingRenderer, PathSource, PrecompressedLookup,
};
pub use request::ServeRequest;
pub use response::{error_response, ResponseBody, ResponseDescriptor};
