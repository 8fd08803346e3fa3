//! File access layer
//!
//! Owns descriptors and guarantees their release: a [`FileHandle`] closes on
//! every terminal path unless ownership was transferred into a [`FileBody`],
//! which then closes on stream completion, error, or drop.

mod body;
mod handle;

pub use body::FileBody;
pub use handle::{FileHandle, HandleState, ResourceDescriptor};
