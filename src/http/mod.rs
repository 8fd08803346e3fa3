//! HTTP protocol layer
//!
//! Protocol-level helpers decoupled from the serving orchestration: range
//! negotiation, conditional-request matching, content negotiation, and MIME
//! lookup.

pub mod conditional;
pub mod encoding;
pub mod mime;
pub mod range;

pub use range::{negotiate, RangeOutcome, RangeSpec};
