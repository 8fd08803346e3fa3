//! Byte-range negotiation
//!
//! Single-range service only: multiple comma-separated ranges fall back to
//! full content, while parse failures are unsatisfiable and must be answered
//! with `content-range: bytes */<length>` and no body.

/// One satisfiable byte range, offsets inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
}

impl RangeSpec {
    /// Number of bytes the range covers
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Negotiation verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Serve the full content with status 200
    Full,
    /// Serve the single range with status 206
    Partial(RangeSpec),
    /// Answer 416 with `content-range: bytes */<length>`
    NotSatisfiable,
}

/// Negotiate a `range` header against a known total length.
///
/// A failed `if-range` precondition downgrades to full content, as does a
/// non-identity transform encoding: byte offsets are meaningless once the
/// payload is being re-encoded on the fly. Pre-existing fixed encodings keep
/// their known length and still permit ranging.
pub fn negotiate(
    header: Option<&str>,
    length: u64,
    if_range_matches: bool,
    transforming: bool,
) -> RangeOutcome {
    let Some(raw) = header else {
        return RangeOutcome::Full;
    };
    if !if_range_matches || transforming {
        return RangeOutcome::Full;
    }

    let Some(spec) = raw.trim().strip_prefix("bytes=") else {
        // wrong or missing unit
        return RangeOutcome::NotSatisfiable;
    };

    // Multiple sub-ranges collapse to full content, intentionally.
    if spec.contains(',') {
        return RangeOutcome::Full;
    }

    parse_single(spec.trim(), length)
}

fn parse_single(spec: &str, length: u64) -> RangeOutcome {
    let Some((start_text, end_text)) = spec.split_once('-') else {
        return RangeOutcome::NotSatisfiable;
    };
    let (start_text, end_text) = (start_text.trim(), end_text.trim());

    if start_text.is_empty() {
        return parse_suffix(end_text, length);
    }

    let Ok(start) = start_text.parse::<u64>() else {
        return RangeOutcome::NotSatisfiable;
    };
    if length == 0 || start > length - 1 {
        return RangeOutcome::NotSatisfiable;
    }

    let end = if end_text.is_empty() {
        length - 1
    } else {
        match end_text.parse::<u64>() {
            // an overshooting end clamps to the last byte
            Ok(end) => end.min(length - 1),
            Err(_) => return RangeOutcome::NotSatisfiable,
        }
    };

    if start > end {
        return RangeOutcome::NotSatisfiable;
    }
    RangeOutcome::Partial(RangeSpec { start, end })
}

/// `bytes=-N`: the final N bytes
fn parse_suffix(suffix_text: &str, length: u64) -> RangeOutcome {
    if suffix_text.is_empty() {
        // "bytes=-" carries no range at all
        return RangeOutcome::NotSatisfiable;
    }
    let Ok(suffix) = suffix_text.parse::<u64>() else {
        return RangeOutcome::NotSatisfiable;
    };
    if suffix == 0 || length == 0 {
        return RangeOutcome::NotSatisfiable;
    }
    RangeOutcome::Partial(RangeSpec {
        start: length.saturating_sub(suffix),
        end: length - 1,
    })
}
