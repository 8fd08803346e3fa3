//! `accept-encoding` evaluation for precompressed-variant lookup

/// Whether the client accepts `encoding`, honoring `q=0` exclusions.
///
/// Matching is token-based: `gzip`, `gzip;q=0.5`, and `*` all count, while
/// `gzip;q=0` explicitly refuses the encoding.
pub fn accepts(header: Option<&str>, encoding: &str) -> bool {
    let Some(header) = header else {
        return false;
    };
    for entry in header.split(',') {
        let mut parts = entry.split(';');
        let token = parts.next().unwrap_or("").trim();
        if !token.eq_ignore_ascii_case(encoding) && token != "*" {
            continue;
        }
        let refused = parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("q=")
                .is_some_and(|q| q.trim().parse::<f32>().is_ok_and(|q| q == 0.0))
        });
        return !refused;
    }
    false
}
