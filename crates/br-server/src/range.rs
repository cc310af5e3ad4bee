//! `Range` header handling for single byte ranges.

/// What a request asked for, resolved against the stream size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeRequest {
    /// No usable `Range` header: serve everything.
    Full,
    /// Inclusive byte positions.
    Partial { start: u64, end: u64 },
    /// Well-formed but outside the stream.
    Unsatisfiable,
}

impl RangeRequest {
    /// Starting offset and byte count to serve for a stream of `size` bytes.
    pub fn span(&self, size: u64) -> Option<(u64, u64)> {
        match *self {
            RangeRequest::Full => Some((0, size)),
            RangeRequest::Partial { start, end } => Some((start, end - start + 1)),
            RangeRequest::Unsatisfiable => None,
        }
    }
}

/// Parse a `Range` header value.
///
/// Malformed headers and multi-range requests are ignored and yield
/// [`RangeRequest::Full`].
pub fn parse_range(header: Option<&str>, size: u64) -> RangeRequest {
    let Some(spec) = header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeRequest::Full;
    };
    if spec.contains(',') {
        return RangeRequest::Full;
    }
    let Some((start, end)) = spec.split_once('-') else {
        return RangeRequest::Full;
    };
    let (start, end) = (start.trim(), end.trim());

    match (start.is_empty(), end.is_empty()) {
        // bytes=-500 (last 500 bytes)
        (true, false) => {
            let Ok(suffix_len) = end.parse::<u64>() else {
                return RangeRequest::Full;
            };
            if suffix_len == 0 || size == 0 {
                return RangeRequest::Unsatisfiable;
            }
            RangeRequest::Partial {
                start: size.saturating_sub(suffix_len),
                end: size - 1,
            }
        }
        // bytes=500- (from 500 to end)
        (false, true) => {
            let Ok(start) = start.parse::<u64>() else {
                return RangeRequest::Full;
            };
            if start >= size {
                return RangeRequest::Unsatisfiable;
            }
            RangeRequest::Partial {
                start,
                end: size - 1,
            }
        }
        // bytes=0-499
        (false, false) => {
            let (Ok(start), Ok(end)) = (start.parse::<u64>(), end.parse::<u64>()) else {
                return RangeRequest::Full;
            };
            if start > end {
                return RangeRequest::Full;
            }
            if start >= size {
                return RangeRequest::Unsatisfiable;
            }
            RangeRequest::Partial {
                start,
                end: end.min(size - 1),
            }
        }
        (true, true) => RangeRequest::Full,
    }
}
