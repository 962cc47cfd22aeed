//! HTTP range request resolution for media streaming
//!
//! Turns a `Range` header value and a file size into one inclusive byte
//! interval. Only the single-interval `bytes=<start>-[<end>]` form is served.

use crate::ErrorCode;

/// One inclusive byte interval of a stored file.
///
/// Invariant: `start <= end < total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl RangeSpec {
    /// Number of bytes in the interval, used as `Content-Length`.
    pub fn chunk_size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value of the `Content-Range` response header.
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

/// Outcome of resolving a range header against a file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeResolution {
    /// Serve the whole file.
    NoRange,
    /// Serve only the given interval.
    Partial(RangeSpec),
}

/// Errors that can occur during range handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("Malformed range header: {header:?}")]
    InvalidRange { header: String },

    #[error("Range start {start} not satisfiable, content size is {total_size}")]
    NotSatisfiable { start: u64, total_size: u64 },
}

impl RangeError {
    /// Returns the failure class of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            RangeError::InvalidRange { .. } => ErrorCode::InvalidRange,
            RangeError::NotSatisfiable { .. } => ErrorCode::RangeNotSatisfiable,
        }
    }
}

/// Resolves an optional `Range` header against `total_size`.
///
/// An absent header, or an empty file, resolves to [`RangeResolution::NoRange`].
/// An end beyond the last byte is clamped to it.
///
/// # Errors
/// - `RangeError::InvalidRange` - Header is not `bytes=<start>-[<end>]` with decimal offsets
/// - `RangeError::NotSatisfiable` - Start lies past the last byte, or end precedes start
///
/// # Examples
/// ```
/// use vidstash_core::streaming::range::{RangeResolution, resolve};
///
/// let RangeResolution::Partial(spec) = resolve(Some("bytes=100-199"), 1000).unwrap() else {
///     panic!("expected a partial range");
/// };
/// assert_eq!(spec.chunk_size(), 100);
/// assert_eq!(spec.content_range(), "bytes 100-199/1000");
/// ```
pub fn resolve(range_header: Option<&str>, total_size: u64) -> Result<RangeResolution, RangeError> {
    let Some(header) = range_header else {
        return Ok(RangeResolution::NoRange);
    };
    if total_size == 0 {
        return Ok(RangeResolution::NoRange);
    }

    let invalid = || RangeError::InvalidRange {
        header: header.to_string(),
    };

    let spec = header.trim().strip_prefix("bytes=").ok_or_else(invalid)?;
    if spec.contains(',') {
        return Err(invalid());
    }
    let (start_str, end_str) = spec.split_once('-').ok_or_else(invalid)?;

    let start = parse_offset(start_str).ok_or_else(invalid)?;
    let last_byte = total_size - 1;
    if start > last_byte {
        return Err(RangeError::NotSatisfiable { start, total_size });
    }

    let end = if end_str.trim().is_empty() {
        last_byte
    } else {
        parse_offset(end_str).ok_or_else(invalid)?.min(last_byte)
    };
    if end < start {
        return Err(RangeError::NotSatisfiable { start, total_size });
    }

    Ok(RangeResolution::Partial(RangeSpec {
        start,
        end,
        total: total_size,
    }))
}

/// Digits only. Offsets too large for `u64` saturate so they clamp or go unsatisfiable.
fn parse_offset(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(raw.parse().unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn partial(header: &str, total: u64) -> RangeSpec {
        match resolve(Some(header), total) {
            Ok(RangeResolution::Partial(spec)) => spec,
            other => panic!("expected partial range for {header:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_absent_header_is_full_content() {
        assert_eq!(resolve(None, 1000), Ok(RangeResolution::NoRange));
    }

    #[test]
    fn test_closed_range() {
        let spec = partial("bytes=0-99", 1000);
        assert_eq!((spec.start, spec.end, spec.chunk_size()), (0, 99, 100));
        assert_eq!(spec.content_range(), "bytes 0-99/1000");
    }

    #[test]
    fn test_open_ended_range_runs_to_last_byte() {
        let spec = partial("bytes=500-", 1000);
        assert_eq!((spec.start, spec.end, spec.chunk_size()), (500, 999, 500));
    }

    #[test]
    fn test_end_past_last_byte_is_clamped() {
        let spec = partial("bytes=900-5000", 1000);
        assert_eq!((spec.end, spec.chunk_size()), (999, 100));
    }

    #[test]
    fn test_overflowing_end_is_clamped() {
        let spec = partial("bytes=0-99999999999999999999", 1000);
        assert_eq!((spec.start, spec.end, spec.chunk_size()), (0, 999, 1000));
    }

    #[test]
    fn test_single_last_byte() {
        let spec = partial("bytes=999-999", 1000);
        assert_eq!(spec.chunk_size(), 1);
        assert_eq!(spec.content_range(), "bytes 999-999/1000");
    }

    #[test]
    fn test_empty_file_ignores_range() {
        assert_eq!(resolve(Some("bytes=0-10"), 0), Ok(RangeResolution::NoRange));
    }

    #[test]
    fn test_malformed_headers_are_invalid() {
        for header in [
            "bytes=abc-100",
            "bytes=-500",
            "bytes=",
            "bytes=10",
            "items=0-10",
            "0-10",
            "bytes=0-10,20-30",
            "bytes=+5-10",
            "bytes=5-x",
        ] {
            assert!(
                matches!(resolve(Some(header), 1000), Err(RangeError::InvalidRange { .. })),
                "expected {header:?} to be invalid"
            );
        }
    }

    #[test]
    fn test_start_past_end_of_file_not_satisfiable() {
        assert_eq!(
            resolve(Some("bytes=1000-"), 1000),
            Err(RangeError::NotSatisfiable {
                start: 1000,
                total_size: 1000
            })
        );
    }

    #[test]
    fn test_overflowing_start_not_satisfiable() {
        assert_eq!(
            resolve(Some("bytes=99999999999999999999-"), 1000),
            Err(RangeError::NotSatisfiable {
                start: u64::MAX,
                total_size: 1000
            })
        );
    }

    #[test]
    fn test_inverted_range_not_satisfiable() {
        assert!(matches!(
            resolve(Some("bytes=500-100"), 1000),
            Err(RangeError::NotSatisfiable { .. })
        ));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            RangeError::InvalidRange {
                header: "x".to_string()
            }
            .code(),
            ErrorCode::InvalidRange
        );
        assert_eq!(
            RangeError::NotSatisfiable {
                start: 1,
                total_size: 1
            }
            .code(),
            ErrorCode::RangeNotSatisfiable
        );
    }

    proptest! {
        #[test]
        fn prop_valid_interval_round_trips(
            (total, start, end) in (1u64..u64::MAX / 2)
                .prop_flat_map(|total| (Just(total), 0..total))
                .prop_flat_map(|(total, start)| (Just(total), Just(start), start..total))
        ) {
            let spec = partial(&format!("bytes={start}-{end}"), total);
            prop_assert_eq!(spec.chunk_size(), end - start + 1);
            prop_assert_eq!(spec.content_range(), format!("bytes {start}-{end}/{total}"));
        }

        #[test]
        fn prop_start_at_or_past_size_not_satisfiable(
            (total, start) in (1u64..1_000_000_000)
                .prop_flat_map(|total| (Just(total), total..u64::MAX))
        ) {
            let result = resolve(Some(&format!("bytes={start}-")), total);
            let is_not_satisfiable = matches!(result, Err(RangeError::NotSatisfiable { .. }));
            prop_assert!(is_not_satisfiable);
        }
    }
}
