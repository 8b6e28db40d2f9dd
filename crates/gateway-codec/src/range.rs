use gateway_core::Region;
use rand::Rng;

/// Minimum number of leading dashes a generated multipart boundary carries,
/// per RFC 7233's recommendation to make accidental collisions with body
/// content implausible.
const BOUNDARY_DASH_COUNT: usize = 26;
const BOUNDARY_LEN: usize = 50;

/// The outcome of parsing a `Range` header against a known total size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedRange {
    /// A single satisfiable range.
    Single(Region),
    /// Two or more satisfiable ranges, to be served as `multipart/byteranges`.
    Multi(Vec<Region>),
    /// Every requested range falls entirely outside `[0, total_size)`.
    Unsatisfiable,
    /// The header value does not parse as a `Range` header; per RFC 7233 an
    /// unparseable range is ignored and the full payload is served.
    Malformed,
}

/// Parses a `Range: bytes=...` header value against `total_size`.
pub fn parse_range(header_value: &str, total_size: u64) -> ParsedRange {
    let Some(spec) = header_value.strip_prefix("bytes=") else {
        return ParsedRange::Malformed;
    };
    if spec.is_empty() {
        return ParsedRange::Malformed;
    }

    let mut satisfiable = Vec::new();
    for part in spec.split(',') {
        match parse_one_spec(part.trim(), total_size) {
            Ok(Some(region)) => satisfiable.push(region),
            Ok(None) => {}
            Err(()) => return ParsedRange::Malformed,
        }
    }

    if satisfiable.is_empty() {
        return ParsedRange::Unsatisfiable;
    }
    if satisfiable.len() == 1 {
        ParsedRange::Single(satisfiable[0])
    } else {
        ParsedRange::Multi(satisfiable)
    }
}

/// Parses one comma-separated range-spec. `Ok(None)` means syntactically
/// valid but unsatisfiable against `total_size` (e.g. past the end).
fn parse_one_spec(part: &str, total_size: u64) -> Result<Option<Region>, ()> {
    let (start_str, end_str) = part.split_once('-').ok_or(())?;

    if start_str.is_empty() {
        // Suffix range `-N`: the last N bytes.
        let suffix_len: u64 = end_str.parse().map_err(|_| ())?;
        if suffix_len == 0 || total_size == 0 {
            return Ok(None);
        }
        let start = total_size.saturating_sub(suffix_len);
        return Ok(Some(Region::new(start, total_size - start)));
    }

    let start: u64 = start_str.parse().map_err(|_| ())?;
    if end_str.is_empty() {
        if start >= total_size {
            return Ok(None);
        }
        return Ok(Some(Region::new(start, total_size - start)));
    }

    let end: u64 = end_str.parse().map_err(|_| ())?;
    if end < start || start >= total_size {
        return Ok(None);
    }
    let end = end.min(total_size.saturating_sub(1));
    Ok(Region::from_inclusive(start, end))
}

/// Resolves a `Range` header into a `Region` usable to scope an upstream
/// fetch *before* the total payload size is known.
///
/// Only a single, fully-specified `bytes=start-end` spec can be resolved
/// this way: a suffix spec (`-N`) or an open-ended spec (`start-`) needs
/// the total size to compute, and a multi-range spec can't be represented
/// as one upstream-scoped window at all. Those forms return `None` here;
/// callers fall back to an unscoped fetch and resolve the `Range` against
/// the real size (via `parse_range`) once it's known.
pub fn region_from_explicit_range(header_value: &str) -> Option<Region> {
    let spec = header_value.strip_prefix("bytes=")?;
    if spec.contains(',') {
        return None;
    }
    let (start_str, end_str) = spec.split_once('-')?;
    if start_str.is_empty() || end_str.is_empty() {
        return None;
    }
    let start: u64 = start_str.trim().parse().ok()?;
    let end: u64 = end_str.trim().parse().ok()?;
    Region::from_inclusive(start, end)
}

/// Generates a multipart/byteranges boundary: `BOUNDARY_DASH_COUNT` dashes
/// followed by random hex digits, `BOUNDARY_LEN` characters total.
pub fn generate_boundary() -> String {
    let mut boundary = "-".repeat(BOUNDARY_DASH_COUNT);
    let mut rng = rand::thread_rng();
    for _ in 0..(BOUNDARY_LEN - BOUNDARY_DASH_COUNT) {
        let digit = rng.gen_range(0..16u8);
        boundary.push(std::char::from_digit(digit as u32, 16).unwrap());
    }
    boundary
}

/// Renders the header block preceding one part's bytes in a
/// `multipart/byteranges` body.
pub fn multipart_part_header(
    boundary: &str,
    content_type: &str,
    region: &Region,
    total_size: u64,
) -> String {
    format!(
        "--{boundary}\r\nContent-Type: {content_type}\r\nContent-Range: bytes {}-{}/{}\r\n\r\n",
        region.offset,
        region.end_inclusive(),
        total_size
    )
}

/// Renders the terminating boundary of a `multipart/byteranges` body.
pub fn multipart_closing_boundary(boundary: &str) -> String {
    format!("--{boundary}--\r\n")
}

#[cfg(test)]
mod tests {
    use super::{generate_boundary, parse_range, ParsedRange};
    use gateway_core::Region;

    #[test]
    fn single_byte_range_returns_exactly_one_byte() {
        let parsed = parse_range("bytes=0-0", 100);
        assert_eq!(parsed, ParsedRange::Single(Region::new(0, 1)));
    }

    #[test]
    fn suffix_range_returns_last_n_bytes() {
        let parsed = parse_range("bytes=-500", 1000);
        assert_eq!(parsed, ParsedRange::Single(Region::new(500, 500)));
    }

    #[test]
    fn suffix_longer_than_total_clamps_to_whole_payload() {
        let parsed = parse_range("bytes=-5000", 1000);
        assert_eq!(parsed, ParsedRange::Single(Region::new(0, 1000)));
    }

    #[test]
    fn range_starting_past_end_is_unsatisfiable() {
        let parsed = parse_range("bytes=1000-1010", 1000);
        assert_eq!(parsed, ParsedRange::Unsatisfiable);
    }

    #[test]
    fn range_extending_past_end_is_clamped_not_rejected() {
        let parsed = parse_range("bytes=900-2000", 1000);
        assert_eq!(parsed, ParsedRange::Single(Region::new(900, 100)));
    }

    #[test]
    fn multiple_ranges_produce_multi_variant_in_order() {
        let parsed = parse_range("bytes=0-9,20-29", 100);
        assert_eq!(
            parsed,
            ParsedRange::Multi(vec![Region::new(0, 10), Region::new(20, 10)])
        );
    }

    #[test]
    fn missing_bytes_prefix_is_malformed_not_unsatisfiable() {
        assert_eq!(parse_range("items=0-10", 100), ParsedRange::Malformed);
    }

    #[test]
    fn non_numeric_range_is_malformed() {
        assert_eq!(parse_range("bytes=abc-10", 100), ParsedRange::Malformed);
    }

    #[test]
    fn explicit_range_resolves_without_needing_total_size() {
        use super::region_from_explicit_range;
        assert_eq!(
            region_from_explicit_range("bytes=10-19"),
            Some(Region::new(10, 10))
        );
    }

    #[test]
    fn suffix_open_ended_and_multi_ranges_do_not_resolve_explicitly() {
        use super::region_from_explicit_range;
        assert_eq!(region_from_explicit_range("bytes=-500"), None);
        assert_eq!(region_from_explicit_range("bytes=500-"), None);
        assert_eq!(region_from_explicit_range("bytes=0-9,20-29"), None);
        assert_eq!(region_from_explicit_range("items=0-10"), None);
    }

    #[test]
    fn generated_boundary_has_expected_shape() {
        let boundary = generate_boundary();
        assert_eq!(boundary.len(), 50);
        assert!(boundary[..26].chars().all(|c| c == '-'));
        assert!(boundary[26..].chars().all(|c| c.is_ascii_hexdigit()));
    }
}
