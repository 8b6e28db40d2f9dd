use gateway_core::RequestAttributes;

/// Header names carrying forwarded per-request metadata across hops, per
/// the external interface's hop-header contract.
pub const HOPS_HEADER: &str = "x-ar-io-hops";
pub const ORIGIN_HEADER: &str = "x-ar-io-origin";
pub const ORIGIN_RELEASE_HEADER: &str = "x-ar-io-origin-release";
pub const ARNS_NAME_HEADER: &str = "x-ar-io-arns-name";
pub const ARNS_BASENAME_HEADER: &str = "x-ar-io-arns-basename";
pub const ARNS_RECORD_HEADER: &str = "x-ar-io-arns-record";

/// Builds a [`RequestAttributes`] from an incoming request's headers.
/// `lookup` is queried by lowercase header name; a missing or
/// non-numeric `hops` value is treated as zero, matching a first-hop
/// request with no prior gateway in the chain.
pub fn attributes_from_headers<F>(mut lookup: F) -> RequestAttributes
where
    F: FnMut(&str) -> Option<String>,
{
    let hops = lookup(HOPS_HEADER)
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);
    RequestAttributes {
        hops,
        origin: lookup(ORIGIN_HEADER),
        origin_release: lookup(ORIGIN_RELEASE_HEADER),
        arns_name: lookup(ARNS_NAME_HEADER),
        arns_basename: lookup(ARNS_BASENAME_HEADER),
        arns_record: lookup(ARNS_RECORD_HEADER),
    }
}

/// Renders the header set to attach to a forwarded upstream request, with
/// `hops` already incremented.
pub fn headers_for_forward(attrs: &RequestAttributes) -> Vec<(&'static str, String)> {
    let forwarded = attrs.incremented();
    let mut headers = vec![(HOPS_HEADER, forwarded.hops.to_string())];
    if let Some(origin) = forwarded.origin {
        headers.push((ORIGIN_HEADER, origin));
    }
    if let Some(release) = forwarded.origin_release {
        headers.push((ORIGIN_RELEASE_HEADER, release));
    }
    if let Some(name) = forwarded.arns_name {
        headers.push((ARNS_NAME_HEADER, name));
    }
    if let Some(basename) = forwarded.arns_basename {
        headers.push((ARNS_BASENAME_HEADER, basename));
    }
    if let Some(record) = forwarded.arns_record {
        headers.push((ARNS_RECORD_HEADER, record));
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_hops_header_defaults_to_zero() {
        let attrs = attributes_from_headers(|_| None);
        assert_eq!(attrs.hops, 0);
    }

    #[test]
    fn parses_hops_and_origin_from_header_map() {
        let mut headers = HashMap::new();
        headers.insert(HOPS_HEADER.to_string(), "2".to_string());
        headers.insert(ORIGIN_HEADER.to_string(), "gateway.example".to_string());
        let attrs = attributes_from_headers(|name| headers.get(name).cloned());
        assert_eq!(attrs.hops, 2);
        assert_eq!(attrs.origin.as_deref(), Some("gateway.example"));
    }

    #[test]
    fn forward_headers_increment_hops_and_omit_unset_fields() {
        let attrs = RequestAttributes {
            hops: 3,
            ..Default::default()
        };
        let headers = headers_for_forward(&attrs);
        assert_eq!(headers, vec![(HOPS_HEADER, "4".to_string())]);
    }
}
