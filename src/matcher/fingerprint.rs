//! Low-cardinality request fingerprints.
//!
//! Each component hash is the first 8 hex digits of a SHA-256 digest, or an
//! empty string when the component has no input.

use sha2::{Digest, Sha256};

use crate::domain::Parameter;

/// Headers carrying the client address, in bitmask order.
const IP_ORIGIN_HEADERS: [&str; 10] = [
    "x-forwarded-for",
    "x-real-ip",
    "true-client-ip",
    "x-client-ip",
    "x-forwarded",
    "forwarded-for",
    "x-cluster-client-ip",
    "fastly-client-ip",
    "cf-connecting-ip",
    "cf-connecting-ipv6",
];

/// Well-known headers, in bitmask order.
const KNOWN_HEADERS: [&str; 10] = [
    "referer",
    "connection",
    "accept-encoding",
    "content-encoding",
    "cache-control",
    "te",
    "accept-charset",
    "content-type",
    "accept",
    "accept-language",
];

const EXCLUDED_HEADERS: [&str; 3] = ["user-agent", "cookie", "x-datadog-trace-id"];

fn truncated_hash(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let digest = Sha256::digest(input.as_bytes());
    let mut encoded = hex::encode(digest);
    encoded.truncate(8);
    encoded
}

/// Sorted keys of a map, empty for anything else.
fn sorted_keys(param: Option<&Parameter>) -> Vec<String> {
    let mut keys: Vec<String> = param
        .map(Parameter::entries)
        .unwrap_or_default()
        .iter()
        .map(|(k, _)| k.clone())
        .collect();
    keys.sort();
    keys
}

/// First string found in a scalar or an array of values.
fn first_string(param: &Parameter) -> Option<&str> {
    match param {
        Parameter::String(s) => Some(s),
        Parameter::Array(items) => items.iter().find_map(first_string),
        _ => None,
    }
}

/// Header map with lowercased names.
fn normalized_headers(headers: &Parameter) -> Vec<(String, &Parameter)> {
    headers
        .entries()
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect()
}

fn bitmask(names: &[&str], present: impl Fn(&str) -> bool) -> String {
    names.iter().map(|n| if present(n) { '1' } else { '0' }).collect()
}

/// `http-<method>-<uri hash>-<query keys hash>-<body keys hash>`
pub(crate) fn http_endpoint(
    method: &Parameter,
    uri_raw: &Parameter,
    query: Option<&Parameter>,
    body: Option<&Parameter>,
) -> Option<String> {
    let method = method.as_str()?.to_ascii_lowercase();
    let uri = uri_raw.as_str()?;
    let path = uri.split(['?', '#']).next().unwrap_or_default();

    Some(format!(
        "http-{}-{}-{}-{}",
        method,
        truncated_hash(path),
        truncated_hash(&sorted_keys(query).join(",")),
        truncated_hash(&sorted_keys(body).join(",")),
    ))
}

/// `net-<ip count>-<origin header bitmask>`
pub(crate) fn http_network(headers: &Parameter) -> Option<String> {
    if !headers.is_map() {
        return None;
    }
    let headers = normalized_headers(headers);
    let find = |name: &str| headers.iter().find(|(k, _)| k == name).map(|(_, v)| *v);

    let ip_count = IP_ORIGIN_HEADERS
        .iter()
        .find_map(|name| find(name))
        .and_then(first_string)
        .map(|v| v.split(',').filter(|ip| !ip.trim().is_empty()).count())
        .unwrap_or(0);

    Some(format!(
        "net-{}-{}",
        ip_count,
        bitmask(&IP_ORIGIN_HEADERS, |name| find(name).is_some())
    ))
}

/// `hdr-<known header bitmask>-<user agent hash>-<unknown count>-<unknown hash>`
pub(crate) fn http_header(headers: &Parameter) -> Option<String> {
    if !headers.is_map() {
        return None;
    }
    let headers = normalized_headers(headers);
    let present = |name: &str| headers.iter().any(|(k, _)| k == name);

    let user_agent = headers
        .iter()
        .find(|(k, _)| k == "user-agent")
        .and_then(|(_, v)| first_string(v))
        .unwrap_or_default();

    let mut unknown: Vec<&str> = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .filter(|k| {
            !KNOWN_HEADERS.contains(k)
                && !IP_ORIGIN_HEADERS.contains(k)
                && !EXCLUDED_HEADERS.contains(k)
        })
        .collect();
    unknown.sort_unstable();
    unknown.dedup();

    Some(format!(
        "hdr-{}-{}-{}-{}",
        bitmask(&KNOWN_HEADERS, present),
        truncated_hash(user_agent),
        unknown.len(),
        truncated_hash(&unknown.join(",")),
    ))
}

/// `ssn-<user id hash>-<cookie keys hash>-<cookie values hash>-<session id hash>`
pub(crate) fn session(
    cookies: Option<&Parameter>,
    session_id: Option<&Parameter>,
    user_id: Option<&Parameter>,
) -> Option<String> {
    if cookies.is_none() && session_id.is_none() && user_id.is_none() {
        return None;
    }

    let mut cookie_pairs: Vec<(&str, &str)> = cookies
        .map(Parameter::entries)
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.as_str(), first_string(v).unwrap_or_default()))
        .collect();
    cookie_pairs.sort_by(|a, b| a.0.cmp(b.0));
    let keys: Vec<&str> = cookie_pairs.iter().map(|(k, _)| *k).collect();
    let values: Vec<&str> = cookie_pairs.iter().map(|(_, v)| *v).collect();

    let scalar = |p: Option<&Parameter>| p.and_then(Parameter::scalar_string).unwrap_or_default();

    Some(format!(
        "ssn-{}-{}-{}-{}",
        truncated_hash(&scalar(user_id)),
        truncated_hash(&keys.join(",")),
        truncated_hash(&values.join(",")),
        truncated_hash(&scalar(session_id)),
    ))
}
