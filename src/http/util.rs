//! Pure helpers for request metadata: pagination and request ids.

use std::collections::HashMap;

use reqwest::header::HeaderMap;
use serde::Serialize;

use super::client::generate_request_id;

pub const DEFAULT_PAGE_LIMIT: u64 = 10;
pub const MAX_PAGE_LIMIT: u64 = 100;

const INCOMING_ID_HEADERS: [&str; 2] = ["x-request-id", "x-correlation-id"];

/// Page window derived from `page` and `limit` query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationParams {
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
}

impl PaginationParams {
    /// Reads `page` and `limit` from `query`.
    ///
    /// A missing, unparsable or zero `page` is 1, a negative one is clamped to 1.
    /// A missing, unparsable or zero `limit` is `default_limit`; any other value
    /// is clamped to `1..=max_limit`.
    pub fn from_query(
        query: &HashMap<String, String>,
        default_limit: u64,
        max_limit: u64,
    ) -> Self {
        let max_limit = max_limit.max(1);
        let page = match query.get("page").and_then(|v| leading_int(v)) {
            None | Some(0) => 1,
            Some(page) => page.max(1) as u64,
        };
        let limit = match query.get("limit").and_then(|v| leading_int(v)) {
            None | Some(0) => default_limit,
            Some(limit) => limit.max(1) as u64,
        };
        let limit = limit.clamp(1, max_limit);

        Self {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
        }
    }
}

/// [`PaginationParams::from_query`] with a default limit of 10 and a maximum of 100.
pub fn pagination_params(query: &HashMap<String, String>) -> PaginationParams {
    PaginationParams::from_query(query, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT)
}

/// Reuses an incoming `X-Request-Id`, then `X-Correlation-Id`, or generates a new id.
pub fn request_id_from_headers(headers: &HeaderMap) -> String {
    INCOMING_ID_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_request_id)
}

/// Parses an optional sign followed by leading digits, ignoring any trailing text.
fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (negative, rest) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let magnitude = rest[..end].parse::<i64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}
