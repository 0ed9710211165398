//! Form helpers shared by the submission and edit flows

/// Split a comma-separated field into trimmed, non-empty items.
///
/// `"a, b ,c"` becomes `["a", "b", "c"]`; an empty string yields `[]`.
pub fn parse_comma_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decode a stored keyword or link column.
///
/// Accepts a JSON array, a single JSON string, or legacy plain text
/// separated by `,` or `;`.
pub fn parse_keyword_field(stored: &str) -> Vec<String> {
    let trimmed = stored.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s.trim().to_string()),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|item| !item.is_empty())
            .collect(),
        Ok(serde_json::Value::String(s)) => parse_keyword_field(&s),
        _ => trimmed
            .split([',', ';'])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Encode a list for a JSON text column
pub fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Bytes to MiB, rounded to two decimals
pub fn round_mb(bytes: u64) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

/// Trim a value; blank becomes `None`
pub fn trimmed_or_none(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
