use serde_json::Value;

/// Extract a string field, treating null/absent/non-string as `None`.
pub fn get_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> {
    v.get(key).and_then(|x| x.as_str())
}

/// Extract a string field, with a fallback for missing/deleted values.
pub fn str_or<'a>(v: &'a Value, key: &str, default: &'a str) -> &'a str {
    get_str(v, key).filter(|s| !s.is_empty()).unwrap_or(default)
}

/// Extract an integer field. Reddit serializes `created_utc` both as int and
/// float depending on the capture, so accept either.
pub fn get_i64(v: &Value, key: &str) -> Option<i64> {
    let x = v.get(key)?;
    x.as_i64().or_else(|| x.as_f64().map(|f| f as i64))
}

/// The record's fullname (`name` field, e.g. `t3_abc` / `t1_abc`).
pub fn fullname(v: &Value) -> Option<&str> {
    get_str(v, "name").filter(|s| !s.is_empty())
}

/// Decode HTML entities Reddit leaves in structured URLs (`&amp;` etc.).
pub fn decode_url(url: &str) -> String {
    html_escape::decode_html_entities(url).into_owned()
}

/// True for an absolute http(s) URL. Filters out `thumbnail` placeholders
/// like "self", "default", "nsfw".
pub fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}
