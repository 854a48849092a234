//! Redaction of sensitive fields from structured data.
//!
//! Anything headed for the audit trail or a log line passes through here
//! first; once sanitized, a value never needs re-sanitization before
//! display.

use serde_json::Value;

/// Replacement marker for redacted values.
pub const REDACTION_MARKER: &str = "[REDACTED]";

/// Field-name fragments that mark a value as sensitive. Matching is
/// case-insensitive substring, so `apiKey`, `refresh_token`, and
/// `authHeader` all match.
const SENSITIVE_KEYWORDS: &[&str] = &[
    "password",
    "token",
    "apikey",
    "api_key",
    "secret",
    "credential",
    "auth",
    "key",
];

/// Deep-walks a structured value and redacts any field whose name matches
/// the sensitive-keyword set.
///
/// Objects and arrays are recursed into; scalar values and non-container
/// roots pass through unchanged.
pub fn sanitize_for_logging(data: &Value) -> Value {
    match data {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTION_MARKER.to_string()));
                } else {
                    out.insert(key.clone(), sanitize_for_logging(value));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sanitize_for_logging).collect()),
        other => other.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lowered = key.to_lowercase();
    SENSITIVE_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_top_level_fields() {
        let sanitized = sanitize_for_logging(&json!({
            "password": "hunter2",
            "username": "ada",
        }));
        assert_eq!(sanitized["password"], REDACTION_MARKER);
        assert_eq!(sanitized["username"], "ada");
    }

    #[test]
    fn test_redacts_nested_objects() {
        let sanitized = sanitize_for_logging(&json!({
            "password": "x",
            "nested": { "apiKey": "y", "ok": "z" },
        }));
        assert_eq!(sanitized["password"], REDACTION_MARKER);
        assert_eq!(sanitized["nested"]["apiKey"], REDACTION_MARKER);
        assert_eq!(sanitized["nested"]["ok"], "z");
    }

    #[test]
    fn test_redacts_arrays_element_wise() {
        let sanitized = sanitize_for_logging(&json!([
            { "token": "a", "id": 1 },
            { "token": "b", "id": 2 },
        ]));
        assert_eq!(sanitized[0]["token"], REDACTION_MARKER);
        assert_eq!(sanitized[1]["token"], REDACTION_MARKER);
        assert_eq!(sanitized[0]["id"], 1);
        assert_eq!(sanitized[1]["id"], 2);
    }

    #[test]
    fn test_case_insensitive_substring_match() {
        let sanitized = sanitize_for_logging(&json!({
            "ApiKey": "a",
            "refreshToken": "b",
            "AUTH_HEADER": "c",
            "sshKey": "d",
            "clientSecret": "e",
            "credentials": "f",
        }));
        for field in ["ApiKey", "refreshToken", "AUTH_HEADER", "sshKey", "clientSecret", "credentials"] {
            assert_eq!(sanitized[field], REDACTION_MARKER, "{} not redacted", field);
        }
    }

    #[test]
    fn test_non_string_sensitive_values_redacted() {
        let sanitized = sanitize_for_logging(&json!({ "apiKey": { "id": 1, "value": "x" } }));
        assert_eq!(sanitized["apiKey"], REDACTION_MARKER);
    }

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(sanitize_for_logging(&json!("plain")), json!("plain"));
        assert_eq!(sanitize_for_logging(&json!(42)), json!(42));
        assert_eq!(sanitize_for_logging(&json!(null)), json!(null));
        assert_eq!(sanitize_for_logging(&json!(true)), json!(true));
    }

    #[test]
    fn test_benign_fields_untouched() {
        let input = json!({
            "email": "a@example.com",
            "count": 3,
            "items": ["x", "y"],
        });
        assert_eq!(sanitize_for_logging(&input), input);
    }
}
