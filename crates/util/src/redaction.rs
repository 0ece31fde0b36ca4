//! Redaction of sensitive-looking parameter values before they reach the logs.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

const REDACTED: &str = "[REDACTED]";

static SENSITIVE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(key|token|secret|password|passwd|credential|dsn|auth)").expect("sensitive name regex should compile")
});

static INLINE_SECRET_REGEXES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization: )([\w\-\.=:/+]+)",
        r"(?i)([A-Z0-9_]*?(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)",
        r"(?i)(://[^:/@\s]+:)([^@\s]+)(@)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("redaction regex should compile"))
    .collect()
});

/// Whether a parameter name suggests its value is a credential.
pub fn is_sensitive_name(name: &str) -> bool {
    SENSITIVE_NAME_REGEX.is_match(name)
}

/// Returns the value unchanged, or a redaction marker when `name` looks sensitive.
pub fn redact_value(name: &str, value: &Value) -> Value {
    if is_sensitive_name(name) {
        return Value::String(REDACTED.to_string());
    }
    value.clone()
}

/// Redacts values that look like secrets inside free text such as error messages.
pub fn redact_sensitive(input: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in INLINE_SECRET_REGEXES.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}{REDACTED}{suffix}")
            })
            .into_owned();
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sensitive_names_are_redacted() {
        assert_eq!(redact_value("api_token", &json!("abc")), json!("[REDACTED]"));
        assert_eq!(redact_value("limit", &json!(10)), json!(10));
    }

    #[test]
    fn inline_secrets_are_redacted() {
        assert_eq!(redact_sensitive("API_KEY=abc123 limit=1"), "API_KEY=[REDACTED] limit=1");
        assert_eq!(
            redact_sensitive("connect to pg://reports:hunter2@db failed"),
            "connect to pg://reports:[REDACTED]@db failed"
        );
    }
}
