//! HTML and script escaping.

use std::borrow::Cow;

use crate::value::{format_number, Value};

/// Escape `& < > " '` for use in text content or a quoted attribute.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    html_escape::encode_quoted_attribute(s)
}

/// Render a value as text content.
///
/// `null`, booleans and non-data values produce nothing; numbers print as
/// decimals without escaping; everything else is stringified and escaped.
pub fn escape_for_text(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(_) => String::new(),
        Value::Number(n) => format_number(*n),
        Value::String(s) => escape_html(s).into_owned(),
        Value::Signal(signal) => escape_for_text(signal.value()),
        Value::Handler(_) | Value::Node(_) | Value::Component(_) => String::new(),
        other => escape_html(&other.stringify()).into_owned(),
    }
}

/// Escape a verbatim style string for a double-quoted attribute. Only `<`,
/// `>` and `"` are touched so CSS selectors survive.
pub fn escape_style(s: &str) -> String {
    s.replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Make JavaScript source safe to embed in an inline `<script>`.
pub fn escape_script(js: &str) -> String {
    js.replace("</", "<\\/")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
}

/// Serialize JSON for embedding in an inline `<script>`.
pub fn json_for_script(json: &serde_json::Value) -> String {
    escape_script(&json.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html_escapes_all_special_characters() {
        let escaped = escape_html(r#"<a href='x'>&"</a>"#);
        for raw in ['<', '>', '"', '\''] {
            assert!(!escaped.contains(raw), "{raw} left in {escaped}");
        }
        assert!(escaped.starts_with("&lt;a href="));
        assert!(escaped.contains("&amp;"));
    }

    #[test]
    fn test_escape_for_text() {
        assert_eq!(escape_for_text(&Value::Null), "");
        assert_eq!(escape_for_text(&Value::Bool(true)), "");
        assert_eq!(escape_for_text(&Value::from(42)), "42");
        assert_eq!(escape_for_text(&Value::from("a < b")), "a &lt; b");
    }

    #[test]
    fn test_escape_script() {
        assert_eq!(escape_script("'</script>'"), "'<\\/script>'");
    }
}
