//! Class-name merging and style objects.

use std::fmt::Write as _;

use crate::value::{format_number, Value};

/// Merge a class value into a space-separated class string.
///
/// Strings are kept, falsy values dropped, arrays flattened and objects
/// contribute each key whose value is truthy.
///
/// ```ignore
/// let classes = Value::from(vec![
///     Value::from("box"),
///     Value::from("large"),
///     Value::object([("border", false), ("rounded", true)]),
/// ]);
/// assert_eq!(merge_class_names(&classes), "box large rounded");
/// ```
pub fn merge_class_names(value: &Value) -> String {
    let mut out = Vec::new();
    collect_classes(value, &mut out);
    out.join(" ")
}

fn collect_classes(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.extend(s.split_whitespace().map(str::to_string)),
        Value::Number(n) if *n != 0.0 && !n.is_nan() => out.push(format_number(*n)),
        Value::Array(items) => items.iter().for_each(|item| collect_classes(item, out)),
        Value::Object(map) => {
            for (name, enabled) in map {
                if enabled.is_truthy() {
                    out.push(name.clone());
                }
            }
        }
        Value::Signal(signal) => collect_classes(signal.value(), out),
        _ => {}
    }
}

/// A style object split into inline declarations and rule blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Css {
    /// `prop:value;prop:value` for the element itself.
    pub inline: String,
    /// `(selector key, declarations)` for `:hover`, `::before`, `@media ..`
    /// and `& ..` entries, in insertion order.
    pub rules: Vec<(String, String)>,
}

impl Css {
    /// Render the rule blocks (and the inline declarations) as a stylesheet
    /// scoped to `selector`.
    pub fn stylesheet(&self, selector: &str) -> String {
        let mut css = String::new();
        if !self.inline.is_empty() {
            let _ = write!(css, "{selector}{{{}}}", self.inline);
        }
        for (key, body) in &self.rules {
            if key.starts_with('@') {
                let _ = write!(css, "{key}{{{selector}{{{body}}}}}");
            } else if key.contains('&') {
                let _ = write!(css, "{}{{{body}}}", key.replace('&', selector));
            } else {
                let _ = write!(css, "{selector}{key}{{{body}}}");
            }
        }
        css
    }
}

/// Properties whose numeric values take no `px` suffix.
const UNITLESS: &[&str] = &[
    "animation-iteration-count",
    "aspect-ratio",
    "column-count",
    "columns",
    "fill-opacity",
    "flex",
    "flex-grow",
    "flex-shrink",
    "font-weight",
    "grid-area",
    "grid-column",
    "grid-column-end",
    "grid-column-start",
    "grid-row",
    "grid-row-end",
    "grid-row-start",
    "line-clamp",
    "line-height",
    "opacity",
    "order",
    "orphans",
    "scale",
    "stroke-opacity",
    "stroke-width",
    "tab-size",
    "widows",
    "z-index",
    "zoom",
];

/// Convert a style object into inline declarations and rule blocks.
///
/// Keys are camelCase or kebab-case property names; numbers get `px` unless
/// the property is unitless. Keys starting with `:`, `@` or containing `&`
/// hold nested objects that become rule blocks.
pub fn style_to_css(style: &Value) -> Css {
    let mut css = Css::default();
    let Value::Object(map) = style else {
        if let Some(s) = style.as_str() {
            css.inline = s.to_string();
        }
        return css;
    };
    let mut inline = Vec::new();
    for (key, value) in map {
        if key.starts_with(':') || key.starts_with('@') || key.contains('&') {
            let nested = style_to_css(value);
            if !nested.inline.is_empty() {
                css.rules.push((key.clone(), nested.inline));
            }
            continue;
        }
        if let Some(decl) = declaration(key, value) {
            inline.push(decl);
        }
    }
    css.inline = inline.join(";");
    css
}

fn declaration(key: &str, value: &Value) -> Option<String> {
    let prop = if key.starts_with("--") {
        key.to_string()
    } else {
        kebab_case(key)
    };
    let value = match value {
        Value::Null | Value::Bool(false) => return None,
        Value::Number(n) if UNITLESS.contains(&prop.as_str()) || *n == 0.0 => format_number(*n),
        Value::Number(n) => format!("{}px", format_number(*n)),
        Value::Signal(signal) => return declaration(key, signal.value()),
        other => other.stringify(),
    };
    Some(format!("{prop}:{value}"))
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            // Vendor prefixes: `WebkitTransition` -> `-webkit-transition`.
            if i > 0 || name.starts_with(|c: char| c.is_ascii_uppercase()) {
                out.push('-');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// 32-bit rolling hash (`h * 31 + c`), printed in base 36.
pub fn hash_css(css: &str) -> String {
    let mut h: i32 = 0;
    for unit in css.encode_utf16() {
        h = h.wrapping_mul(31).wrapping_add(unit as i32);
    }
    to_base36(h.unsigned_abs())
}

fn to_base36(mut n: u32) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::new();
    while n > 0 {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_class_names_drops_falsy_entries() {
        let value = Value::from(vec![
            Value::from("box"),
            Value::Bool(false),
            Value::Null,
            Value::Null,
            Value::object(Vec::<(String, Value)>::new()),
        ]);
        assert_eq!(merge_class_names(&value), "box");
    }

    #[test]
    fn test_kebab_case() {
        assert_eq!(kebab_case("fontSize"), "font-size");
        assert_eq!(kebab_case("WebkitTransition"), "-webkit-transition");
        assert_eq!(kebab_case("color"), "color");
    }

    #[test]
    fn test_style_rules() {
        let style = Value::object([
            ("color", Value::from("red")),
            (":hover", Value::object([("color", "blue")])),
            ("@media (max-width: 600px)", Value::object([("padding", 0)])),
        ]);
        let css = style_to_css(&style);
        assert_eq!(css.inline, "color:red");
        assert_eq!(css.rules.len(), 2);
        assert_eq!(
            css.stylesheet("[data-css-x]"),
            "[data-css-x]{color:red}[data-css-x]:hover{color:blue}\
             @media (max-width: 600px){[data-css-x]{padding:0}}"
        );
    }

    #[test]
    fn test_nesting_rule() {
        let style = Value::object([("& > p", Value::object([("marginTop", 4)]))]);
        let css = style_to_css(&style);
        assert_eq!(css.inline, "");
        assert_eq!(css.stylesheet(".s"), ".s > p{margin-top:4px}");
    }

    #[test]
    fn test_hash_css() {
        assert_eq!(hash_css(""), "0");
        assert_eq!(hash_css("a"), "2p");
        assert_eq!(hash_css("ab"), hash_css("ab"));
        assert_ne!(hash_css("ab"), hash_css("ba"));
    }
}
