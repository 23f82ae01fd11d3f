//! The server-to-client wire protocol.
//!
//! Every flush may carry a script payload made of these statements:
//!
//! | Statement | Meaning |
//! |---|---|
//! | `$MS({"S:K":v,..})` | initial field values |
//! | `$MC(S,N,function(){..},["S:K",..])` | computation `N` of scope `S` and its dependencies |
//! | `$MF("S_Q",function(event){..})` | event handler `Q` of scope `S` |
//! | `$ME(S,function(){..})` | effect to run once scope `S` is mounted |
//! | `$FLAGS="s\|c\|f"` | id counters and loaded features, sent back as `x-flags` |

use std::fmt::{self, Write as _};
use std::str::FromStr;

use indexmap::IndexMap;

use crate::error::RenderError;
use crate::escape::escape_script;
use crate::runtime::Features;
use crate::signal::{ClientFn, Computation};
use crate::value::Value;

/// Id counters and loaded runtime features of a page.
///
/// A follow-up fetch sends these back in `x-flags` so the server continues
/// numbering scopes and chunks where the page left off and skips runtime
/// modules the client already has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags {
    /// The last scope id handed out.
    pub scope: u32,
    /// The last chunk id handed out.
    pub chunk: u32,
    /// Runtime modules already sent.
    pub features: Features,
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.scope, self.chunk, self.features.bits())
    }
}

impl FromStr for Flags {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RenderError::InvalidFlags(s.to_string());
        let mut parts = s.trim().split('|');
        let mut next = || -> Result<u32, RenderError> {
            parts
                .next()
                .ok_or_else(invalid)?
                .parse()
                .map_err(|_| invalid())
        };
        let flags = Flags {
            scope: next()?,
            chunk: next()?,
            features: Features::from_bits_truncate(next()?),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(flags)
    }
}

/// Builds the script payload of one flush.
#[derive(Debug, Default)]
pub struct Script {
    js: String,
}

impl Script {
    /// An empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no statement was added.
    pub fn is_empty(&self) -> bool {
        self.js.is_empty()
    }

    /// Append raw JavaScript (runtime modules).
    pub fn raw(&mut self, js: &str) {
        if !js.is_empty() {
            self.js.push_str(js);
            self.js.push('\n');
        }
    }

    /// `$MS(..)`: initial field values keyed `scope:key`.
    pub fn signals(&mut self, entries: &[(String, Value)]) {
        if entries.is_empty() {
            return;
        }
        let _ = writeln!(self.js, "$MS({});", encode_signal_init(entries));
    }

    /// `$MC(..)`: a computation registration.
    pub fn computation(&mut self, computation: &Computation) {
        let deps = serde_json::Value::Array(
            computation
                .deps
                .iter()
                .map(|dep| serde_json::Value::String(dep.to_string()))
                .collect(),
        );
        let _ = writeln!(
            self.js,
            "$MC({},{},{},{});",
            computation.scope, computation.id, computation.body, deps
        );
    }

    /// `$MF(..)`: an event handler registration.
    pub fn handler(&mut self, id: &str, f: &ClientFn) {
        let _ = writeln!(self.js, "$MF({},{});", serde_json::Value::from(id), f);
    }

    /// `$ME(..)`: an effect.
    pub fn effect(&mut self, scope: u32, f: &ClientFn) {
        let _ = writeln!(self.js, "$ME({scope},{f});");
    }

    /// Client-side navigation.
    pub fn redirect(&mut self, to: &str) {
        let _ = writeln!(self.js, "location.href={};", serde_json::Value::from(to));
    }

    /// The `$FLAGS` line.
    pub fn flags(&mut self, flags: &Flags) {
        let _ = writeln!(self.js, "$FLAGS=\"{flags}\";");
    }

    /// The payload as JavaScript, safe to embed in a `<script>` element.
    pub fn into_js(self) -> String {
        escape_script(&self.js)
    }

    /// The payload wrapped in a `<script>` element, or nothing if empty.
    pub fn into_tag(self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!("<script>{}</script>", self.into_js())
        }
    }
}

/// Encode field values as the `$MS` argument, preserving order.
pub fn encode_signal_init(entries: &[(String, Value)]) -> String {
    let mut out = String::from("{");
    for (i, (key, value)) in entries.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&serde_json::Value::from(key.as_str()).to_string());
        out.push(':');
        out.push_str(&value.to_json().to_string());
    }
    out.push('}');
    out
}

/// Parse every `$MS(..)` statement of a payload back into `scope:key` values,
/// the way the client store constructor reads them.
pub fn decode_signal_init(js: &str) -> Result<IndexMap<String, Value>, RenderError> {
    let mut values = IndexMap::new();
    let mut rest = js;
    while let Some(start) = rest.find("$MS(") {
        rest = &rest[start + 4..];
        let mut stream =
            serde_json::Deserializer::from_str(rest).into_iter::<serde_json::Value>();
        let object = match stream.next() {
            Some(Ok(serde_json::Value::Object(object))) => object,
            Some(Err(err)) => return Err(err.into()),
            _ => return Err(RenderError::InvalidProps("$MS expects an object".into())),
        };
        rest = &rest[stream.byte_offset()..];
        for (key, value) in object {
            values.insert(key, Value::from(value));
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_display_and_parse() {
        let flags = Flags {
            scope: 12,
            chunk: 3,
            features: Features::SIGNALS | Features::SUSPENSE,
        };
        assert_eq!(flags.to_string(), "12|3|9");
        assert_eq!("12|3|9".parse::<Flags>().unwrap(), flags);
    }

    #[test]
    fn test_flags_reject_garbage() {
        assert!("".parse::<Flags>().is_err());
        assert!("1|2".parse::<Flags>().is_err());
        assert!("1|x|3".parse::<Flags>().is_err());
        assert!("1|2|3|4".parse::<Flags>().is_err());
    }

    #[test]
    fn test_script_statements() {
        let mut script = Script::new();
        script.handler("2_0", &ClientFn::body("this.n++"));
        script.effect(2, &ClientFn::new("function(){}"));
        script.redirect("/login");
        assert_eq!(
            script.into_js(),
            "$MF(\"2_0\",function(event){this.n++});\n$ME(2,function(){});\nlocation.href=\"/login\";\n"
        );
    }

    #[test]
    fn test_script_tag_escapes_closing_tags() {
        let mut script = Script::new();
        script.signals(&[("1:html".to_string(), Value::from("</script>"))]);
        let tag = script.into_tag();
        assert!(tag.starts_with("<script>$MS("));
        assert_eq!(tag.matches("</script>").count(), 1);
        assert!(Script::new().into_tag().is_empty());
    }
}
