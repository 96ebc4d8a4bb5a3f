//! Tool-call recognition in raw model output.
//!
//! Two surface forms are understood:
//!
//! ```text
//! <function_call>memory_search</function_call><arguments>{"query": "x"}</arguments>
//! CALL: search_memory("x")
//! ```
//!
//! The tagged form carries named JSON arguments and is the primary
//! protocol. The `NAME(ARG)` form (with optional `CALL:` prefix) carries a
//! single positional argument. Anything else is a final answer; parsing
//! never fails.
//!
//! The argument blob runs to the last `</arguments>` in the reply, so a JSON
//! string may itself contain that closing tag.

use regex_lite::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static FUNCTION_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^<function_call>\s*([A-Za-z_][A-Za-z0-9_]*)\s*</function_call>(?:\s*<arguments>(.*)</arguments>)?",
    )
    .expect("function_call pattern")
});

static POSITIONAL_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(?:CALL:\s*)?([A-Za-z_][A-Za-z0-9_]*)\((.*)\)$").expect("positional pattern")
});

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]*)"|'([^']*)'"#).expect("quoted pattern"));

/// What one model reply turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Plain text for the user
    Answer(String),
    /// A request to run a tool
    Call(CallRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub name: String,
    pub arguments: CallArguments,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallArguments {
    /// A JSON object from the tagged form
    Named(Map<String, Value>),
    /// The single argument of the `NAME(ARG)` form, unquoted; may be empty
    Positional(String),
    /// The tagged form matched but its argument blob is unusable
    Malformed(String),
}

/// Classify a model reply.
pub fn parse(output: &str) -> Parsed {
    let text = output.trim();

    if let Some(caps) = FUNCTION_CALL.captures(text) {
        let name = caps[1].to_string();
        let arguments = match caps.get(2) {
            Some(blob) => parse_json_arguments(blob.as_str()),
            None if text[caps.get(0).map_or(0, |m| m.end())..].contains("<arguments>") => {
                CallArguments::Malformed("unterminated <arguments> block".into())
            }
            None => CallArguments::Named(Map::new()),
        };
        return Parsed::Call(CallRequest { name, arguments });
    }

    if let Some(caps) = POSITIONAL_CALL.captures(text) {
        return Parsed::Call(CallRequest {
            name: caps[1].to_string(),
            arguments: CallArguments::Positional(unquote(&caps[2])),
        });
    }

    Parsed::Answer(output.to_string())
}

fn parse_json_arguments(blob: &str) -> CallArguments {
    let blob = blob.trim();
    if blob.is_empty() {
        return CallArguments::Named(Map::new());
    }
    match serde_json::from_str::<Value>(blob) {
        Ok(Value::Object(map)) => CallArguments::Named(map),
        Ok(other) => CallArguments::Malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        )),
        Err(e) => CallArguments::Malformed(e.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Strip quoting from a positional argument.
///
/// `"London"` becomes `London`; a list of quoted pieces such as
/// `"London", "CA"` is joined with commas; unquoted text is only trimmed.
fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    let pieces: Vec<&str> = QUOTED
        .captures_iter(raw)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| m.as_str())
        .collect();
    if pieces.is_empty() {
        return raw.to_string();
    }
    let leftover = QUOTED.replace_all(raw, "");
    if leftover.chars().all(|c| c == ',' || c.is_whitespace()) {
        pieces.join(",")
    } else {
        raw.to_string()
    }
}
