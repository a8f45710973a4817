pub mod repair;

use crate::errors::AurabotError;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

/// A model-issued command before typed decoding: the `type` discriminant plus
/// whatever other fields the model attached to it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommand {
    pub kind: String,
    pub fields: serde_json::Map<String, Value>,
}

/// The structured payload the model is instructed to emit: user-facing text,
/// optional translations, and an optional command.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReply {
    pub text: String,
    pub text_en: Option<String>,
    pub text_th: Option<String>,
    pub command: Option<RawCommand>,
}

impl ParsedReply {
    /// Whether the reply can be sent to the user as-is. A bare command with
    /// no text is not sendable; the model has to say what it did.
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Regex for fence-opening lines (three backticks with an optional language
/// tag).
fn fence_open_re() -> &'static Regex {
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^```[a-zA-Z]*\n").expect("failed to compile fence open regex")
    });
    &RE
}

/// Regex for fence-closing backticks at the end of a line.
fn fence_close_re() -> &'static Regex {
    static RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)\n```$").expect("failed to compile fence close regex"));
    &RE
}

/// Extract a [`ParsedReply`] from a raw completion.
///
/// Models are instructed to answer with a single JSON object but routinely
/// wrap it in code fences or put literal line breaks inside string values.
/// The pipeline: strip fences, take the outermost brace span, escape raw
/// line breaks inside quoted strings, decode; on decode failure escape all
/// control characters and retry once. Reply text is never reformatted beyond
/// that escaping.
///
/// Failures split into [`AurabotError::Parse`] (no JSON, or undecodable) and
/// [`AurabotError::Validation`] (decoded fine but the shape is unusable).
pub fn parse_reply(raw: &str) -> Result<ParsedReply, AurabotError> {
    let cleaned = strip_fences(raw);
    let Some(span) = brace_span(&cleaned) else {
        return Err(AurabotError::Parse(
            "completion contains no JSON object".to_string(),
        ));
    };

    let value = match serde_json::from_str::<Value>(&escape_string_breaks(span, false)) {
        Ok(v) => v,
        Err(first) => {
            debug!("completion decode failed ({first}), retrying with full control escaping");
            serde_json::from_str::<Value>(&escape_string_breaks(span, true))
                .map_err(|e| AurabotError::Parse(format!("completion is not valid JSON: {e}")))?
        }
    };

    reply_from_value(value)
}

/// Remove markdown code fences while leaving the fenced content in place.
fn strip_fences(raw: &str) -> String {
    let cleaned = fence_open_re().replace_all(raw, "");
    let cleaned = fence_close_re().replace_all(&cleaned, "");
    cleaned.replace("```", "").trim().to_string()
}

/// The outermost `{...}` span: greedy, first opening brace to last closing
/// brace.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Escape raw control characters that appear inside double-quoted strings.
///
/// Walks the text tracking string state, so line breaks between tokens of
/// pretty-printed JSON are left alone. The narrow pass touches only `\n` and
/// `\r` (the mistake models actually make); the aggressive pass escapes every
/// control character and also completes a dangling backslash before a line
/// break.
fn escape_string_breaks(json: &str, aggressive: bool) -> String {
    let mut out = String::with_capacity(json.len() + 8);
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }
        if escaped {
            escaped = false;
            match c {
                '\n' if aggressive => out.push('n'),
                '\r' if aggressive => out.push('r'),
                _ => out.push(c),
            }
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' if aggressive => out.push_str("\\t"),
            c if aggressive && (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out
}

fn reply_from_value(value: Value) -> Result<ParsedReply, AurabotError> {
    let Value::Object(mut obj) = value else {
        return Err(AurabotError::Parse(
            "completion JSON is not an object".to_string(),
        ));
    };

    let text = match obj.get("text") {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => String::new(),
    };
    let text_en = string_field(&obj, "text_en");
    let text_th = string_field(&obj, "text_th").or_else(|| string_field(&obj, "text_thai"));

    let command = match obj.remove("command") {
        None | Some(Value::Null) => None,
        Some(Value::Object(mut fields)) => {
            let kind = match fields.remove("type") {
                Some(Value::String(k)) if !k.trim().is_empty() => k,
                _ => {
                    return Err(AurabotError::Validation(
                        "command object is missing a string 'type'".to_string(),
                    ));
                }
            };
            Some(RawCommand { kind, fields })
        }
        Some(Value::String(word)) => {
            return Err(AurabotError::Validation(format!(
                "command must be an object, got bare string '{word}'"
            )));
        }
        Some(other) => {
            return Err(AurabotError::Validation(format!(
                "command must be an object, got {}",
                json_kind(&other)
            )));
        }
    };

    if text.is_empty() && command.is_none() {
        return Err(AurabotError::Validation(
            "reply has neither text nor a command".to_string(),
        ));
    }

    Ok(ParsedReply {
        text,
        text_en,
        text_th,
        command,
    })
}

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests;
