use super::*;
use crate::AurabotError;
use proptest::prelude::*;

proptest! {
    #[test]
    fn parser_never_panics(s in "\\PC*") {
        let _ = parse_reply(&s);
    }

    #[test]
    fn literal_newlines_in_text_survive(a in "[a-zA-Z]{1,40}", b in "[a-zA-Z]{1,40}") {
        let raw = format!("{{\"text\": \"{a}\n{b}\"}}");
        let reply = parse_reply(&raw).unwrap();
        prop_assert_eq!(reply.text, format!("{a}\n{b}"));
    }
}

#[test]
fn parses_plain_json_object() {
    let reply = parse_reply(r#"{"text": "Hello!", "text_en": "Hello!", "text_th": "สวัสดี"}"#)
        .unwrap();
    assert_eq!(reply.text, "Hello!");
    assert_eq!(reply.text_en.as_deref(), Some("Hello!"));
    assert_eq!(reply.text_th.as_deref(), Some("สวัสดี"));
    assert!(reply.command.is_none());
}

#[test]
fn strips_code_fences_with_language_tag() {
    let raw = "```json\n{\"text\": \"hi\"}\n```";
    assert_eq!(parse_reply(raw).unwrap().text, "hi");
}

#[test]
fn strips_bare_code_fences() {
    let raw = "```\n{\"text\": \"hi\"}\n```";
    assert_eq!(parse_reply(raw).unwrap().text, "hi");
}

#[test]
fn finds_object_inside_surrounding_prose() {
    let raw = "Sure, here is the reply:\n{\"text\": \"hi\"}\nHope that helps!";
    assert_eq!(parse_reply(raw).unwrap().text, "hi");
}

#[test]
fn escapes_literal_newline_inside_string_value() {
    let raw = "{\"text\": \"line one\nline two\"}";
    let reply = parse_reply(raw).unwrap();
    assert_eq!(reply.text, "line one\nline two");
}

#[test]
fn escapes_several_newlines_in_one_value() {
    let raw = "{\"text\": \"a\nb\nc\nd\"}";
    assert_eq!(parse_reply(raw).unwrap().text, "a\nb\nc\nd");
}

#[test]
fn keeps_structural_newlines_of_pretty_printed_json() {
    let raw = "{\n  \"text\": \"hi\",\n  \"text_en\": \"hi\"\n}";
    let reply = parse_reply(raw).unwrap();
    assert_eq!(reply.text, "hi");
    assert_eq!(reply.text_en.as_deref(), Some("hi"));
}

#[test]
fn handles_value_newlines_in_pretty_printed_json() {
    let raw = "{\n  \"text\": \"first\nsecond\",\n  \"command\": null\n}";
    assert_eq!(parse_reply(raw).unwrap().text, "first\nsecond");
}

#[test]
fn carriage_returns_are_escaped_too() {
    let raw = "{\"text\": \"a\r\nb\"}";
    assert_eq!(parse_reply(raw).unwrap().text, "a\r\nb");
}

#[test]
fn retry_pass_rescues_raw_tabs_in_strings() {
    let raw = "{\"text\": \"col1\tcol2\"}";
    assert_eq!(parse_reply(raw).unwrap().text, "col1\tcol2");
}

#[test]
fn retry_pass_completes_dangling_backslash_before_newline() {
    let raw = "{\"text\": \"abc\\\ndef\"}";
    assert_eq!(parse_reply(raw).unwrap().text, "abc\ndef");
}

#[test]
fn no_braces_is_a_parse_failure() {
    let err = parse_reply("I could not produce JSON, sorry.").unwrap_err();
    assert!(matches!(err, AurabotError::Parse(_)));
}

#[test]
fn undecodable_span_is_a_parse_failure() {
    let err = parse_reply("{\"text\": }").unwrap_err();
    assert!(matches!(err, AurabotError::Parse(_)));
}

#[test]
fn empty_text_without_command_is_a_validation_failure() {
    let err = parse_reply(r#"{"text": ""}"#).unwrap_err();
    assert!(matches!(err, AurabotError::Validation(_)));
}

#[test]
fn whitespace_text_without_command_is_a_validation_failure() {
    let err = parse_reply(r#"{"text": "   "}"#).unwrap_err();
    assert!(matches!(err, AurabotError::Validation(_)));
}

#[test]
fn missing_text_with_command_still_parses() {
    let reply = parse_reply(r#"{"text": "", "command": {"type": "send_catalog"}}"#).unwrap();
    assert!(!reply.has_text());
    assert_eq!(reply.command.unwrap().kind, "send_catalog");
}

#[test]
fn text_without_command_is_valid() {
    let reply = parse_reply(r#"{"text": "ok"}"#).unwrap();
    assert!(reply.has_text());
    assert!(reply.command.is_none());
}

#[test]
fn null_command_reads_as_absent() {
    let reply = parse_reply(r#"{"text": "ok", "command": null}"#).unwrap();
    assert!(reply.command.is_none());
}

#[test]
fn bare_string_command_is_a_validation_failure() {
    let err = parse_reply(r#"{"text": "ok", "command": "send_catalog"}"#).unwrap_err();
    assert!(matches!(err, AurabotError::Validation(_)));
}

#[test]
fn array_command_is_a_validation_failure() {
    let err = parse_reply(r#"{"text": "ok", "command": [1, 2]}"#).unwrap_err();
    assert!(matches!(err, AurabotError::Validation(_)));
}

#[test]
fn command_without_type_is_a_validation_failure() {
    let err = parse_reply(r#"{"text": "ok", "command": {"bouquet": "roses"}}"#).unwrap_err();
    assert!(matches!(err, AurabotError::Validation(_)));
}

#[test]
fn non_string_command_type_is_a_validation_failure() {
    let err = parse_reply(r#"{"text": "ok", "command": {"type": 42}}"#).unwrap_err();
    assert!(matches!(err, AurabotError::Validation(_)));
}

#[test]
fn command_fields_are_preserved_for_dispatch() {
    let raw = r#"{"text": "Added!", "command": {"type": "add_order_item", "bouquet": "Red Roses", "quantity": 2}}"#;
    let reply = parse_reply(raw).unwrap();
    let command = reply.command.unwrap();
    assert_eq!(command.kind, "add_order_item");
    assert_eq!(
        command.fields.get("bouquet").and_then(|v| v.as_str()),
        Some("Red Roses")
    );
    assert_eq!(
        command.fields.get("quantity").and_then(serde_json::Value::as_u64),
        Some(2)
    );
    assert!(!command.fields.contains_key("type"));
}

#[test]
fn text_thai_alias_maps_to_text_th() {
    let reply = parse_reply(r#"{"text": "hi", "text_thai": "สวัสดี"}"#).unwrap();
    assert_eq!(reply.text_th.as_deref(), Some("สวัสดี"));
}

#[test]
fn empty_translations_read_as_absent() {
    let reply = parse_reply(r#"{"text": "hi", "text_en": "", "text_th": "  "}"#).unwrap();
    assert!(reply.text_en.is_none());
    assert!(reply.text_th.is_none());
}

#[test]
fn interior_formatting_is_never_reflowed() {
    let raw = "{\"text\": \"Price:  1,500 THB \u{1F490}\n\n  - delivery included\"}";
    let reply = parse_reply(raw).unwrap();
    assert_eq!(reply.text, "Price:  1,500 THB \u{1F490}\n\n  - delivery included");
}

#[test]
fn fence_stripping_leaves_plain_text_untouched() {
    assert_eq!(strip_fences("no fences here"), "no fences here");
}

#[test]
fn brace_span_is_greedy_outermost() {
    assert_eq!(brace_span("x {\"a\": {\"b\": 1}} y"), Some("{\"a\": {\"b\": 1}}"));
    assert_eq!(brace_span("no braces"), None);
    assert_eq!(brace_span("} reversed {"), None);
}
