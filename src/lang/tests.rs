use super::*;

#[test]
fn detects_english() {
    assert_eq!(detect("Hello, I want to order flowers"), Language::English);
}

#[test]
fn detects_thai() {
    assert_eq!(detect("สวัสดีค่ะ อยากสั่งดอกไม้"), Language::Thai);
}

#[test]
fn detects_russian() {
    assert_eq!(detect("Здравствуйте, хочу заказать букет"), Language::Russian);
}

#[test]
fn mixed_text_uses_dominance_ratio() {
    // Mostly English with a Thai word: Thai ratio stays under 0.3
    assert_eq!(
        detect("I want to order sawasdee กuandsomelongenglishtail flowers today please"),
        Language::English
    );
    // Thai with a short latin product code still reads as Thai
    assert_eq!(detect("สั่งช่อ p1 หน่อยค่ะ"), Language::Thai);
}

#[test]
fn empty_and_symbolic_input_defaults_to_english() {
    assert_eq!(detect(""), Language::English);
    assert_eq!(detect("123 👍 ..."), Language::English);
}

#[test]
fn serde_round_trip_is_lowercase() {
    let json = serde_json::to_string(&Language::Thai).unwrap();
    assert_eq!(json, "\"thai\"");
    let back: Language = serde_json::from_str(&json).unwrap();
    assert_eq!(back, Language::Thai);
}

#[test]
fn display_matches_prompt_wording() {
    assert_eq!(Language::Russian.to_string(), "Russian");
}
