use super::*;
use crate::catalog::Product;

fn shop() -> ShopConfig {
    ShopConfig {
        name: "AURAFLORA".to_string(),
        prompt_notes: "Delivery: 8:00-21:00, island-wide.\nPayment before delivery."
            .to_string(),
    }
}

fn products() -> Vec<Product> {
    vec![Product {
        id: "p1".to_string(),
        name: "Rose Bouquet".to_string(),
        price: Some(1500.0),
        image_url: None,
        description: None,
        available: true,
    }]
}

#[test]
fn instruction_names_the_shop_and_notes() {
    let builder = PromptBuilder::new(&shop());
    let out = builder.system_instruction(None, &products(), None);

    assert!(out.contains("AURAFLORA flower shop"));
    assert!(out.contains("SHOP NOTES:\nDelivery: 8:00-21:00"));
}

#[test]
fn language_defaults_to_english_until_recorded() {
    let builder = PromptBuilder::new(&shop());

    let auto = builder.system_instruction(None, &products(), None);
    assert!(auto.contains("Answer in English by default"));

    let thai = builder.system_instruction(Some(Language::Thai), &products(), None);
    assert!(thai.contains("The customer writes in Thai. Always answer in Thai."));
}

#[test]
fn catalog_rides_along_as_numbered_list() {
    let builder = PromptBuilder::new(&shop());
    let out = builder.system_instruction(None, &products(), None);

    assert!(out.contains("AVAILABLE PRODUCTS:"));
    assert!(out.contains("1. Rose Bouquet - 1500 THB [id: p1]"));
}

#[test]
fn recorded_order_is_reinjected() {
    let builder = PromptBuilder::new(&shop());

    let fresh = builder.system_instruction(None, &products(), None);
    assert!(fresh.contains("CURRENTLY RECORDED ORDER: nothing yet."));

    let summary = "Order s1\nStatus: draft\nItems:\n  1. Rose Bouquet x1\n";
    let ongoing = builder.system_instruction(None, &products(), Some(summary));
    assert!(ongoing.contains("CURRENTLY RECORDED ORDER (do not ask again"));
    assert!(ongoing.contains("1. Rose Bouquet x1"));
}

#[test]
fn every_command_type_is_advertised() {
    let builder = PromptBuilder::new(&shop());
    let out = builder.system_instruction(None, &products(), None);

    for kind in [
        "send_catalog",
        "save_order_info",
        "update_order_delivery",
        "add_order_item",
        "remove_order_item",
        "confirm_order",
        "clarify_request",
    ] {
        assert!(out.contains(kind), "missing command {kind}");
    }
}

#[test]
fn reply_contract_demands_text_with_commands() {
    let builder = PromptBuilder::new(&shop());
    let out = builder.system_instruction(None, &products(), None);

    assert!(out.contains("\"text_en\""));
    assert!(out.contains("\"text_th\""));
    assert!(out.contains("\"text\" must never be empty, even when a command is present."));
    assert!(out.contains("Encode every line break inside JSON strings as \\n."));
}
