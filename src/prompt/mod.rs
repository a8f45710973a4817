use crate::catalog::{self, Product};
use crate::config::ShopConfig;
use crate::lang::Language;
use chrono::{FixedOffset, Utc};

/// Shop-local timezone (Asia/Bangkok, UTC+7, no DST).
const SHOP_UTC_OFFSET_HOURS: i32 = 7;

const REPLY_FORMAT: &str = r#"CRITICAL: ALWAYS respond with a single JSON object:
- "text" - the message in the customer's language
- "text_en" - English translation of the message
- "text_th" - Thai translation of the message
- "command" - an action object with a "type" field, or null when no action is needed

Example:
{
  "text": "Hello! Would you like to see our flower catalog?",
  "text_en": "Hello! Would you like to see our flower catalog?",
  "text_th": "สวัสดี! คุณต้องการดูแคตตาล็อกดอกไม้ของเราไหม?",
  "command": null
}

RULES:
- "text" must never be empty, even when a command is present.
- Encode every line break inside JSON strings as \n. Never put a raw line break inside a string.
- Break the message into short paragraphs.
- Do not use emojis, unless a product name itself contains one.
- Never show internal ids or codes to the customer, only product names and prices."#;

const COMMANDS: &str = r#"COMMANDS (set as "command", always together with customer-facing "text"):
- {"type": "send_catalog"} - send the product catalog with photos
- {"type": "save_order_info", ...} - save whatever order data the customer just gave; accepts "retailer_id" + "bouquet" (plus "quantity", "notes") for a product, and the fields "date" (YYYY-MM-DD), "time" (HH:MM), "delivery_needed", "address", "card_needed", "card_text", "recipient_name", "recipient_phone"
- {"type": "update_order_delivery", ...} - update delivery fields only: "date", "time", "delivery_needed", "address"
- {"type": "add_order_item", "retailer_id": "...", "bouquet": "...", "quantity": N} - add one catalog product to the order
- {"type": "remove_order_item", "product_id": "..."} - remove a product from the order
- {"type": "confirm_order"} - confirm the completed order and hand it over to staff
- {"type": "clarify_request", "clarification": "..."} - record that you had to ask the customer to clarify

Use exact product names and ids from the catalog below. Never invent products."#;

const WORKFLOW: &str = r#"WORKFLOW (do not repeat questions the customer already answered):
1. Greet and offer the catalog (text only, no command)
2. Customer agrees -> send_catalog
3. Bouquet chosen -> save it and ask whether delivery is needed
4. Delivery answered -> ask for the address (when delivering), date and time
5. Date and time saved -> ask whether a card is needed and its text
6. Card settled -> ask for the recipient's name and phone
7. Everything collected -> show a summary and ask the customer to confirm
8. Customer confirms -> confirm_order
Delivery hours are 08:00-21:00."#;

/// Assembles the per-completion system instruction.
///
/// The stable shop identity comes from config; catalog, recorded language and
/// order state vary per call. Everything the model needs to answer coherently
/// is in this one string; the transcript it rides with carries only the
/// conversation itself.
pub struct PromptBuilder {
    shop_name: String,
    prompt_notes: String,
}

impl PromptBuilder {
    pub fn new(shop: &ShopConfig) -> Self {
        Self {
            shop_name: shop.name.clone(),
            prompt_notes: shop.prompt_notes.trim().to_string(),
        }
    }

    pub fn system_instruction(
        &self,
        language: Option<Language>,
        products: &[Product],
        order_summary: Option<&str>,
    ) -> String {
        let mut parts = Vec::new();

        parts.push(format!(
            "You are a friendly consultant for the {} flower shop on WhatsApp.",
            self.shop_name
        ));
        parts.push(language_line(language));
        parts.push(REPLY_FORMAT.to_string());
        parts.push(COMMANDS.to_string());
        parts.push(WORKFLOW.to_string());

        if !self.prompt_notes.is_empty() {
            parts.push(format!("SHOP NOTES:\n{}", self.prompt_notes));
        }

        parts.push(clock_line());
        parts.push(catalog::format_for_prompt(products).trim_end().to_string());

        match order_summary {
            Some(summary) => parts.push(format!(
                "CURRENTLY RECORDED ORDER (do not ask again for what is already here):\n{}",
                summary.trim_end()
            )),
            None => parts.push("CURRENTLY RECORDED ORDER: nothing yet.".to_string()),
        }

        parts.join("\n\n")
    }
}

fn language_line(language: Option<Language>) -> String {
    match language {
        Some(lang) => format!(
            "IMPORTANT: The customer writes in {lang}. Always answer in {lang}."
        ),
        None => {
            "IMPORTANT: Answer in English by default. If the customer writes in another \
             language, answer in that language."
                .to_string()
        }
    }
}

fn clock_line() -> String {
    let now = match FixedOffset::east_opt(SHOP_UTC_OFFSET_HOURS * 3600) {
        Some(offset) => Utc::now()
            .with_timezone(&offset)
            .format("%d %B %Y, %H:%M")
            .to_string(),
        None => Utc::now().format("%d %B %Y, %H:%M UTC").to_string(),
    };
    format!(
        "CURRENT TIME AT THE SHOP (GMT+7): {now}\n\
         Resolve relative dates like \"tomorrow\" against this clock."
    )
}

#[cfg(test)]
mod tests;
