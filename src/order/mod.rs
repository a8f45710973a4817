use crate::errors::AurabotError;
use chrono::{Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Working hours for deliveries, minutes from midnight (08:00 to 21:00).
const OPEN_MINUTES: u32 = 8 * 60;
const CLOSE_MINUTES: u32 = 21 * 60;

/// How far ahead a delivery date can sit before we flag it.
const MAX_LEAD_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Draft,
    Confirmed,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    fn rank(self) -> Option<u8> {
        match self {
            Self::Draft => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Completed => Some(3),
            Self::Cancelled => None,
        }
    }

    /// Forward moves along draft → confirmed → processing → completed, plus
    /// cancellation from any non-terminal state. Nothing leaves a terminal
    /// state.
    pub fn can_transition(self, next: OrderStatus) -> bool {
        match (self.rank(), next.rank()) {
            (Some(_), None) => self != Self::Completed,
            (Some(from), Some(to)) => to > from,
            (None, _) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Outcome of [`OrderAggregate::validate`]. `warnings` never block
/// confirmation; `missing_required` does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub complete: bool,
    pub missing_required: Vec<String>,
    pub warnings: Vec<String>,
}

/// The order draft for one session. `order_id` doubles as the session id;
/// there is at most one aggregate per session and it is created lazily by the
/// first mutating command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAggregate {
    pub order_id: String,
    pub sender_id: String,
    pub status: OrderStatus,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_needed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_needed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_phone: Option<String>,
}

impl OrderAggregate {
    pub fn new(session_id: impl Into<String>, sender_id: impl Into<String>) -> Self {
        Self {
            order_id: session_id.into(),
            sender_id: sender_id.into(),
            status: OrderStatus::Draft,
            items: Vec::new(),
            date: None,
            time: None,
            delivery_needed: None,
            address: None,
            card_needed: None,
            card_text: None,
            recipient_name: None,
            recipient_phone: None,
        }
    }

    /// Insert or replace by `product_id`. A repeated product updates the
    /// existing line instead of appending a second one. Quantity is floored
    /// to 1; "zero of something" is not an order line.
    pub fn upsert_item(&mut self, mut item: OrderItem) {
        item.quantity = item.quantity.max(1);
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.product_id == item.product_id)
        {
            *existing = item;
        } else {
            self.items.push(item);
        }
    }

    /// Remove by `product_id`. Returns `false` when no such line exists;
    /// removing an absent item is not an error.
    pub fn remove_item(&mut self, product_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.product_id != product_id);
        self.items.len() < before
    }

    /// Merge only the keys present in `patch` into the general fields.
    /// Unknown keys are ignored so newer model-side vocabularies do not break
    /// older deployments. Returns the names of the fields actually applied.
    pub fn apply_fields(&mut self, patch: &serde_json::Map<String, Value>) -> Vec<&'static str> {
        let mut applied = Vec::new();
        for (key, value) in patch {
            let hit = match key.as_str() {
                "date" => set_text(&mut self.date, value).then_some("date"),
                "time" => set_text(&mut self.time, value).then_some("time"),
                "delivery_needed" => {
                    set_flag(&mut self.delivery_needed, value).then_some("delivery_needed")
                }
                "address" => set_text(&mut self.address, value).then_some("address"),
                "card_needed" => set_flag(&mut self.card_needed, value).then_some("card_needed"),
                "card_text" => set_text(&mut self.card_text, value).then_some("card_text"),
                "recipient_name" => {
                    set_text(&mut self.recipient_name, value).then_some("recipient_name")
                }
                "recipient_phone" => {
                    set_text(&mut self.recipient_phone, value).then_some("recipient_phone")
                }
                _ => None,
            };
            if let Some(name) = hit {
                applied.push(name);
            }
        }
        applied
    }

    /// Completeness check used by `confirm_order`. Required: at least one
    /// item, a date and a time. Address becomes required when delivery is
    /// requested, card text when a card is requested. Warnings flag
    /// deliveries outside working hours and dates in the past or more than
    /// 30 days out; they never block.
    pub fn validate(&self) -> ValidationReport {
        let mut missing = Vec::new();
        let mut warnings = Vec::new();

        if self.items.is_empty() {
            missing.push("items".to_string());
        }
        match self.date.as_deref() {
            None | Some("") => missing.push("date".to_string()),
            Some(raw) => check_date(raw, &mut warnings),
        }
        match self.time.as_deref() {
            None | Some("") => missing.push("time".to_string()),
            Some(raw) => check_time(raw, &mut warnings),
        }
        if self.delivery_needed == Some(true) && is_blank(self.address.as_deref()) {
            missing.push("address".to_string());
        }
        if self.card_needed == Some(true) && is_blank(self.card_text.as_deref()) {
            missing.push("card_text".to_string());
        }

        ValidationReport {
            complete: missing.is_empty(),
            missing_required: missing,
            warnings,
        }
    }

    /// Move the order along its lifecycle, rejecting backward or
    /// out-of-terminal moves.
    pub fn advance(&mut self, next: OrderStatus) -> Result<(), AurabotError> {
        if !self.status.can_transition(next) {
            return Err(AurabotError::BusinessRule(format!(
                "order {} cannot move from {:?} to {next:?}",
                self.order_id, self.status
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Deterministic human-readable rendering. The same text goes to staff
    /// notifications and back into the model prompt as "what is recorded so
    /// far", so the model never has to re-derive structured state from chat.
    pub fn summary(&self) -> String {
        let mut out = format!("Order {}\nStatus: {}\n", self.order_id, status_label(self.status));
        if self.items.is_empty() {
            out.push_str("Items: (none)\n");
        } else {
            out.push_str("Items:\n");
            for (idx, item) in self.items.iter().enumerate() {
                out.push_str(&format!("  {}. {} x{}", idx + 1, item.name, item.quantity));
                if let Some(price) = item.price {
                    out.push_str(&format!(" - {price} THB"));
                }
                if let Some(notes) = item.notes.as_deref().filter(|n| !n.trim().is_empty()) {
                    out.push_str(&format!(" ({notes})"));
                }
                out.push('\n');
            }
        }
        if let Some(date) = self.date.as_deref().filter(|v| !v.is_empty()) {
            out.push_str(&format!("Date: {date}\n"));
        }
        if let Some(time) = self.time.as_deref().filter(|v| !v.is_empty()) {
            out.push_str(&format!("Time: {time}\n"));
        }
        if let Some(delivery) = self.delivery_needed {
            out.push_str(&format!(
                "Delivery: {}\n",
                if delivery { "yes" } else { "self-pickup" }
            ));
        }
        if let Some(address) = self.address.as_deref().filter(|v| !v.is_empty()) {
            out.push_str(&format!("Address: {address}\n"));
        }
        if self.card_needed == Some(true) {
            match self.card_text.as_deref().filter(|v| !v.is_empty()) {
                Some(text) => out.push_str(&format!("Card text: {text}\n")),
                None => out.push_str("Card text: (not provided)\n"),
            }
        }
        if let Some(name) = self.recipient_name.as_deref().filter(|v| !v.is_empty()) {
            out.push_str(&format!("Recipient: {name}\n"));
        }
        if let Some(phone) = self.recipient_phone.as_deref().filter(|v| !v.is_empty()) {
            out.push_str(&format!("Recipient phone: {phone}\n"));
        }
        out
    }
}

fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Draft => "draft",
        OrderStatus::Confirmed => "confirmed",
        OrderStatus::Processing => "processing",
        OrderStatus::Completed => "completed",
        OrderStatus::Cancelled => "cancelled",
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// Accept strings as-is and numbers by rendering (phone digits often arrive
/// as JSON numbers). Anything else leaves the field untouched.
fn set_text(slot: &mut Option<String>, value: &Value) -> bool {
    match value {
        Value::String(s) => {
            *slot = Some(s.clone());
            true
        }
        Value::Number(n) => {
            *slot = Some(n.to_string());
            true
        }
        _ => false,
    }
}

fn set_flag(slot: &mut Option<bool>, value: &Value) -> bool {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };
    match parsed {
        Some(flag) => {
            *slot = Some(flag);
            true
        }
        None => false,
    }
}

fn check_date(raw: &str, warnings: &mut Vec<String>) {
    let Ok(date) = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") else {
        warnings.push(format!("delivery date '{raw}' is not in YYYY-MM-DD form"));
        return;
    };
    let today = Utc::now().date_naive();
    if date < today {
        warnings.push(format!("delivery date {date} is in the past"));
    } else if date - today > Duration::days(MAX_LEAD_DAYS) {
        warnings.push(format!(
            "delivery date {date} is more than {MAX_LEAD_DAYS} days ahead"
        ));
    }
}

fn check_time(raw: &str, warnings: &mut Vec<String>) {
    let Ok(time) = NaiveTime::parse_from_str(raw.trim(), "%H:%M") else {
        warnings.push(format!("delivery time '{raw}' is not in HH:MM form"));
        return;
    };
    let minutes = time.hour() * 60 + time.minute();
    if !(OPEN_MINUTES..=CLOSE_MINUTES).contains(&minutes) {
        warnings.push(format!(
            "delivery time {raw} is outside working hours 08:00-21:00"
        ));
    }
}
