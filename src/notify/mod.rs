use crate::config::LineConfig;
use crate::errors::AurabotError;
use crate::order::OrderAggregate;
use crate::utils::http::{check_json_response, default_http_client, transport_error};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::info;

const PUSH_URL: &str = "https://api.line.me";
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Staff-facing side channel. Confirmed orders are pushed here so the shop
/// can start preparing without watching the customer chat.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn push(&self, text: &str) -> Result<(), AurabotError>;
}

/// LINE Messaging API push client.
pub struct LineNotifier {
    channel_token: String,
    recipient_id: String,
    endpoint: String,
    client: Client,
}

impl LineNotifier {
    pub fn new(config: &LineConfig) -> Self {
        Self::with_base(config, PUSH_URL)
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(config: &LineConfig, base_url: &str) -> Self {
        Self::with_base(config, base_url)
    }

    fn with_base(config: &LineConfig, base_url: &str) -> Self {
        Self {
            channel_token: config.channel_token.clone(),
            recipient_id: config.recipient_id.clone(),
            endpoint: format!("{}/v2/bot/message/push", base_url),
            client: default_http_client(REQUEST_TIMEOUT_SECS),
        }
    }
}

#[async_trait]
impl NotificationChannel for LineNotifier {
    async fn push(&self, text: &str) -> Result<(), AurabotError> {
        let payload = json!({
            "to": self.recipient_id,
            "messages": [{"type": "text", "text": text}]
        });
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.channel_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("LINE", &e))?;
        check_json_response(resp, "LINE").await?;
        info!(to = %self.recipient_id, "staff notification pushed");
        Ok(())
    }
}

/// Stands in when no staff channel is configured. Confirmed orders still
/// surface in the log at info.
pub struct NullNotifier;

#[async_trait]
impl NotificationChannel for NullNotifier {
    async fn push(&self, text: &str) -> Result<(), AurabotError> {
        info!("staff notification (no channel configured):\n{text}");
        Ok(())
    }
}

/// Bilingual (English + Thai) staff notification for a confirmed order.
///
/// Absent optional fields show as `-` so staff can spot gaps at a glance.
pub fn staff_order_notification(order: &OrderAggregate, sender_id: &str) -> String {
    let dash = || "-".to_string();
    let date = order.date.clone().unwrap_or_else(dash);
    let time = order.time.clone().unwrap_or_else(dash);
    let address = match order.delivery_needed {
        Some(true) => order.address.clone().unwrap_or_else(dash),
        Some(false) => "Self-pickup".to_string(),
        None => dash(),
    };
    let address_th = match order.delivery_needed {
        Some(true) => order.address.clone().unwrap_or_else(dash),
        Some(false) => "รับเองที่ร้าน".to_string(),
        None => dash(),
    };
    let card_text = order.card_text.clone().unwrap_or_else(dash);
    let recipient_name = order.recipient_name.clone().unwrap_or_else(dash);
    let recipient_phone = order.recipient_phone.clone().unwrap_or_else(dash);

    let mut items = String::new();
    for item in &order.items {
        items.push_str(&format!("- {} x{}", item.name, item.quantity));
        if let Some(price) = item.price {
            items.push_str(&format!(" ({} THB)", price));
        }
        items.push('\n');
    }
    if items.is_empty() {
        items.push_str("- (none)\n");
    }

    let now = Utc::now().format("%d.%m.%Y %H:%M:%S");

    format!(
        "NEW ORDER CONFIRMED!\n\
         \n\
         Order: {order_id}\n\
         Items:\n{items}\
         Delivery date: {date}\n\
         Delivery time: {time}\n\
         Delivery address: {address}\n\
         Card text: {card_text}\n\
         Recipient name: {recipient_name}\n\
         Recipient phone: {recipient_phone}\n\
         \n\
         คำสั่งซื้อใหม่ได้รับการยืนยัน!\n\
         \n\
         รายการ:\n{items}\
         วันที่จัดส่ง: {date}\n\
         เวลาจัดส่ง: {time}\n\
         ที่อยู่จัดส่ง: {address_th}\n\
         ข้อความการ์ด: {card_text}\n\
         ชื่อผู้รับ: {recipient_name}\n\
         เบอร์โทรศัพท์ผู้รับ: {recipient_phone}\n\
         \n\
         Status: Order confirmed by customer\n\
         สถานะ: ลูกค้ายืนยันคำสั่งซื้อแล้ว\n\
         Time: {now}\n\
         \n\
         Customer chat: https://wa.me/{sender_id}",
        order_id = order.order_id,
    )
}
