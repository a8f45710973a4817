use crate::config::WhatsAppConfig;
use crate::errors::AurabotError;
use crate::gateway::MessageGateway;
use crate::utils::http::{check_json_response, default_http_client, transport_error};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info};

const BASE_URL: &str = "https://graph.facebook.com";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// WhatsApp Business Cloud API client.
///
/// All operations go through `POST /{version}/{phone_number_id}/messages`
/// with a bearer token.
pub struct CloudApiGateway {
    access_token: String,
    endpoint: String,
    client: Client,
}

impl CloudApiGateway {
    pub fn new(config: &WhatsAppConfig) -> Self {
        Self::with_base(config, BASE_URL)
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(config: &WhatsAppConfig, base_url: &str) -> Self {
        Self::with_base(config, base_url)
    }

    fn with_base(config: &WhatsAppConfig, base_url: &str) -> Self {
        Self {
            access_token: config.access_token.clone(),
            endpoint: format!(
                "{}/{}/{}/messages",
                base_url, config.api_version, config.phone_number_id
            ),
            client: default_http_client(REQUEST_TIMEOUT_SECS),
        }
    }

    async fn post(&self, payload: &Value) -> Result<Value, AurabotError> {
        debug!(endpoint = %self.endpoint, kind = payload["type"].as_str().unwrap_or("status"), "posting to WhatsApp");
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| transport_error("WhatsApp", &e))?;
        check_json_response(resp, "WhatsApp").await
    }

    fn message_id(json: &Value) -> Result<String, AurabotError> {
        json["messages"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|m| m["id"].as_str())
            .map(ToString::to_string)
            .ok_or_else(|| AurabotError::Transport {
                message: "WhatsApp response carried no message id".to_string(),
                retryable: false,
            })
    }
}

#[async_trait]
impl MessageGateway for CloudApiGateway {
    async fn send_text(&self, to: &str, text: &str) -> Result<String, AurabotError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": {"body": text}
        });
        let json = self.post(&payload).await?;
        let id = Self::message_id(&json)?;
        info!(to, message_id = %id, "text message sent");
        Ok(id)
    }

    async fn send_image_with_caption(
        &self,
        to: &str,
        url: &str,
        caption: &str,
    ) -> Result<String, AurabotError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "image",
            "image": {"link": url, "caption": caption}
        });
        let json = self.post(&payload).await?;
        let id = Self::message_id(&json)?;
        info!(to, message_id = %id, "image sent");
        Ok(id)
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), AurabotError> {
        let payload = json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id
        });
        self.post(&payload).await.map(|_| ())
    }

    async fn send_typing_indicator(&self, to: &str) -> Result<(), AurabotError> {
        // The Cloud API has no dedicated typing endpoint; some versions accept
        // this reaction-shaped status and others reject it. Callers treat the
        // result as advisory.
        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "reaction",
            "reaction": {
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "type": "typing"
            }
        });
        self.post(&payload).await.map(|_| ())
    }
}
