use crate::config::LlmConfig;
use crate::errors::AurabotError;
use crate::llm::LlmClient;
use crate::transcript::{Role, Turn};
use crate::utils::http::{check_json_response, default_http_client, transport_error};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` backend.
///
/// Replies are requested as `application/json` so the model emits the reply
/// envelope directly instead of prose with a JSON block buried in it. The
/// parser still runs its full extraction; the mime hint only improves the
/// odds.
pub struct GeminiClient {
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    base_url: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self::with_base(config, BASE_URL.to_string())
    }

    #[cfg(test)]
    fn with_base_url(config: &LlmConfig, base_url: String) -> Self {
        Self::with_base(config, base_url)
    }

    fn with_base(config: &LlmConfig, base_url: String) -> Self {
        Self {
            api_key: config.gemini_api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            base_url,
            client: default_http_client(config.request_timeout_secs),
        }
    }

    fn build_payload(
        &self,
        transcript: &[Turn],
        system_instruction: &str,
        correction: Option<&str>,
    ) -> Value {
        let mut contents: Vec<Value> = transcript
            .iter()
            .map(|turn| {
                // Gemini has no system role in `contents`; system rows are
                // filtered out before this point and anything unexpected is
                // safest sent as user.
                let role = match turn.role {
                    Role::Assistant => "model",
                    Role::User | Role::System => "user",
                };
                json!({"role": role, "parts": [{"text": turn.content}]})
            })
            .collect();

        if let Some(correction) = correction {
            contents.push(json!({"role": "user", "parts": [{"text": correction}]}));
        }

        json!({
            "contents": contents,
            "systemInstruction": {"parts": [{"text": system_instruction}]},
            "generationConfig": {
                "maxOutputTokens": self.max_tokens,
                "temperature": self.temperature,
                "responseMimeType": "application/json",
            },
        })
    }

    /// Join the text parts of the first candidate. A response without any
    /// text is a model-output defect, not a transport one.
    fn extract_text(json: &Value) -> Result<String, AurabotError> {
        let parts = json["candidates"]
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|c| c["content"]["parts"].as_array())
            .ok_or_else(|| {
                AurabotError::Parse("no candidates in Gemini response".to_string())
            })?;

        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if text.is_empty() {
            return Err(AurabotError::Parse(
                "Gemini candidate carried no text".to_string(),
            ));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(
        &self,
        transcript: &[Turn],
        system_instruction: &str,
        correction: Option<&str>,
    ) -> Result<String, AurabotError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let payload = self.build_payload(transcript, system_instruction, correction);

        debug!(
            model = %self.model,
            turns = transcript.len(),
            corrected = correction.is_some(),
            "requesting completion"
        );

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| transport_error("Gemini", &e))?;

        let json = check_json_response(resp, "Gemini").await?;
        Self::extract_text(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> LlmConfig {
        LlmConfig {
            gemini_api_key: "test_key".to_string(),
            ..LlmConfig::default()
        }
    }

    fn text_response(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [{"text": text}],
                    "role": "model"
                },
                "finishReason": "STOP"
            }]
        })
    }

    #[tokio::test]
    async fn completion_returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(query_param("key", "test_key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(text_response("{\"text\": \"Hello from the shop!\"}")),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(&config(), server.uri());
        let out = client
            .complete(&[Turn::user("hi")], "You are a florist.", None)
            .await
            .unwrap();

        assert_eq!(out, "{\"text\": \"Hello from the shop!\"}");
    }

    #[tokio::test]
    async fn payload_maps_roles_and_appends_correction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(text_response("{}")))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(&config(), server.uri());
        let transcript = vec![
            Turn::user("I want roses"),
            Turn::assistant("{\"text\": \"How many?\"}"),
        ];
        client
            .complete(
                &transcript,
                "You are a florist.",
                Some("your reply must include non-empty text alongside any command"),
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(
            contents[2]["parts"][0]["text"],
            "your reply must include non-empty text alongside any command"
        );
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are a florist."
        );
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[tokio::test]
    async fn multi_part_candidate_text_is_joined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "parts": [{"text": "{\"text\": \"one "}, {"text": "reply\"}"}],
                        "role": "model"
                    }
                }]
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(&config(), server.uri());
        let out = client.complete(&[Turn::user("hi")], "sys", None).await.unwrap();

        assert_eq!(out, "{\"text\": \"one reply\"}");
    }

    #[tokio::test]
    async fn unauthorized_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "API key not valid"}
            })))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(&config(), server.uri());
        let err = client.complete(&[Turn::user("hi")], "sys", None).await.unwrap_err();

        assert!(!err.is_retryable());
        assert!(err.to_string().contains("API key not valid"));
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "20")
                    .set_body_json(json!({"error": {"message": "Quota exceeded"}})),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(&config(), server.uri());
        let err = client.complete(&[Turn::user("hi")], "sys", None).await.unwrap_err();

        assert!(matches!(
            err,
            AurabotError::RateLimit {
                retry_after: Some(20)
            }
        ));
    }

    #[tokio::test]
    async fn empty_candidates_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let client = GeminiClient::with_base_url(&config(), server.uri());
        let err = client.complete(&[Turn::user("hi")], "sys", None).await.unwrap_err();

        assert!(matches!(err, AurabotError::Parse(_)));
    }
}
