use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("telegram request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("telegram API error: {0}")]
    Api(String),
}

/// Outbound half of the Telegram Bot API (`sendMessage` only).
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_base: String,
    bot_token: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramClient {
    pub fn new(api_base: &str, bot_token: &str) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
        }
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: Some("HTML"),
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response.json::<TelegramResponse>().await;

        match body {
            Ok(body) if body.ok && status.is_success() => {
                tracing::debug!(chat_id, "telegram message sent");
                Ok(())
            }
            Ok(body) => Err(TelegramError::Api(
                body.description
                    .unwrap_or_else(|| format!("unexpected status {status}")),
            )),
            Err(e) if status.is_success() => Err(TelegramError::Transport(e)),
            Err(_) => Err(TelegramError::Api(format!("unexpected status {status}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_send_message_with_chat_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_partial_json(serde_json::json!({ "chat_id": 12345, "text": "hello" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TelegramClient::new(&server.uri(), "test-token");
        client.send_message(12345, "hello").await.unwrap();
    }

    #[tokio::test]
    async fn surfaces_api_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let client = TelegramClient::new(&server.uri(), "test-token");
        let err = client.send_message(1, "hi").await.unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }
}
