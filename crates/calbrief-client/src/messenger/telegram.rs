//! Telegram Bot API messenger.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use calbrief_core::MessengerKind;
use calbrief_providers::BoxFuture;

use super::{DeliveryReceipt, Messenger, MessengerError, api_url};

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    link_preview_options: LinkPreviewOptions,
}

#[derive(Debug, Serialize)]
struct LinkPreviewOptions {
    is_disabled: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<SentMessage>,
    error_code: Option<u16>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

/// Sends digests through a Telegram bot.
pub struct TelegramMessenger {
    client: reqwest::Client,
    api_url: Url,
    bot_token: String,
}

impl TelegramMessenger {
    /// Creates a messenger for the bot with `bot_token`.
    pub fn new(client: reqwest::Client, api_url: Url, bot_token: String) -> Self {
        Self {
            client,
            api_url,
            bot_token,
        }
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<DeliveryReceipt, MessengerError> {
        let url = api_url(&self.api_url, &[&format!("bot{}", self.bot_token), "sendMessage"]);
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "MarkdownV2",
            link_preview_options: LinkPreviewOptions { is_disabled: true },
        };

        debug!(chat_id, length = text.len(), "Sending Telegram message");
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        let parsed: ApiResponse =
            serde_json::from_str(&body).map_err(|e| MessengerError::InvalidResponse {
                messenger: MessengerKind::Telegram,
                message: format!("{e}: {body}"),
            })?;

        if !status.is_success() || !parsed.ok {
            return Err(MessengerError::Rejected {
                messenger: MessengerKind::Telegram,
                status: parsed.error_code.unwrap_or(status.as_u16()),
                description: parsed
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            });
        }

        let message = parsed.result.ok_or_else(|| MessengerError::InvalidResponse {
            messenger: MessengerKind::Telegram,
            message: "missing result".to_string(),
        })?;

        info!(chat_id, message_id = message.message_id, "Sent Telegram message");
        Ok(DeliveryReceipt {
            messenger: MessengerKind::Telegram,
            id: message.message_id.to_string(),
        })
    }
}

impl Messenger for TelegramMessenger {
    fn kind(&self) -> MessengerKind {
        MessengerKind::Telegram
    }

    fn send<'a>(
        &'a self,
        channel: &'a str,
        digest: &'a str,
    ) -> BoxFuture<'a, Result<DeliveryReceipt, MessengerError>> {
        Box::pin(self.send_message(channel, digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn messenger(server: &MockServer) -> TelegramMessenger {
        TelegramMessenger::new(
            reqwest::Client::new(),
            Url::parse(&server.uri()).unwrap(),
            "123:abc".into(),
        )
    }

    #[tokio::test]
    async fn sends_markdown_v2_without_previews() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_json(serde_json::json!({
                "chat_id": "-100123",
                "text": "*Geburtstage*",
                "parse_mode": "MarkdownV2",
                "link_preview_options": { "is_disabled": true }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 77, "chat": { "id": -100123 } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let receipt = messenger(&server)
            .send("-100123", "*Geburtstage*")
            .await
            .unwrap();

        assert_eq!(
            receipt,
            DeliveryReceipt {
                messenger: MessengerKind::Telegram,
                id: "77".into()
            }
        );
    }

    #[tokio::test]
    async fn api_error_is_rejected_with_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: can't parse entities"
            })))
            .mount(&server)
            .await;

        let err = messenger(&server).send("1", "a.b").await.unwrap_err();
        match err {
            MessengerError::Rejected {
                status,
                description,
                ..
            } => {
                assert_eq!(status, 400);
                assert!(description.contains("can't parse entities"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = messenger(&server).send("1", "x").await.unwrap_err();
        assert!(matches!(err, MessengerError::InvalidResponse { .. }));
    }
}
