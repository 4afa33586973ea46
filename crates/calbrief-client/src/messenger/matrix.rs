//! Matrix client-server API messenger.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use calbrief_core::{MessengerKind, markdown_to_html};
use calbrief_providers::BoxFuture;

use super::{DeliveryReceipt, Messenger, MessengerError, api_url};

#[derive(Debug, Serialize)]
struct RoomMessage<'a> {
    msgtype: &'static str,
    body: &'a str,
    format: &'static str,
    formatted_body: String,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    event_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    errcode: String,
    error: Option<String>,
}

/// Sends digests into a Matrix room as the access token's user.
///
/// The room must already be joined. Encrypted rooms are not supported.
pub struct MatrixMessenger {
    client: reqwest::Client,
    home_server_url: Url,
    access_token: String,
}

impl MatrixMessenger {
    /// Creates a messenger posting to `home_server_url`.
    pub fn new(client: reqwest::Client, home_server_url: Url, access_token: String) -> Self {
        Self {
            client,
            home_server_url,
            access_token,
        }
    }

    async fn send_message(&self, room_id: &str, markdown: &str) -> Result<DeliveryReceipt, MessengerError> {
        let txn_id = Uuid::new_v4().to_string();
        let room = urlencoding::encode(room_id);
        let url = api_url(
            &self.home_server_url,
            &[
                "_matrix/client/v3/rooms",
                &room,
                "send/m.room.message",
                &txn_id,
            ],
        );
        let message = RoomMessage {
            msgtype: "m.text",
            body: markdown,
            format: "org.matrix.custom.html",
            formatted_body: markdown_to_html(markdown),
        };

        debug!(room_id, txn_id = %txn_id, "Sending Matrix message");
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .json(&message)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let description = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(e) => match e.error {
                    Some(error) => format!("{}: {error}", e.errcode),
                    None => e.errcode,
                },
                Err(_) => body,
            };
            return Err(MessengerError::Rejected {
                messenger: MessengerKind::Matrix,
                status: status.as_u16(),
                description,
            });
        }

        let sent: SendResponse =
            serde_json::from_str(&body).map_err(|e| MessengerError::InvalidResponse {
                messenger: MessengerKind::Matrix,
                message: format!("{e}: {body}"),
            })?;

        info!(room_id, event_id = %sent.event_id, "Sent Matrix message");
        Ok(DeliveryReceipt {
            messenger: MessengerKind::Matrix,
            id: sent.event_id,
        })
    }
}

impl Messenger for MatrixMessenger {
    fn kind(&self) -> MessengerKind {
        MessengerKind::Matrix
    }

    fn send<'a>(
        &'a self,
        channel: &'a str,
        digest: &'a str,
    ) -> BoxFuture<'a, Result<DeliveryReceipt, MessengerError>> {
        Box::pin(self.send_message(channel, digest))
    }
}
