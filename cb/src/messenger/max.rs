//! MAX Bot API adapter (long polling)

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::MessengerConfig;
use crate::domain::{Button, ButtonKind, ButtonStyle, ChatId, Keyboard, OutgoingMessage, Update, UserId};

use super::{Messenger, MessengerError, UpdateHandler};

const UPDATE_TYPES: &str = "message_created,message_callback";
const POLL_LIMIT: u32 = 100;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);
const CALLBACK_NOTIFICATION: &str = "✅";

#[derive(Debug, Default, Deserialize)]
struct UpdateList {
    #[serde(default)]
    updates: Vec<RawUpdate>,
    #[serde(default)]
    marker: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUpdate {
    #[serde(default)]
    update_type: String,
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    callback: Option<RawCallback>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    sender: Option<RawUser>,
    #[serde(default)]
    recipient: RawRecipient,
    #[serde(default)]
    body: Option<RawBody>,
}

#[derive(Debug, Default, Deserialize)]
struct RawUser {
    #[serde(default)]
    user_id: i64,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRecipient {
    #[serde(default)]
    chat_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBody {
    #[serde(default)]
    mid: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCallback {
    #[serde(default)]
    callback_id: String,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    user: Option<RawUser>,
}

#[derive(Debug, Serialize)]
struct NewMessageBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<Value>,
}

/// Reduce a raw MAX update to an [`Update`]; unsupported types yield `None`
fn normalize(raw: RawUpdate) -> Option<Update> {
    match raw.update_type.as_str() {
        "message_created" => {
            let message = raw.message?;
            let user_id = message.sender.map(|u| u.user_id).unwrap_or_default();
            let chat_id = message.recipient.chat_id.unwrap_or_default();
            let body = message.body.unwrap_or_default();
            let mut update = Update::message(chat_id, user_id, body.text.unwrap_or_default());
            update.message_id = Some(body.mid).filter(|mid| !mid.is_empty());
            Some(update)
        }
        "message_callback" => {
            let callback = raw.callback?;
            let user_id = callback.user.map(|u| u.user_id).unwrap_or_default();
            let (chat_id, message_id) = match raw.message {
                Some(message) => (
                    message.recipient.chat_id.unwrap_or_default(),
                    message.body.map(|b| b.mid).filter(|mid| !mid.is_empty()),
                ),
                None => (0, None),
            };
            let mut update = Update::callback(chat_id, user_id, callback.payload.unwrap_or_default());
            update.callback_id = Some(callback.callback_id).filter(|id| !id.is_empty());
            update.message_id = message_id;
            Some(update)
        }
        other => {
            debug!(update_type = %other, "normalize: skipping unsupported update");
            None
        }
    }
}

fn intent(style: ButtonStyle) -> &'static str {
    match style {
        ButtonStyle::Primary => "positive",
        ButtonStyle::Danger => "negative",
        ButtonStyle::Secondary | ButtonStyle::Info => "default",
    }
}

fn button_json(button: &Button) -> Value {
    match &button.kind {
        ButtonKind::Callback { payload } => {
            let payload = if payload.is_empty() { &button.label } else { payload };
            json!({
                "type": "callback",
                "text": button.label,
                "payload": payload,
                "intent": intent(button.style),
            })
        }
        ButtonKind::Link { url } => json!({
            "type": "link",
            "text": button.label,
            "url": url,
        }),
        ButtonKind::Command => json!({
            "type": "message",
            "text": button.label,
        }),
    }
}

fn keyboard_attachment(keyboard: &Keyboard) -> Value {
    let buttons: Vec<Vec<Value>> = keyboard
        .rows
        .iter()
        .map(|row| row.iter().map(button_json).collect())
        .collect();
    json!({
        "type": "inline_keyboard",
        "payload": { "buttons": buttons },
    })
}

fn message_body(message: &OutgoingMessage) -> NewMessageBody<'_> {
    NewMessageBody {
        text: &message.text,
        format: message.parse_mode.map(|mode| mode.as_str()),
        attachments: message
            .keyboard
            .as_ref()
            .filter(|kb| !kb.is_empty())
            .map(keyboard_attachment)
            .into_iter()
            .collect(),
    }
}

/// Query target for an outgoing message
fn recipient(chat_id: ChatId, user_id: UserId) -> Result<(&'static str, i64), MessengerError> {
    if chat_id != 0 {
        Ok(("chat_id", chat_id))
    } else if user_id != 0 {
        Ok(("user_id", user_id))
    } else {
        Err(MessengerError::MissingRecipient)
    }
}

/// MAX messenger client
#[derive(Debug, Clone)]
pub struct MaxMessenger {
    base_url: String,
    token: String,
    poll_timeout_secs: u64,
    http: Client,
}

impl MaxMessenger {
    pub fn new(config: &MessengerConfig, token: String) -> Result<Self, MessengerError> {
        debug!(base_url = %config.base_url, "MaxMessenger::new: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            token,
            poll_timeout_secs: config.poll_timeout_secs,
            http,
        })
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, MessengerError> {
        let mut builder = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path))
            .query(&[("access_token", self.token.as_str())])
            .query(query);
        if let Some(body) = &body {
            builder = builder.json(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MessengerError::Api {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Bot display name from `GET /me`
    pub async fn bot_name(&self) -> Result<String, MessengerError> {
        let me: RawUser = serde_json::from_value(self.call(Method::GET, "/me", &[], None, None).await?)?;
        Ok(me.name.unwrap_or_else(|| me.user_id.to_string()))
    }

    async fn poll(&self, marker: Option<i64>) -> Result<UpdateList, MessengerError> {
        let mut query = vec![
            ("limit", POLL_LIMIT.to_string()),
            ("timeout", self.poll_timeout_secs.to_string()),
            ("types", UPDATE_TYPES.to_string()),
        ];
        if let Some(marker) = marker {
            query.push(("marker", marker.to_string()));
        }
        let wait = Duration::from_secs(self.poll_timeout_secs + 10);
        let value = self.call(Method::GET, "/updates", &query, None, Some(wait)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Acknowledge a button press without blocking the update
    fn acknowledge(&self, callback_id: String) {
        let this = self.clone();
        tokio::spawn(async move {
            let body = json!({ "notification": CALLBACK_NOTIFICATION });
            let query = [("callback_id", callback_id.clone())];
            if let Err(err) = this.call(Method::POST, "/answers", &query, Some(body), None).await {
                warn!(error = %err, %callback_id, "Failed to answer callback");
            }
        });
    }
}

#[async_trait]
impl Messenger for MaxMessenger {
    async fn run(
        &self,
        handler: Arc<dyn UpdateHandler>,
        mut shutdown: mpsc::Receiver<()>,
    ) -> Result<(), MessengerError> {
        match self.bot_name().await {
            Ok(name) => info!(bot = %name, "Connected to MAX"),
            Err(err) => warn!(error = %err, "Could not fetch bot info"),
        }

        let mut marker = None;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("MAX polling stopped");
                    return Ok(());
                }
                polled = self.poll(marker) => match polled {
                    Ok(batch) => {
                        if batch.marker.is_some() {
                            marker = batch.marker;
                        }
                        debug!(count = batch.updates.len(), ?marker, "run: polled updates");
                        for raw in batch.updates {
                            let Some(update) = normalize(raw) else {
                                continue;
                            };
                            if let Some(callback_id) = &update.callback_id {
                                self.acknowledge(callback_id.clone());
                            }
                            handler.handle(update).await;
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "MAX poll failed");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                    }
                }
            }
        }
    }

    async fn send(&self, chat_id: ChatId, user_id: UserId, message: &OutgoingMessage) -> Result<(), MessengerError> {
        let (field, id) = recipient(chat_id, user_id)?;
        debug!(%chat_id, %user_id, len = message.text.len(), "send: called");
        let body = serde_json::to_value(message_body(message))?;
        self.call(Method::POST, "/messages", &[(field, id.to_string())], Some(body), None)
            .await?;
        Ok(())
    }
}
