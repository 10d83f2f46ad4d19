//! Normalized inbound updates

use serde::{Deserialize, Serialize};

use super::types::{ChatId, UserId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Message,
    Callback,
    #[default]
    Unknown,
}

/// A messenger event reduced to what the dialogue needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub kind: UpdateKind,
    pub chat_id: ChatId,
    pub user_id: UserId,
    /// Trimmed message text; empty for callbacks
    pub text: String,
    /// Callback payload; empty for messages
    pub payload: String,
    pub message_id: Option<String>,
    pub callback_id: Option<String>,
}

impl Update {
    pub fn message(chat_id: ChatId, user_id: UserId, text: impl Into<String>) -> Self {
        Self {
            kind: UpdateKind::Message,
            chat_id,
            user_id,
            text: text.into().trim().to_string(),
            ..Default::default()
        }
    }

    pub fn callback(chat_id: ChatId, user_id: UserId, payload: impl Into<String>) -> Self {
        Self {
            kind: UpdateKind::Callback,
            chat_id,
            user_id,
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn is_callback(&self) -> bool {
        self.kind == UpdateKind::Callback
    }

    pub fn is_message(&self) -> bool {
        self.kind == UpdateKind::Message
    }

    /// Payload suffix after `prefix`, for callback updates only
    pub fn payload_after(&self, prefix: &str) -> Option<&str> {
        if self.is_callback() {
            self.payload.strip_prefix(prefix)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_text_is_trimmed() {
        let update = Update::message(1, 2, "  hello \n");
        assert_eq!(update.text, "hello");
        assert!(update.is_message());
        assert!(!update.is_callback());
    }

    #[test]
    fn test_payload_after_only_for_callbacks() {
        let callback = Update::callback(1, 2, "nav:student.root");
        assert_eq!(callback.payload_after("nav:"), Some("student.root"));
        assert_eq!(callback.payload_after("act:"), None);

        let mut message = Update::message(1, 2, "nav:student.root");
        message.payload = "nav:student.root".to_string();
        assert_eq!(message.payload_after("nav:"), None);
    }
}
