//! Messenger adapters
//!
//! A [`Messenger`] turns platform events into [`Update`]s for an
//! [`UpdateHandler`] and delivers [`OutgoingMessage`]s back to chats.

mod console;
mod max;
#[cfg(test)]
pub mod mock;

pub use console::ConsoleMessenger;
pub use max::MaxMessenger;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::{ChatId, OutgoingMessage, Update, UserId};

/// Errors that can occur while talking to a messenger
#[derive(Debug, Error)]
pub enum MessengerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Messenger API {method} {path} returned {status}: {body}")]
    Api {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode messenger response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No recipient: both chat id and user id are zero")]
    MissingRecipient,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives normalized updates from a messenger
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, update: Update);
}

/// A chat platform the bot runs on
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Deliver updates to `handler` until `shutdown` fires or the source ends
    async fn run(&self, handler: Arc<dyn UpdateHandler>, shutdown: mpsc::Receiver<()>) -> Result<(), MessengerError>;

    /// Send a message to a chat, or to the user directly when `chat_id` is zero
    async fn send(&self, chat_id: ChatId, user_id: UserId, message: &OutgoingMessage) -> Result<(), MessengerError>;
}
