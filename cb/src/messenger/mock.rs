//! Messenger double that records outgoing messages

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::domain::{ChatId, OutgoingMessage, UserId};

use super::{Messenger, MessengerError, UpdateHandler};

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(ChatId, OutgoingMessage)>>,
    failing: AtomicBool,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ChatId, OutgoingMessage)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.text.clone()).collect()
    }

    pub fn last(&self) -> Option<OutgoingMessage> {
        self.sent.lock().unwrap().last().map(|(_, m)| m.clone())
    }

    /// Drain and return everything recorded so far
    pub fn take(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().drain(..).map(|(_, m)| m).collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn run(&self, _handler: Arc<dyn UpdateHandler>, _shutdown: mpsc::Receiver<()>) -> Result<(), MessengerError> {
        Ok(())
    }

    async fn send(&self, chat_id: ChatId, user_id: UserId, message: &OutgoingMessage) -> Result<(), MessengerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MessengerError::MissingRecipient);
        }
        let target = if chat_id != 0 { chat_id } else { user_id };
        self.sent.lock().unwrap().push((target, message.clone()));
        Ok(())
    }
}
