//! Terminal messenger for local runs
//!
//! Each stdin line is one update. Lines starting with `!` are button presses
//! carrying the rest of the line as payload, e.g. `!nav:student.root`.

use async_trait::async_trait;
use colored::Colorize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::{ButtonKind, ChatId, OutgoingMessage, Update, UserId};

use super::{Messenger, MessengerError, UpdateHandler};

const CALLBACK_PREFIX: char = '!';

#[derive(Debug, Clone)]
pub struct ConsoleMessenger {
    chat_id: ChatId,
}

impl ConsoleMessenger {
    pub fn new(chat_id: ChatId) -> Self {
        Self { chat_id }
    }

    /// Turn an input line into an update; blank lines yield `None`
    pub fn parse_line(&self, line: &str) -> Option<Update> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match line.strip_prefix(CALLBACK_PREFIX) {
            Some(payload) => Some(Update::callback(self.chat_id, self.chat_id, payload.trim())),
            None => Some(Update::message(self.chat_id, self.chat_id, line)),
        }
    }
}

/// Plain-text rendering of a message and its buttons
pub fn render(message: &OutgoingMessage) -> String {
    let mut out = message.text.clone();
    if let Some(keyboard) = &message.keyboard {
        for row in &keyboard.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|button| match &button.kind {
                    ButtonKind::Callback { payload } => format!("[{} → !{}]", button.label, payload),
                    ButtonKind::Link { url } => format!("[{} → {}]", button.label, url),
                    ButtonKind::Command => format!("[{}]", button.label),
                })
                .collect();
            out.push('\n');
            out.push_str(&cells.join(" "));
        }
    }
    out
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn run(
        &self,
        handler: Arc<dyn UpdateHandler>,
        mut shutdown: mpsc::Receiver<()>,
    ) -> Result<(), MessengerError> {
        info!(chat_id = self.chat_id, "Console messenger reading stdin");
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                _ = shutdown.recv() => return Ok(()),
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if let Some(update) = self.parse_line(&line) {
                            handler.handle(update).await;
                        }
                    }
                    None => {
                        debug!("run: stdin closed");
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn send(&self, chat_id: ChatId, user_id: UserId, message: &OutgoingMessage) -> Result<(), MessengerError> {
        debug!(%chat_id, %user_id, "send: called");
        println!("{}\n{}\n", "bot>".green().bold(), render(message));
        Ok(())
    }
}
