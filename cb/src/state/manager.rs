//! SessionStore - actor that owns the in-memory session map
//!
//! Sessions are lost on restart.

use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::domain::{ChatId, Session};

use super::messages::{SessionCommand, StoreError, StoreResponse};

/// Handle to send commands to the session store actor
#[derive(Debug, Clone)]
pub struct SessionStore {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionStore {
    /// Spawn a new session store actor on the current runtime
    pub fn spawn(clock: Clock) -> Self {
        debug!("spawn: called");
        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(HashMap::new(), clock, rx));
        info!("SessionStore spawned");
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand) -> StoreResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }

    /// Get a session by chat id
    pub async fn get(&self, chat_id: ChatId) -> StoreResponse<Option<Session>> {
        debug!(%chat_id, "get: called");
        self.request(|reply| SessionCommand::Get { chat_id, reply }).await
    }

    /// Insert or replace a session, stamping its last activity
    pub async fn save(&self, session: Session) -> StoreResponse<()> {
        debug!(chat_id = %session.chat_id, stage = %session.stage, "save: called");
        self.request(|reply| SessionCommand::Save { session, reply }).await
    }

    /// Remove a session; returns whether one existed
    pub async fn delete(&self, chat_id: ChatId) -> StoreResponse<bool> {
        debug!(%chat_id, "delete: called");
        self.request(|reply| SessionCommand::Delete { chat_id, reply }).await
    }

    /// Snapshot of every session
    pub async fn all(&self) -> StoreResponse<Vec<Session>> {
        debug!("all: called");
        self.request(|reply| SessionCommand::All { reply }).await
    }

    pub async fn count(&self) -> StoreResponse<usize> {
        debug!("count: called");
        self.request(|reply| SessionCommand::Count { reply }).await
    }

    /// Stop the actor; later calls fail with `ChannelError`
    pub async fn shutdown(&self) -> StoreResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| StoreError::ChannelError)
    }
}

async fn actor_loop(mut sessions: HashMap<ChatId, Session>, clock: Clock, mut rx: mpsc::Receiver<SessionCommand>) {
    debug!("actor_loop: called");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            SessionCommand::Get { chat_id, reply } => {
                debug!(%chat_id, "actor_loop: Get command");
                let _ = reply.send(sessions.get(&chat_id).cloned());
            }

            SessionCommand::Save { mut session, reply } => {
                debug!(chat_id = %session.chat_id, "actor_loop: Save command");
                session.last_activity = clock.now();
                sessions.insert(session.chat_id, session);
                let _ = reply.send(());
            }

            SessionCommand::Delete { chat_id, reply } => {
                debug!(%chat_id, "actor_loop: Delete command");
                let _ = reply.send(sessions.remove(&chat_id).is_some());
            }

            SessionCommand::All { reply } => {
                debug!("actor_loop: All command");
                let _ = reply.send(sessions.values().cloned().collect());
            }

            SessionCommand::Count { reply } => {
                let _ = reply.send(sessions.len());
            }

            SessionCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!(sessions = sessions.len(), "SessionStore shutting down");
                break;
            }
        }
    }

    debug!("SessionStore actor stopped");
}
