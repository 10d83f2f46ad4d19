//! Per-chat update lanes
//!
//! Every chat gets its own mpsc lane served by a dedicated task, so a chat's
//! updates are handled one at a time in arrival order while different chats
//! proceed concurrently. Idle lanes shut themselves down; a replacement lane
//! waits for its predecessor before touching anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::config::BotConfig;
use crate::domain::{ChatId, Update};
use crate::messenger::UpdateHandler;

struct Lane {
    tx: mpsc::Sender<Update>,
    handle: JoinHandle<()>,
}

/// Fans updates out to per-chat lanes in front of an inner handler
pub struct LaneDispatcher {
    inner: Arc<dyn UpdateHandler>,
    lanes: Mutex<HashMap<ChatId, Lane>>,
    idle: Duration,
    buffer: usize,
}

impl LaneDispatcher {
    pub fn new(inner: Arc<dyn UpdateHandler>, config: &BotConfig) -> Self {
        Self::with_limits(inner, Duration::from_secs(config.lane_idle_secs), config.lane_buffer)
    }

    pub fn with_limits(inner: Arc<dyn UpdateHandler>, idle: Duration, buffer: usize) -> Self {
        debug!(?idle, %buffer, "LaneDispatcher::new: called");
        Self {
            inner,
            lanes: Mutex::new(HashMap::new()),
            idle,
            buffer: buffer.max(1),
        }
    }

    /// Queue an update on its chat's lane, starting the lane if needed
    pub async fn dispatch(&self, update: Update) {
        let chat_id = update.chat_id;
        let mut update = update;
        loop {
            let tx = self.lane_sender(chat_id).await;
            match tx.send(update).await {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    // The lane went idle between lookup and send
                    debug!(%chat_id, "dispatch: lane closed, restarting");
                    update = returned;
                }
            }
        }
    }

    /// Number of lanes whose task is still running
    pub async fn lane_count(&self) -> usize {
        let mut lanes = self.lanes.lock().await;
        lanes.retain(|_, lane| !lane.handle.is_finished());
        lanes.len()
    }

    /// Close every lane and wait for queued updates to drain
    pub async fn shutdown(&self) {
        let lanes: Vec<(ChatId, Lane)> = self.lanes.lock().await.drain().collect();
        debug!(count = lanes.len(), "shutdown: closing lanes");
        for (chat_id, lane) in lanes {
            drop(lane.tx);
            if let Err(err) = lane.handle.await {
                warn!(%chat_id, error = %err, "Lane task failed");
            }
        }
    }

    async fn lane_sender(&self, chat_id: ChatId) -> mpsc::Sender<Update> {
        let mut lanes = self.lanes.lock().await;
        lanes.retain(|_, lane| !lane.handle.is_finished());

        if let Some(lane) = lanes.get(&chat_id)
            && !lane.tx.is_closed()
        {
            return lane.tx.clone();
        }

        let previous = lanes.remove(&chat_id).map(|lane| lane.handle);
        let (tx, rx) = mpsc::channel(self.buffer);
        let handle = tokio::spawn(run_lane(chat_id, self.inner.clone(), rx, previous, self.idle));
        lanes.insert(chat_id, Lane { tx: tx.clone(), handle });
        tx
    }
}

async fn run_lane(
    chat_id: ChatId,
    inner: Arc<dyn UpdateHandler>,
    mut rx: mpsc::Receiver<Update>,
    previous: Option<JoinHandle<()>>,
    idle: Duration,
) {
    if let Some(previous) = previous
        && let Err(err) = previous.await
    {
        warn!(%chat_id, error = %err, "Previous lane task failed");
    }
    debug!(%chat_id, "run_lane: started");

    loop {
        match tokio::time::timeout(idle, rx.recv()).await {
            Ok(Some(update)) => handle_one(inner.as_ref(), update).await,
            Ok(None) => break,
            Err(_) => {
                debug!(%chat_id, "run_lane: idle, closing");
                rx.close();
                while let Some(update) = rx.recv().await {
                    handle_one(inner.as_ref(), update).await;
                }
                break;
            }
        }
    }
    debug!(%chat_id, "run_lane: finished");
}

async fn handle_one(inner: &dyn UpdateHandler, update: Update) {
    let span = info_span!("update", update_id = %Uuid::now_v7(), chat_id = %update.chat_id);
    inner.handle(update).instrument(span).await;
}

#[async_trait]
impl UpdateHandler for LaneDispatcher {
    async fn handle(&self, update: Update) {
        self.dispatch(update).await;
    }
}
