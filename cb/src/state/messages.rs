//! Session store messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{ChatId, Session};

/// Errors from session store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Channel error")]
    ChannelError,
}

/// Response from session store operations
pub type StoreResponse<T> = Result<T, StoreError>;

/// Commands sent to the session store actor
#[derive(Debug)]
pub enum SessionCommand {
    Get {
        chat_id: ChatId,
        reply: oneshot::Sender<Option<Session>>,
    },
    Save {
        session: Session,
        reply: oneshot::Sender<()>,
    },
    Delete {
        chat_id: ChatId,
        reply: oneshot::Sender<bool>,
    },
    All {
        reply: oneshot::Sender<Vec<Session>>,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },

    // Shutdown
    Shutdown,
}
