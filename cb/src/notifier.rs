//! One-time code delivery

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Failed to deliver code to {email}: {reason}")]
    Delivery { email: String, reason: String },
}

/// Delivers login codes to users
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_otp(&self, email: &str, code: &str) -> Result<(), NotifierError>;
}

/// Writes codes to the log instead of sending mail
///
/// Used until an SMTP relay is configured.
#[derive(Debug, Clone, Default)]
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn send_otp(&self, email: &str, code: &str) -> Result<(), NotifierError> {
        info!(%email, %code, "OTP issued");
        Ok(())
    }
}
