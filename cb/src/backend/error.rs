//! Backend error types

use thiserror::Error;

/// Errors that can occur while calling the university backend
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend {method} {path} returned {status}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl BackendError {
    /// HTTP status code, if the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Case-insensitive check of the rendered error text
    ///
    /// Used to recognize business conflicts the backend reports only in prose.
    pub fn mentions(&self, needle: &str) -> bool {
        self.to_string().to_lowercase().contains(&needle.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_error(status: u16, body: &str) -> BackendError {
        BackendError::Status {
            method: "POST".to_string(),
            path: "/api/v1/admissions/events/3/book".to_string(),
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_status_error_display() {
        let err = status_error(409, r#"{"detail":"Event is fully booked"}"#);
        assert_eq!(
            err.to_string(),
            r#"Backend POST /api/v1/admissions/events/3/book returned 409: {"detail":"Event is fully booked"}"#
        );
        assert_eq!(err.status(), Some(409));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_mentions_is_case_insensitive() {
        let err = status_error(409, "Event is Fully Booked");
        assert!(err.mentions("fully booked"));
        assert!(!err.mentions("already booked"));
    }

    #[test]
    fn test_not_found() {
        assert!(status_error(404, "").is_not_found());
    }

    #[test]
    fn test_decode_error_has_no_status() {
        let source = serde_json::from_str::<i64>("oops").unwrap_err();
        let err = BackendError::Decode {
            path: "/api/v1/news".to_string(),
            source,
        };
        assert!(err.status().is_none());
        assert!(err.to_string().starts_with("Failed to decode response from /api/v1/news"));
    }
}
