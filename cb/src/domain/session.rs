//! Per-chat conversation session

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use super::action::ActionId;
use super::entities::UserProfile;
use super::types::{ChatId, Language, Role, Stage, UserId};

/// One-time code issued during login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
    /// A code is still valid at exactly its expiry instant
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn matches(&self, input: &str) -> bool {
        input.trim() == self.code
    }
}

/// Progress through a multi-step form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingForm {
    pub action: ActionId,
    pub step: usize,
    pub data: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
}

impl PendingForm {
    pub fn new(action: ActionId, started_at: DateTime<Utc>) -> Self {
        Self {
            action,
            step: 0,
            data: BTreeMap::new(),
            started_at,
        }
    }
}

/// The single interaction a session may be waiting on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Pending {
    #[default]
    None,
    AwaitingOtp(OtpChallenge),
    CollectingForm(PendingForm),
    AwaitingEventMode {
        event_id: i64,
    },
}

/// Authentication state
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Auth {
    #[default]
    Guest,
    Authenticated(UserProfile),
}

/// Conversation state for one chat
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub language: Language,
    pub role: Role,
    pub stage: Stage,
    pub email: String,
    pub auth: Auth,
    pub current_menu: Option<String>,
    pub pending: Pending,
    pub notifications_enabled: bool,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(chat_id: ChatId, user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            chat_id,
            user_id,
            language: Language::Ru,
            role: Role::Applicant,
            stage: Stage::Init,
            email: String::new(),
            auth: Auth::Guest,
            current_menu: None,
            pending: Pending::None,
            notifications_enabled: true,
            last_activity: now,
        }
    }

    /// Forget authentication and navigation, keeping chat identity and preferences
    pub fn reset(&mut self) {
        self.stage = Stage::Init;
        self.pending = Pending::None;
        self.auth = Auth::Guest;
        self.email.clear();
        self.role = Role::Applicant;
        self.current_menu = None;
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        match &self.auth {
            Auth::Authenticated(profile) => Some(profile),
            Auth::Guest => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.auth, Auth::Authenticated(_))
    }

    /// Backend user id, present only for a known (non-synthesized) profile
    pub fn backend_user_id(&self) -> Option<i64> {
        self.profile().map(|p| p.id).filter(|id| *id != 0)
    }

    pub fn otp(&self) -> Option<&OtpChallenge> {
        match &self.pending {
            Pending::AwaitingOtp(challenge) => Some(challenge),
            _ => None,
        }
    }

    pub fn form(&self) -> Option<&PendingForm> {
        match &self.pending {
            Pending::CollectingForm(form) => Some(form),
            _ => None,
        }
    }

    pub fn form_mut(&mut self) -> Option<&mut PendingForm> {
        match &mut self.pending {
            Pending::CollectingForm(form) => Some(form),
            _ => None,
        }
    }

    pub fn pending_event(&self) -> Option<i64> {
        match self.pending {
            Pending::AwaitingEventMode { event_id } => Some(event_id),
            _ => None,
        }
    }

    pub fn clear_pending(&mut self) {
        self.pending = Pending::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile(id: i64) -> UserProfile {
        UserProfile {
            id,
            email: "a@univ.ru".to_string(),
            role: "student".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_session_defaults() {
        let session = Session::new(10, 20, Utc::now());
        assert_eq!(session.language, Language::Ru);
        assert_eq!(session.stage, Stage::Init);
        assert_eq!(session.role, Role::Applicant);
        assert!(!session.is_authenticated());
        assert_eq!(session.pending, Pending::None);
    }

    #[test]
    fn test_reset_keeps_identity_and_language() {
        let mut session = Session::new(10, 20, Utc::now());
        session.language = Language::En;
        session.notifications_enabled = false;
        session.stage = Stage::MainMenu;
        session.role = Role::Student;
        session.email = "a@univ.ru".to_string();
        session.auth = Auth::Authenticated(profile(5));
        session.current_menu = Some("student.root".to_string());
        session.pending = Pending::AwaitingEventMode { event_id: 3 };

        session.reset();

        assert_eq!(session.chat_id, 10);
        assert_eq!(session.user_id, 20);
        assert_eq!(session.language, Language::En);
        assert!(!session.notifications_enabled);
        assert_eq!(session.stage, Stage::Init);
        assert_eq!(session.role, Role::Applicant);
        assert!(session.email.is_empty());
        assert!(!session.is_authenticated());
        assert!(session.current_menu.is_none());
        assert_eq!(session.pending, Pending::None);
    }

    #[test]
    fn test_backend_user_id_ignores_synthesized_profiles() {
        let mut session = Session::new(1, 1, Utc::now());
        assert_eq!(session.backend_user_id(), None);
        session.auth = Auth::Authenticated(profile(0));
        assert_eq!(session.backend_user_id(), None);
        session.auth = Auth::Authenticated(profile(77));
        assert_eq!(session.backend_user_id(), Some(77));
    }

    #[test]
    fn test_otp_expiry_boundary() {
        let now = Utc::now();
        let challenge = OtpChallenge {
            code: "123456".to_string(),
            expires_at: now,
        };
        assert!(!challenge.is_expired(now));
        assert!(challenge.is_expired(now + Duration::milliseconds(1)));
        assert!(challenge.matches(" 123456 "));
        assert!(!challenge.matches("12345"));
    }

    #[test]
    fn test_pending_accessors_are_exclusive() {
        let now = Utc::now();
        let mut session = Session::new(1, 1, now);
        session.pending = Pending::CollectingForm(PendingForm::new(ActionId::Faq, now));
        assert!(session.form().is_some());
        assert!(session.otp().is_none());
        assert!(session.pending_event().is_none());

        session.form_mut().unwrap().step = 1;
        assert_eq!(session.form().unwrap().step, 1);

        session.clear_pending();
        assert!(session.form().is_none());
    }
}
