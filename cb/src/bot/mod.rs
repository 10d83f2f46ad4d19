//! Dialogue Controller
//!
//! [`Service`] turns one normalized [`Update`] into session changes and
//! replies. It owns the onboarding state machine (language, access mode,
//! email, one-time code) and, once a session reaches the main menu, routes
//! callbacks to navigation, actions, forms and the small sub-flows.
//!
//! Updates for a single chat must not be handled concurrently; see
//! [`lanes::LaneDispatcher`].

pub mod actions;
mod flows;
pub mod forms;
pub mod lanes;
pub mod menus;

pub use actions::{ActionContext, ActionHandler, ActionTable};
pub use forms::{FormDefinition, FormField, FormRegistry};
pub use lanes::LaneDispatcher;
pub use menus::{MenuError, MenuNode, MenuRegistry};

use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::clock::Clock;
use crate::config::{AuthConfig, Config};
use crate::domain::{
    ActionId, Auth, Button, ButtonStyle, Keyboard, Language, OtpChallenge, OutgoingMessage, Pending, Role, Session,
    Stage, Update, UserProfile,
};
use crate::messenger::{Messenger, MessengerError, UpdateHandler};
use crate::notifier::EmailSender;
use crate::state::{SessionStore, StoreError};

pub(crate) const NAV_PREFIX: &str = "nav:";
pub(crate) const ACTION_PREFIX: &str = "act:";
pub(crate) const LANG_PREFIX: &str = "lang:";
pub(crate) const AUTH_PREFIX: &str = "auth:";
pub(crate) const EVENT_SELECT_PREFIX: &str = "event_select:";
pub(crate) const EVENT_MODE_PREFIX: &str = "event_mode:";
pub(crate) const CANCEL_EVENT_PREFIX: &str = "cancel_event:";
pub(crate) const SCHEDULE_PREFIX: &str = "schedule:";
pub(crate) const VISA_TYPE_PREFIX: &str = "visa_type:";
pub(crate) const VISA_APP_PREFIX: &str = "visa_app:";
pub(crate) const VISA_WITHDRAW_PREFIX: &str = "visa_withdraw:";

/// Errors that abort handling of a single update
#[derive(Debug, Error)]
pub enum BotError {
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Delivery failed: {0}")]
    Messenger(#[from] MessengerError),
}

/// Lower-case and check the shape of an email address
///
/// Accepts anything containing `@` that is at least five bytes long.
pub fn normalize_email(input: &str) -> Option<String> {
    let email = input.trim().to_lowercase();
    (email.contains('@') && email.len() >= 5).then_some(email)
}

/// Random numeric code of `digits` characters
pub fn generate_otp(digits: usize) -> String {
    let mut rng = rand::rng();
    (0..digits).map(|_| char::from(b'0' + rng.random_range(0..10u8))).collect()
}

/// The conversation engine
pub struct Service {
    store: SessionStore,
    menus: Arc<MenuRegistry>,
    forms: FormRegistry,
    actions: ActionTable,
    ctx: ActionContext,
    messenger: Arc<dyn Messenger>,
    email: Arc<dyn EmailSender>,
    clock: Clock,
    auth: AuthConfig,
}

impl Service {
    pub fn new(
        config: &Config,
        store: SessionStore,
        menus: Arc<MenuRegistry>,
        backend: Arc<dyn Backend>,
        messenger: Arc<dyn Messenger>,
        email: Arc<dyn EmailSender>,
        clock: Clock,
    ) -> Self {
        debug!(menu_nodes = menus.len(), "Service::new: called");
        Self {
            store,
            menus,
            forms: FormRegistry::builtin(),
            actions: ActionTable::builtin(),
            ctx: ActionContext {
                backend,
                contacts: config.contacts.clone(),
            },
            messenger,
            email,
            clock,
            auth: config.auth.clone(),
        }
    }

    /// Handle one update from the messenger
    pub async fn handle_update(&self, update: Update) -> Result<(), BotError> {
        debug!(chat_id = %update.chat_id, kind = ?update.kind, "handle_update: called");
        if update.chat_id == 0 {
            debug!("handle_update: no chat id, ignoring");
            return Ok(());
        }

        let mut session = self.ensure_session(&update).await?;

        if self.handle_global_command(&mut session, &update).await? {
            return Ok(());
        }

        match session.stage {
            Stage::SelectLanguage => self.handle_language_selection(&mut session, &update).await,
            Stage::ChooseAuthMode => self.handle_choose_auth_mode(&mut session, &update).await,
            Stage::CollectEmail => self.handle_email(&mut session, &update).await,
            Stage::AwaitOtp => self.handle_otp(&mut session, &update).await,
            Stage::MainMenu => self.handle_main_menu(&mut session, &update).await,
            Stage::Init => {
                session.stage = Stage::SelectLanguage;
                self.send_language_prompt(&mut session, true).await
            }
        }
    }

    async fn ensure_session(&self, update: &Update) -> Result<Session, BotError> {
        let mut session = match self.store.get(update.chat_id).await? {
            Some(session) => session,
            None => {
                info!(chat_id = %update.chat_id, "New session");
                let session = Session::new(update.chat_id, update.user_id, self.clock.now());
                self.store.save(session.clone()).await?;
                session
            }
        };
        if update.user_id != 0 {
            session.user_id = update.user_id;
        }
        Ok(session)
    }

    /// Returns true when the update was a command that has been handled
    async fn handle_global_command(&self, session: &mut Session, update: &Update) -> Result<bool, BotError> {
        if !update.is_message() {
            return Ok(false);
        }
        let language = session.language;
        match update.text.trim().to_lowercase().as_str() {
            "/start" => {
                debug!(chat_id = %session.chat_id, "handle_global_command: /start");
                session.reset();
                session.stage = Stage::SelectLanguage;
                self.send_language_prompt(session, true).await?;
            }
            "/language" => {
                session.stage = Stage::SelectLanguage;
                session.clear_pending();
                self.send_language_prompt(session, false).await?;
            }
            "/help" => {
                let text = language.pick(
                    "🆘 **Помощь**\n\n📋 **Команды:**\n• /start - Перезапустить бота\n• /language - Изменить язык\n• /help - Показать эту справку\n• /cancel - Отменить текущее действие\n\n❓ **Часто задаваемые вопросы:**\n• Как войти? Используйте /start и выберите 'Войти'.\n• Забыли пароль? Свяжитесь с поддержкой через меню.\n• Проблемы с ботом? Опишите в '🐞 Сообщить об ошибке'.\n\n💬 Для дополнительной помощи используйте меню 'ℹ️ Поддержка'.",
                    "🆘 **Help**\n\n📋 **Commands:**\n• /start - Restart the bot\n• /language - Change language\n• /help - Show this help\n• /cancel - Cancel current action\n\n❓ **FAQs:**\n• How to login? Use /start and choose 'Login'.\n• Forgot password? Contact support via menu.\n• Bot issues? Report in '🐞 Report issue'.\n\n💬 For more help, use 'ℹ️ Support' menu.",
                );
                self.reply(session, OutgoingMessage::markdown(text)).await?;
            }
            "/cancel" | "cancel" | "отмена" if session.form().is_some() => {
                session.clear_pending();
                let text = language.pick("🚫 Действие отменено.", "🚫 Action cancelled.");
                self.reply(session, OutgoingMessage::text(text)).await?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    async fn handle_language_selection(&self, session: &mut Session, update: &Update) -> Result<(), BotError> {
        let code = match update.payload_after(LANG_PREFIX) {
            Some(code) if !code.is_empty() => code,
            _ => update.text.as_str(),
        };
        let Some(language) = Language::parse(code) else {
            return self.send_language_prompt(session, false).await;
        };
        debug!(chat_id = %session.chat_id, %language, "handle_language_selection: selected");
        session.language = language;

        if session.is_authenticated() {
            session.stage = Stage::MainMenu;
            session.clear_pending();
            let text = language.pick("🌐 Язык интерфейса изменён!", "🌐 Interface language changed!");
            self.reply(session, OutgoingMessage::text(text)).await?;
            return self.send_current_menu(session).await;
        }

        session.stage = Stage::ChooseAuthMode;
        self.send_auth_mode_prompt(session).await
    }

    async fn handle_choose_auth_mode(&self, session: &mut Session, update: &Update) -> Result<(), BotError> {
        let mode = match update.payload_after(AUTH_PREFIX) {
            Some(mode) if !mode.is_empty() => mode.to_string(),
            _ => update.text.trim().to_lowercase(),
        };
        let language = session.language;
        match mode.as_str() {
            "guest" | "гость" => {
                debug!(chat_id = %session.chat_id, "handle_choose_auth_mode: guest");
                session.role = Role::Applicant;
                session.stage = Stage::MainMenu;
                session.current_menu = self.menus.root(session.role).map(|root| root.id.clone());
                let text = language.pick(
                    "🎉 Добро пожаловать в гостевой режим!\n\n👋 Вы можете просматривать информацию о поступлении и общих сервисах.",
                    "🎉 Welcome to guest mode!\n\n👋 You can browse admission info and general services.",
                );
                self.reply(session, OutgoingMessage::text(text)).await?;
                self.send_current_menu(session).await
            }
            "login" | "войти" => {
                session.stage = Stage::CollectEmail;
                let text = language.pick(
                    "📧 Введите ваш университетский email для авторизации:\n\nПример: student@university.edu",
                    "📧 Enter your university email for login:\n\nExample: student@university.edu",
                );
                self.reply(session, OutgoingMessage::text(text)).await
            }
            _ => self.send_auth_mode_prompt(session).await,
        }
    }

    async fn handle_email(&self, session: &mut Session, update: &Update) -> Result<(), BotError> {
        if update.text.trim().is_empty() {
            return Ok(());
        }
        let language = session.language;
        let Some(email) = normalize_email(&update.text) else {
            let text = language.pick(
                "❌ Неверный формат email. Попробуйте снова.",
                "❌ Invalid email format. Please try again.",
            );
            return self.reply(session, OutgoingMessage::text(text)).await;
        };

        let code = generate_otp(self.auth.otp_digits);
        session.email = email.clone();
        session.pending = Pending::AwaitingOtp(OtpChallenge {
            code: code.clone(),
            expires_at: self.clock.now() + self.auth.otp_expiry(),
        });
        if let Err(err) = self.email.send_otp(&email, &code).await {
            error!(error = %err, %email, "Failed to send OTP");
        }
        session.stage = Stage::AwaitOtp;

        let digits = self.auth.otp_digits;
        let text = match language {
            Language::Ru => format!(
                "🔐 Мы отправили {digits}-значный код подтверждения на вашу почту!\n\n📨 Проверьте папку \"Входящие\" и введите код:"
            ),
            Language::En => {
                format!("🔐 We sent a {digits}-digit verification code to your email!\n\n📨 Check your inbox and enter the code:")
            }
        };
        self.reply(session, OutgoingMessage::text(text)).await
    }

    async fn handle_otp(&self, session: &mut Session, update: &Update) -> Result<(), BotError> {
        if update.text.trim().is_empty() {
            return Ok(());
        }
        let Some(challenge) = session.otp() else {
            return Ok(());
        };
        let language = session.language;

        if challenge.is_expired(self.clock.now()) {
            debug!(chat_id = %session.chat_id, "handle_otp: code expired");
            session.clear_pending();
            let text = language.pick(
                "⏰ Код подтверждения истёк. Начните процесс заново с /start",
                "⏰ Verification code expired. Start over with /start",
            );
            return self.reply(session, OutgoingMessage::text(text)).await;
        }
        if !challenge.matches(&update.text) {
            let text = language.pick(
                "❌ Неверный код подтверждения. Попробуйте ещё раз.",
                "❌ Incorrect verification code. Try again.",
            );
            return self.reply(session, OutgoingMessage::text(text)).await;
        }

        let profile = match self.ctx.backend.get_user_by_email(&session.email).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                warn!(email = %session.email, "User not found, continuing as applicant");
                UserProfile::fallback(&session.email, language, self.clock.now())
            }
            Err(err) => {
                warn!(error = %err, email = %session.email, "User lookup failed, continuing as applicant");
                UserProfile::fallback(&session.email, language, self.clock.now())
            }
        };

        info!(chat_id = %session.chat_id, user = profile.id, role = %profile.role(), "Login successful");
        let name = profile.display_name(language).to_string();
        session.role = profile.role();
        session.auth = Auth::Authenticated(profile);
        session.clear_pending();
        session.current_menu = self.menus.root(session.role).map(|root| root.id.clone());
        session.stage = Stage::MainMenu;

        let text = match language {
            Language::Ru => format!("🎊 Добро пожаловать, {name}!\n\n✅ Авторизация успешна. Доступ ко всем сервисам открыт."),
            Language::En => format!("🎊 Welcome, {name}!\n\n✅ Login successful. Full access to all services."),
        };
        self.reply(session, OutgoingMessage::text(text)).await?;
        self.send_current_menu(session).await
    }

    async fn handle_main_menu(&self, session: &mut Session, update: &Update) -> Result<(), BotError> {
        if session.form().is_some() && update.is_message() && !update.text.trim().is_empty() {
            return self.handle_form_input(session, &update.text).await;
        }

        if update.is_callback() {
            let payload = update.payload.as_str();
            debug!(chat_id = %session.chat_id, %payload, "handle_main_menu: callback");

            if let Some(id) = payload.strip_prefix(NAV_PREFIX) {
                return self.navigate(session, id).await;
            }
            if let Some(action) = payload.strip_prefix(ACTION_PREFIX) {
                return match action.parse::<ActionId>() {
                    Ok(action) => self.execute_action(session, action).await,
                    Err(_) => self.reply_coming_soon(session).await,
                };
            }
            if payload.starts_with(LANG_PREFIX) {
                session.stage = Stage::SelectLanguage;
                session.clear_pending();
                return self.send_language_prompt(session, false).await;
            }
            if let Some(id) = payload.strip_prefix(EVENT_SELECT_PREFIX) {
                return self.handle_event_select(session, id).await;
            }
            if let Some(mode) = payload.strip_prefix(EVENT_MODE_PREFIX) {
                return self.handle_event_mode(session, mode).await;
            }
            if let Some(id) = payload.strip_prefix(CANCEL_EVENT_PREFIX) {
                return self.handle_cancel_event(session, id).await;
            }
            if let Some(day) = payload.strip_prefix(SCHEDULE_PREFIX) {
                return self.handle_schedule_day(session, day).await;
            }
            if let Some(kind) = payload.strip_prefix(VISA_TYPE_PREFIX) {
                return self.handle_visa_type(session, kind).await;
            }
            if let Some(id) = payload.strip_prefix(VISA_APP_PREFIX) {
                return self.handle_visa_application(session, id).await;
            }
            if let Some(id) = payload.strip_prefix(VISA_WITHDRAW_PREFIX) {
                return self.handle_visa_withdraw(session, id).await;
            }
        }

        if !update.text.trim().is_empty() {
            let text = session.language.pick(
                "Используйте кнопки меню или команды /start, /language, /help.",
                "Use the menu buttons or /start /language /help commands.",
            );
            return self.reply(session, OutgoingMessage::text(text)).await;
        }
        Ok(())
    }

    /// Move to a menu node and show it; ids outside the role's tree are ignored
    async fn navigate(&self, session: &mut Session, id: &str) -> Result<(), BotError> {
        let Some(node) = self.menus.node_for(session.role, id) else {
            debug!(%id, role = %session.role, "navigate: node not in role tree");
            return Ok(());
        };
        session.current_menu = Some(node.id.clone());
        let message = self.menus.render(node, session.role, session.language);
        self.reply(session, message).await
    }

    async fn execute_action(&self, session: &mut Session, action: ActionId) -> Result<(), BotError> {
        debug!(chat_id = %session.chat_id, %action, "execute_action: called");
        if action == ActionId::SwitchLanguage {
            session.stage = Stage::SelectLanguage;
            session.clear_pending();
            return self.send_language_prompt(session, false).await;
        }
        if self.forms.contains(action) {
            return self.start_form(session, action).await;
        }
        let Some(handler) = self.actions.get(action) else {
            return self.reply_coming_soon(session).await;
        };

        let message = match handler.handle(&self.ctx, session).await {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, %action, chat_id = %session.chat_id, "Action handler failed");
                OutgoingMessage::text(
                    session
                        .language
                        .pick("Произошла ошибка. Попробуйте позже.", "Something went wrong, please try later."),
                )
            }
        };
        self.reply(session, message).await
    }

    async fn reply_coming_soon(&self, session: &mut Session) -> Result<(), BotError> {
        let text = session.language.pick(
            "🚀 Функция скоро появится. Следите за обновлениями!",
            "🚀 Coming soon. Stay tuned!",
        );
        self.reply(session, OutgoingMessage::text(text)).await
    }

    /// Show the session's current menu, falling back to the role root
    async fn send_current_menu(&self, session: &mut Session) -> Result<(), BotError> {
        let node = match session.current_menu.as_deref().and_then(|id| self.menus.node(id)) {
            Some(node) => node,
            None => match self.menus.root(session.role) {
                Some(root) => root,
                None => {
                    warn!(role = %session.role, "No menu for role");
                    return Ok(());
                }
            },
        };
        session.current_menu = Some(node.id.clone());
        let message = self.menus.render(node, session.role, session.language);
        self.reply(session, message).await
    }

    async fn send_language_prompt(&self, session: &mut Session, reset: bool) -> Result<(), BotError> {
        let text = session.language.pick(
            "🌐 Выберите язык интерфейса\n\n🇷🇺 Русский - Полная локализация\n🇬🇧 English - Full localization",
            "🌐 Choose interface language\n\n🇷🇺 Русский - Full localization\n🇬🇧 English - Полная локализация",
        );
        let keyboard = Keyboard::new().row(vec![
            Button::callback("🇷🇺 Русский", format!("{LANG_PREFIX}ru")),
            Button::callback("🇬🇧 English", format!("{LANG_PREFIX}en")),
        ]);
        let message = OutgoingMessage::text(text).with_keyboard(keyboard).with_reset(reset);
        self.reply(session, message).await
    }

    async fn send_auth_mode_prompt(&self, session: &mut Session) -> Result<(), BotError> {
        let language = session.language;
        let text = language.pick(
            "🎭 Выберите режим доступа:\n\n👤 **Гость** - Просмотр информации без авторизации\n📧 **Войти** - Полный доступ к личным сервисам",
            "🎭 Choose access mode:\n\n👤 **Guest** - Browse info without login\n📧 **Login** - Full access to personal services",
        );
        let keyboard = Keyboard::new().row(vec![
            Button::callback(format!("👤 {}", language.pick("Гость", "Guest")), format!("{AUTH_PREFIX}guest"))
                .with_style(ButtonStyle::Secondary),
            Button::callback(format!("📧 {}", language.pick("Войти", "Login")), format!("{AUTH_PREFIX}login")),
        ]);
        self.reply(session, OutgoingMessage::markdown(text).with_keyboard(keyboard))
            .await
    }

    /// Persist the session, then deliver `message` to its chat
    async fn reply(&self, session: &Session, message: OutgoingMessage) -> Result<(), BotError> {
        self.store.save(session.clone()).await?;
        self.messenger.send(session.chat_id, session.user_id, &message).await?;
        Ok(())
    }
}

#[async_trait]
impl UpdateHandler for Service {
    async fn handle(&self, update: Update) {
        let chat_id = update.chat_id;
        if let Err(err) = self.handle_update(update).await {
            error!(error = %err, %chat_id, "Failed to handle update");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{CHAT, Harness, USER};
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::notifier::mock::RecordingSender;
    use chrono::Duration;
    use proptest::prelude::*;

    fn student_profile() -> UserProfile {
        UserProfile {
            id: 7,
            email: "ivan@univ.ru".to_string(),
            full_name_ru: "Иван Петров".to_string(),
            full_name_en: "Ivan Petrov".to_string(),
            role: "student".to_string(),
            ..Default::default()
        }
    }

    async fn login_until_otp(h: &Harness, email: &str) -> String {
        h.text("/start").await;
        h.press("lang:en").await;
        h.press("auth:login").await;
        h.text(email).await;
        h.email.last_code().unwrap()
    }

    #[tokio::test]
    async fn test_chat_zero_is_ignored() {
        let h = Harness::new(MockBackend::new());
        h.service.handle_update(Update::message(0, USER, "/start")).await.unwrap();
        assert!(h.messenger.sent().is_empty());
        assert_eq!(h.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_first_contact_prompts_language_with_reset() {
        let h = Harness::new(MockBackend::new());
        h.text("hello").await;

        let message = h.messenger.last().unwrap();
        assert!(message.reset);
        assert_eq!(message.keyboard.unwrap().payloads(), vec!["lang:ru", "lang:en"]);
        let session = h.session().await;
        assert_eq!(session.stage, Stage::SelectLanguage);
        assert_eq!(session.user_id, USER);
    }

    #[tokio::test]
    async fn test_guest_onboarding() {
        let h = Harness::new(MockBackend::new());
        h.text("/start").await;
        h.press("lang:en").await;
        assert_eq!(h.session().await.stage, Stage::ChooseAuthMode);
        assert!(h.last_text().contains("Choose access mode"));

        h.press("auth:guest").await;
        let session = h.session().await;
        assert_eq!(session.stage, Stage::MainMenu);
        assert_eq!(session.role, Role::Applicant);
        assert_eq!(session.language, Language::En);
        assert_eq!(session.current_menu.as_deref(), Some("applicant.root"));
        assert!(!session.is_authenticated());

        let texts = h.messenger.texts();
        assert!(texts[texts.len() - 2].starts_with("🎉 Welcome to guest mode!"));
        let menu = h.messenger.last().unwrap();
        assert!(menu.keyboard.is_some());
    }

    #[tokio::test]
    async fn test_text_language_and_auth_aliases() {
        let h = Harness::new(MockBackend::new());
        h.text("/start").await;
        h.text("Russian").await;
        assert_eq!(h.session().await.language, Language::Ru);
        h.text("гость").await;
        assert_eq!(h.session().await.stage, Stage::MainMenu);
    }

    #[tokio::test]
    async fn test_unrecognized_language_reprompts() {
        let h = Harness::new(MockBackend::new());
        h.text("/start").await;
        h.clear();
        h.text("deutsch").await;
        let message = h.messenger.last().unwrap();
        assert!(!message.reset);
        assert!(message.text.starts_with("🌐"));
        assert_eq!(h.session().await.stage, Stage::SelectLanguage);
    }

    #[tokio::test]
    async fn test_unrecognized_auth_mode_reprompts() {
        let h = Harness::new(MockBackend::new());
        h.text("/start").await;
        h.press("lang:ru").await;
        h.text("maybe").await;
        assert_eq!(h.session().await.stage, Stage::ChooseAuthMode);
        assert!(h.last_text().starts_with("🎭 Выберите режим доступа"));
    }

    #[tokio::test]
    async fn test_invalid_email_keeps_stage() {
        let h = Harness::new(MockBackend::new());
        h.text("/start").await;
        h.press("lang:en").await;
        h.press("auth:login").await;
        h.text("a@b").await;
        assert_eq!(h.last_text(), "❌ Invalid email format. Please try again.");
        assert_eq!(h.session().await.stage, Stage::CollectEmail);
        assert!(h.email.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_with_known_user() {
        let h = Harness::new(MockBackend::new().with_user(student_profile()));
        let code = login_until_otp(&h, "  Ivan@Univ.RU ").await;

        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        let session = h.session().await;
        assert_eq!(session.stage, Stage::AwaitOtp);
        assert_eq!(session.email, "ivan@univ.ru");
        assert!(h.last_text().contains("6-digit"));

        h.text(&format!(" {code} ")).await;
        let session = h.session().await;
        assert_eq!(session.stage, Stage::MainMenu);
        assert_eq!(session.role, Role::Student);
        assert_eq!(session.backend_user_id(), Some(7));
        assert_eq!(session.current_menu.as_deref(), Some("student.root"));
        assert!(session.otp().is_none());
        assert_eq!(h.backend.last_args("get_user_by_email").unwrap()["email"], "ivan@univ.ru");

        let texts = h.messenger.texts();
        assert!(texts[texts.len() - 2].starts_with("🎊 Welcome, Ivan Petrov!"));
    }

    #[tokio::test]
    async fn test_login_with_unknown_user_falls_back_to_applicant() {
        let h = Harness::new(MockBackend::new());
        let code = login_until_otp(&h, "guest@mail.com").await;
        h.text(&code).await;

        let session = h.session().await;
        assert_eq!(session.stage, Stage::MainMenu);
        assert_eq!(session.role, Role::Applicant);
        assert!(session.is_authenticated());
        assert_eq!(session.backend_user_id(), None);
        assert_eq!(session.profile().unwrap().full_name_en, "guest@mail.com");
    }

    #[tokio::test]
    async fn test_login_lookup_error_falls_back_to_applicant() {
        let h = Harness::new(MockBackend::new().fail("get_user_by_email", "boom"));
        let code = login_until_otp(&h, "x@univ.ru").await;
        h.text(&code).await;
        assert_eq!(h.session().await.role, Role::Applicant);
        assert_eq!(h.session().await.stage, Stage::MainMenu);
    }

    #[tokio::test]
    async fn test_wrong_code_reprompts() {
        let h = Harness::new(MockBackend::new());
        let code = login_until_otp(&h, "x@univ.ru").await;
        let wrong = if code == "000000" { "111111" } else { "000000" };
        h.text(wrong).await;
        assert_eq!(h.last_text(), "❌ Incorrect verification code. Try again.");
        let session = h.session().await;
        assert_eq!(session.stage, Stage::AwaitOtp);
        assert!(session.otp().is_some());
    }

    #[tokio::test]
    async fn test_expired_code() {
        let h = Harness::new(MockBackend::new());
        let code = login_until_otp(&h, "x@univ.ru").await;
        h.clock.advance(Duration::seconds(301));
        h.text(&code).await;

        assert!(h.last_text().starts_with("⏰ Verification code expired"));
        let session = h.session().await;
        assert!(session.otp().is_none());
        assert!(!session.is_authenticated());

        // Without a challenge further input is ignored
        h.clear();
        h.text(&code).await;
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn test_code_valid_at_exact_expiry() {
        let h = Harness::new(MockBackend::new());
        let code = login_until_otp(&h, "x@univ.ru").await;
        h.clock.advance(Duration::seconds(300));
        h.text(&code).await;
        assert_eq!(h.session().await.stage, Stage::MainMenu);
    }

    #[tokio::test]
    async fn test_email_delivery_failure_still_advances() {
        let h = Harness::with_email(MockBackend::new(), RecordingSender::failing());
        login_until_otp(&h, "x@univ.ru").await;
        assert_eq!(h.session().await.stage, Stage::AwaitOtp);
    }

    #[tokio::test]
    async fn test_start_resets_logged_in_session() {
        let h = Harness::new(MockBackend::new());
        h.logged_in(Role::Student, 7).await;
        let mut session = h.session().await;
        session.language = Language::En;
        h.put(session).await;

        h.text("/START").await;
        let session = h.session().await;
        assert_eq!(session.stage, Stage::SelectLanguage);
        assert!(!session.is_authenticated());
        assert_eq!(session.role, Role::Applicant);
        assert!(session.current_menu.is_none());
        assert_eq!(session.language, Language::En);
        assert!(h.messenger.last().unwrap().reset);
    }

    #[tokio::test]
    async fn test_language_switch_while_logged_in_returns_to_menu() {
        let h = Harness::new(MockBackend::new());
        h.logged_in(Role::Employee, 3).await;
        h.text("/language").await;
        let session = h.session().await;
        assert_eq!(session.stage, Stage::SelectLanguage);
        assert!(session.is_authenticated());

        h.press("lang:en").await;
        let session = h.session().await;
        assert_eq!(session.stage, Stage::MainMenu);
        assert_eq!(session.language, Language::En);
        let texts = h.messenger.texts();
        assert_eq!(texts[texts.len() - 2], "🌐 Interface language changed!");
        assert!(h.last_text().starts_with("🏠 Main menu"));
    }

    #[tokio::test]
    async fn test_help_is_markdown() {
        let h = Harness::new(MockBackend::new());
        h.guest().await;
        h.text("/help").await;
        let message = h.messenger.last().unwrap();
        assert!(message.text.starts_with("🆘 **Помощь**"));
        assert!(message.parse_mode.is_some());
        assert_eq!(h.session().await.stage, Stage::MainMenu);
    }

    #[tokio::test]
    async fn test_cancel_without_form_falls_through() {
        let h = Harness::new(MockBackend::new());
        h.guest().await;
        h.text("отмена").await;
        assert_eq!(h.last_text(), "Используйте кнопки меню или команды /start, /language, /help.");
    }

    #[tokio::test]
    async fn test_cancel_clears_form() {
        let h = Harness::new(MockBackend::new());
        h.guest().await;
        h.press("act:faq").await;
        assert!(h.session().await.form().is_some());

        h.text("Cancel").await;
        assert_eq!(h.last_text(), "🚫 Действие отменено.");
        assert!(h.session().await.form().is_none());
        assert_eq!(h.backend.call_count("submit_support_query"), 0);
    }

    #[tokio::test]
    async fn test_navigation_is_idempotent() {
        let h = Harness::new(MockBackend::new());
        h.logged_in(Role::Student, 7).await;
        h.press("nav:student.library").await;
        let first = h.messenger.last().unwrap();
        h.press("nav:student.library").await;
        let second = h.messenger.last().unwrap();

        assert_eq!(first, second);
        assert_eq!(h.session().await.current_menu.as_deref(), Some("student.library"));
        let payloads = first.keyboard.unwrap().payloads().join(",");
        assert!(payloads.contains("act:library_search"));
        assert!(payloads.ends_with("nav:student.root,nav:student.root"));
    }

    #[tokio::test]
    async fn test_unknown_node_is_ignored() {
        let h = Harness::new(MockBackend::new());
        h.logged_in(Role::Student, 7).await;
        h.press("nav:student.nowhere").await;
        assert!(h.messenger.sent().is_empty());
        assert_eq!(h.session().await.current_menu.as_deref(), Some("student.root"));
    }

    #[tokio::test]
    async fn test_other_role_menu_is_ignored() {
        let h = Harness::new(MockBackend::new());
        h.logged_in(Role::Student, 7).await;
        h.press("nav:leadership.root").await;
        h.press("nav:employee.trips").await;
        assert!(h.messenger.sent().is_empty());
        let session = h.session().await;
        assert_eq!(session.role, Role::Student);
        assert_eq!(session.current_menu.as_deref(), Some("student.root"));

        h.guest().await;
        h.press("nav:student.root").await;
        assert!(h.messenger.sent().is_empty());
        assert_eq!(h.session().await.current_menu.as_deref(), Some("applicant.root"));
    }

    #[tokio::test]
    async fn test_unknown_action_is_coming_soon() {
        let h = Harness::new(MockBackend::new());
        h.guest().await;
        h.press("act:teleport").await;
        assert_eq!(h.last_text(), "🚀 Функция скоро появится. Следите за обновлениями!");
    }

    #[tokio::test]
    async fn test_switch_language_action() {
        let h = Harness::new(MockBackend::new());
        h.guest().await;
        h.press("act:faq").await;
        h.press("act:switch_language").await;
        let session = h.session().await;
        assert_eq!(session.stage, Stage::SelectLanguage);
        assert!(session.form().is_none());
    }

    #[tokio::test]
    async fn test_free_text_in_menu_gets_hint() {
        let h = Harness::new(MockBackend::new());
        h.logged_in(Role::Student, 7).await;
        let mut session = h.session().await;
        session.language = Language::En;
        h.put(session).await;
        h.text("what now?").await;
        assert_eq!(h.last_text(), "Use the menu buttons or /start /language /help commands.");
    }

    #[tokio::test]
    async fn test_action_failure_is_reported_generically() {
        let h = Harness::new(MockBackend::new().fail("get_exams", "db down"));
        h.logged_in(Role::Student, 7).await;
        h.press("act:view_exams").await;
        assert_eq!(h.last_text(), "Произошла ошибка. Попробуйте позже.");
        assert_eq!(h.session().await.stage, Stage::MainMenu);
    }

    #[tokio::test]
    async fn test_delivery_failure_surfaces_as_error() {
        let h = Harness::new(MockBackend::new());
        h.messenger.set_failing(true);
        let result = h.service.handle_update(Update::message(CHAT, USER, "/start")).await;
        assert!(matches!(result, Err(BotError::Messenger(_))));
        // The session was still persisted before the send
        assert_eq!(h.session().await.stage, Stage::SelectLanguage);
    }

    #[tokio::test]
    async fn test_every_reply_leaves_main_menu_sessions_with_a_root() {
        let h = Harness::new(MockBackend::new().with_user(student_profile()));
        let code = login_until_otp(&h, "ivan@univ.ru").await;
        h.text(&code).await;
        for payload in ["nav:student.education", "act:view_grades", "nav:student.root", "act:toggle_notifications"] {
            h.press(payload).await;
            let session = h.session().await;
            assert_eq!(session.stage, Stage::MainMenu);
            assert!(session.current_menu.is_some());
        }
    }

    #[tokio::test]
    async fn test_user_id_stamped_from_updates() {
        let h = Harness::new(MockBackend::new());
        h.service.handle_update(Update::message(CHAT, 0, "hi")).await.unwrap();
        assert_eq!(h.session().await.user_id, 0);
        h.service.handle_update(Update::message(CHAT, 99, "ru")).await.unwrap();
        assert_eq!(h.session().await.user_id, 99);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email(" Ivan@Univ.RU ").as_deref(), Some("ivan@univ.ru"));
        assert_eq!(normalize_email("a@b.c").as_deref(), Some("a@b.c"));
        assert!(normalize_email("a@b").is_none());
        assert!(normalize_email("nobody.univ.ru").is_none());
    }

    proptest! {
        #[test]
        fn prop_generated_codes_are_numeric(digits in 4usize..=10) {
            let code = generate_otp(digits);
            prop_assert_eq!(code.len(), digits);
            prop_assert!(code.chars().all(|c| c.is_ascii_digit()));
        }

        #[test]
        fn prop_accepted_emails_are_normalized(input in "[A-Za-z0-9. @]{0,20}") {
            if let Some(email) = normalize_email(&input) {
                prop_assert!(email.contains('@'));
                prop_assert!(email.len() >= 5);
                prop_assert_eq!(email.clone(), email.trim().to_lowercase());
            }
        }
    }
}
