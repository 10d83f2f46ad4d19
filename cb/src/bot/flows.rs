//! Callback sub-flows that span more than one button press

use tracing::{debug, error};

use crate::domain::{Button, ButtonStyle, Keyboard, Language, OutgoingMessage, Pending, Session, format_time};

use super::actions::login_required;
use super::{BotError, EVENT_MODE_PREFIX, Service, VISA_WITHDRAW_PREFIX};

impl Service {
    /// `event_select:<id>`: remember the event and ask for a registration type
    pub(crate) async fn handle_event_select(&self, session: &mut Session, raw_id: &str) -> Result<(), BotError> {
        let language = session.language;
        let Ok(event_id) = raw_id.parse::<i64>() else {
            let text = language.pick("Неверный ID мероприятия.", "Invalid event ID.");
            return self.reply(session, OutgoingMessage::text(text)).await;
        };
        debug!(chat_id = %session.chat_id, %event_id, "handle_event_select: called");
        session.pending = Pending::AwaitingEventMode { event_id };

        let keyboard = Keyboard::new().row(vec![
            Button::callback(language.pick("Слушатель", "Attendee"), format!("{EVENT_MODE_PREFIX}attendee")),
            Button::callback(
                language.pick("Участник", "Participant"),
                format!("{EVENT_MODE_PREFIX}participant"),
            ),
        ]);
        let text = language.pick("Выберите тип регистрации:", "Choose your registration type:");
        self.reply(session, OutgoingMessage::text(text).with_keyboard(keyboard))
            .await
    }

    /// `event_mode:<mode>`: register for the remembered event
    pub(crate) async fn handle_event_mode(&self, session: &mut Session, mode: &str) -> Result<(), BotError> {
        let language = session.language;
        let Some(event_id) = session.pending_event() else {
            let text = language.pick("Мероприятие не выбрано.", "No event selected.");
            return self.reply(session, OutgoingMessage::text(text)).await;
        };
        session.clear_pending();
        let Some(user_id) = session.backend_user_id() else {
            return self.reply(session, login_required(language)).await;
        };

        debug!(chat_id = %session.chat_id, %event_id, %mode, "handle_event_mode: called");
        let text = match self.ctx.backend.rsvp_event(event_id, user_id, mode, "").await {
            Ok(status) => match status.as_str() {
                "registered" | "updated" => match language {
                    Language::Ru => format!("Регистрация успешна ({mode})!"),
                    Language::En => format!("Registration successful as {mode}!"),
                },
                "already_registered" => language
                    .pick(
                        "Вы уже зарегистрированы на это мероприятие.",
                        "You are already registered for this event.",
                    )
                    .to_string(),
                other => format!("{} {other}", language.pick("Статус регистрации:", "Registration status:")),
            },
            Err(err) => {
                error!(error = %err, %event_id, "RSVP failed");
                language
                    .pick(
                        "Не удалось зарегистрироваться. Попробуйте позже.",
                        "Registration failed, please try later.",
                    )
                    .to_string()
            }
        };
        self.reply(session, OutgoingMessage::text(text)).await
    }

    /// `cancel_event:<id>`: drop the user's registration
    pub(crate) async fn handle_cancel_event(&self, session: &mut Session, raw_id: &str) -> Result<(), BotError> {
        let language = session.language;
        let Ok(event_id) = raw_id.parse::<i64>() else {
            let text = language.pick("Неверный ID мероприятия.", "Invalid event ID.");
            return self.reply(session, OutgoingMessage::text(text)).await;
        };
        let Some(user_id) = session.backend_user_id() else {
            return self.reply(session, login_required(language)).await;
        };

        let text = match self.ctx.backend.cancel_rsvp(event_id, user_id).await {
            Ok(()) => language.pick("Регистрация отменена.", "Registration cancelled successfully!"),
            Err(err) => {
                error!(error = %err, %event_id, "Cancel RSVP failed");
                language.pick(
                    "Не удалось отменить регистрацию. Попробуйте позже.",
                    "Cancellation failed, please try later.",
                )
            }
        };
        self.reply(session, OutgoingMessage::text(text)).await
    }

    /// `schedule:<YYYY-MM-DD>` or `schedule:all`
    pub(crate) async fn handle_schedule_day(&self, session: &mut Session, day: &str) -> Result<(), BotError> {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return self.reply(session, login_required(language)).await;
        };

        let mut items = match self.ctx.backend.get_schedule(user_id).await {
            Ok(items) => items,
            Err(err) => {
                error!(error = %err, "Schedule lookup failed");
                let text = language.pick("Произошла ошибка. Попробуйте позже.", "Something went wrong, please try later.");
                return self.reply(session, OutgoingMessage::text(text)).await;
            }
        };
        if day != "all" {
            items.retain(|item| {
                item.start_time
                    .is_some_and(|start| start.format("%Y-%m-%d").to_string() == day)
            });
        }
        items.sort_by_key(|item| item.start_time);

        if items.is_empty() {
            let text = language.pick("В этот день занятий нет.", "No sessions on this day.");
            return self.reply(session, OutgoingMessage::text(text)).await;
        }

        let mut text = language.pick("Расписание:", "Schedule:").to_string();
        for item in &items {
            let format = if day == "all" { "%a %d %b %H:%M" } else { "%H:%M" };
            text.push_str(&format!(
                "\n• {}–{} {} {}",
                format_time(item.start_time, format),
                format_time(item.end_time, "%H:%M"),
                item.code,
                item.title
            ));
            if !item.location.is_empty() {
                text.push_str(&format!(" ({})", item.location));
            }
        }
        self.reply(session, OutgoingMessage::text(text)).await
    }

    /// `visa_type:<type>`: open a new visa application
    pub(crate) async fn handle_visa_type(&self, session: &mut Session, kind: &str) -> Result<(), BotError> {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return self.reply(session, login_required(language)).await;
        };

        let text = match self.ctx.backend.create_visa_application(user_id, kind).await {
            Ok(id) => match language {
                Language::Ru => format!("Заявка #{id} создана. Статус можно проверить в разделе виз."),
                Language::En => format!("Application #{id} created. Track it under visa status."),
            },
            Err(err) => {
                error!(error = %err, %kind, "Visa application failed");
                language
                    .pick("Не удалось создать заявку. Попробуйте позже.", "Could not create the application, please try later.")
                    .to_string()
            }
        };
        self.reply(session, OutgoingMessage::text(text)).await
    }

    /// `visa_app:<id>`: show an application's documents and a withdraw button
    pub(crate) async fn handle_visa_application(&self, session: &mut Session, raw_id: &str) -> Result<(), BotError> {
        let language = session.language;
        let Ok(application_id) = raw_id.parse::<i64>() else {
            let text = language.pick("Неверный ID заявки.", "Invalid application ID.");
            return self.reply(session, OutgoingMessage::text(text)).await;
        };
        if let Some(refusal) = self.visa_access(session, application_id).await {
            return self.reply(session, refusal).await;
        }

        let documents = match self.ctx.backend.list_visa_documents(application_id).await {
            Ok(documents) => documents,
            Err(err) => {
                error!(error = %err, %application_id, "Visa documents lookup failed");
                let text = language.pick("Произошла ошибка. Попробуйте позже.", "Something went wrong, please try later.");
                return self.reply(session, OutgoingMessage::text(text)).await;
            }
        };

        let mut text = match language {
            Language::Ru => format!("Заявка #{application_id}"),
            Language::En => format!("Application #{application_id}"),
        };
        if documents.is_empty() {
            text.push('\n');
            text.push_str(language.pick("Документы не загружены.", "No documents uploaded."));
        } else {
            text.push('\n');
            text.push_str(language.pick("Документы:", "Documents:"));
            for doc in &documents {
                text.push_str(&format!("\n• {} ({})", doc.file_name, doc.status));
            }
        }
        let keyboard = Keyboard::new().row(vec![
            Button::callback(
                language.pick("🗑 Отозвать заявку", "🗑 Withdraw application"),
                format!("{VISA_WITHDRAW_PREFIX}{application_id}"),
            )
            .with_style(ButtonStyle::Danger),
        ]);
        self.reply(session, OutgoingMessage::text(text).with_keyboard(keyboard))
            .await
    }

    /// `visa_withdraw:<id>`
    pub(crate) async fn handle_visa_withdraw(&self, session: &mut Session, raw_id: &str) -> Result<(), BotError> {
        let language = session.language;
        let Ok(application_id) = raw_id.parse::<i64>() else {
            let text = language.pick("Неверный ID заявки.", "Invalid application ID.");
            return self.reply(session, OutgoingMessage::text(text)).await;
        };
        if let Some(refusal) = self.visa_access(session, application_id).await {
            return self.reply(session, refusal).await;
        }

        let text = match self.ctx.backend.withdraw_visa_application(application_id).await {
            Ok(()) => language.pick("Заявка отозвана.", "Application withdrawn."),
            Err(err) => {
                error!(error = %err, %application_id, "Visa withdrawal failed");
                language.pick("Не удалось отозвать заявку.", "Could not withdraw the application.")
            }
        };
        self.reply(session, OutgoingMessage::text(text)).await
    }

    /// Refusal to send when the session does not own `application_id`
    async fn visa_access(&self, session: &Session, application_id: i64) -> Option<OutgoingMessage> {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Some(login_required(language));
        };
        match self.ctx.backend.list_visa_applications(user_id).await {
            Ok(applications) if applications.iter().any(|a| a.id == application_id) => None,
            Ok(_) => {
                debug!(%user_id, %application_id, "visa_access: application not owned");
                Some(OutgoingMessage::text(
                    language.pick("Заявка не найдена.", "Application not found."),
                ))
            }
            Err(err) => {
                error!(error = %err, %user_id, "Visa applications lookup failed");
                Some(OutgoingMessage::text(
                    language.pick("Произошла ошибка. Попробуйте позже.", "Something went wrong, please try later."),
                ))
            }
        }
    }
}
