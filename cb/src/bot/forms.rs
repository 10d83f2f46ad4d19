//! Form Engine
//!
//! A form is an ordered list of text fields collected one message at a
//! time. When the last field arrives the pending form is cleared and its
//! submit function runs exactly once.

use chrono::NaiveDate;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error};

use crate::backend::BackendError;
use crate::domain::{ActionId, Language, OutgoingMessage, Pending, PendingForm, Session};

use super::actions::ActionContext;
use super::{BotError, Service};

/// Input that skips an optional field
pub const SKIP_INPUT: &str = "-";

pub type FormData = BTreeMap<String, String>;
pub type SubmitResult = Result<OutgoingMessage, BackendError>;
pub type SubmitFn = for<'a> fn(&'a ActionContext, &'a Session, &'a FormData) -> BoxFuture<'a, SubmitResult>;

#[derive(Debug, Clone)]
pub struct FormField {
    pub key: &'static str,
    pub prompt_ru: &'static str,
    pub prompt_en: &'static str,
    pub optional: bool,
}

impl FormField {
    fn required(key: &'static str, prompt_ru: &'static str, prompt_en: &'static str) -> Self {
        Self {
            key,
            prompt_ru,
            prompt_en,
            optional: false,
        }
    }

    fn optional(key: &'static str, prompt_ru: &'static str, prompt_en: &'static str) -> Self {
        Self {
            optional: true,
            ..Self::required(key, prompt_ru, prompt_en)
        }
    }

    pub fn prompt(&self, language: Language) -> &'static str {
        match language {
            Language::En if !self.prompt_en.is_empty() => self.prompt_en,
            _ => self.prompt_ru,
        }
    }
}

pub struct FormDefinition {
    pub intro_ru: &'static str,
    pub intro_en: &'static str,
    pub fields: Vec<FormField>,
    pub submit: SubmitFn,
}

impl FormDefinition {
    pub fn intro(&self, language: Language) -> &'static str {
        match language {
            Language::En if !self.intro_en.is_empty() => self.intro_en,
            _ => self.intro_ru,
        }
    }

    /// Intro followed by the first prompt
    pub fn opening(&self, language: Language) -> String {
        let prompt = self.fields.first().map(|f| f.prompt(language)).unwrap_or("");
        format!("{}\n{}", self.intro(language), prompt).trim().to_string()
    }
}

/// All forms, keyed by the action that starts them
pub struct FormRegistry {
    forms: HashMap<ActionId, FormDefinition>,
}

impl FormRegistry {
    pub fn builtin() -> Self {
        let mut forms = HashMap::new();
        let mut add = |action, intro_ru, intro_en, fields, submit| {
            forms.insert(
                action,
                FormDefinition {
                    intro_ru,
                    intro_en,
                    fields,
                    submit,
                },
            );
        };

        add(
            ActionId::LibrarySearch,
            "Поиск по названию или автору.",
            "Search by title or author.",
            vec![FormField::required("query", "Введите запрос:", "Enter your query:")],
            submit_library_search,
        );
        add(
            ActionId::LibraryReserve,
            "Укажите идентификатор книги для брони.",
            "Provide the book ID to reserve.",
            vec![FormField::required("book_id", "ID книги:", "Book ID:")],
            submit_library_reserve,
        );
        add(
            ActionId::DormMaintenance,
            "Создание заявки на ремонт.",
            "Create a maintenance ticket.",
            vec![
                FormField::required(
                    "type",
                    "Тип проблемы (электрика, сантехника...):",
                    "Issue type (electrical, plumbing...):",
                ),
                FormField::required("details", "Подробности:", "Details:"),
            ],
            submit_dorm_maintenance,
        );
        add(
            ActionId::ContactSupport,
            "Создание обращения в поддержку.",
            "Create a support ticket.",
            vec![
                FormField::required("category", "Категория (it, hr, study...):", "Category (it, hr, study...):"),
                FormField::required("subject", "Тема:", "Subject:"),
                FormField::required("description", "Описание:", "Description:"),
            ],
            submit_support_ticket,
        );
        add(
            ActionId::ReportIssue,
            "Расскажите об ошибке.",
            "Describe the issue.",
            vec![
                FormField::required("subject", "Коротко о проблеме:", "Short summary:"),
                FormField::required("description", "Детали:", "Details:"),
            ],
            submit_bug_report,
        );
        add(
            ActionId::Faq,
            "Задайте вопрос, и мы дадим быстрый ответ.",
            "Ask your question for a quick answer.",
            vec![FormField::required("question", "Ваш вопрос:", "Your question:")],
            submit_faq,
        );
        add(
            ActionId::AiQuery,
            "RAG-поиск по базе знаний.",
            "RAG knowledge base search.",
            vec![FormField::required("question", "Вопрос:", "Question:")],
            submit_ai_query,
        );
        add(
            ActionId::AiSummary,
            "Отправьте текст для краткого конспекта (до 1500 символов).",
            "Paste text to summarize (up to 1500 chars).",
            vec![FormField::required("text", "Текст:", "Text:")],
            submit_ai_summary,
        );
        add(
            ActionId::AiQuiz,
            "Сгенерируем контрольные вопросы.",
            "Generate quick quiz questions.",
            vec![FormField::required("topic", "Тема / курс:", "Topic / course:")],
            submit_ai_quiz,
        );
        add(
            ActionId::AiTranscription,
            "Укажите ссылку или идентификатор аудио.",
            "Provide audio reference or link.",
            vec![FormField::required("audio", "Audio ref:", "Audio ref:")],
            submit_ai_transcription,
        );
        add(
            ActionId::AdvisorChat,
            "Диалог с академическим советником.",
            "Chat with the academic advisor.",
            vec![
                FormField::optional("topic", "Тема:", "Topic:"),
                FormField::required("prompt", "Ваш вопрос:", "Your question:"),
            ],
            submit_advisor_chat,
        );
        add(
            ActionId::BusinessTripRequest,
            "Запрос на командировку.",
            "Business trip request.",
            vec![
                FormField::required("destination", "Направление:", "Destination:"),
                FormField::required("start", "Дата начала (YYYY-MM-DD):", "Start date (YYYY-MM-DD):"),
                FormField::required("end", "Дата окончания (YYYY-MM-DD):", "End date (YYYY-MM-DD):"),
                FormField::required("purpose", "Цель / мероприятие:", "Purpose / conference:"),
            ],
            submit_business_trip,
        );
        add(
            ActionId::VacationRequest,
            "Запрос отпуска.",
            "Vacation request.",
            vec![
                FormField::required("start", "Дата начала (YYYY-MM-DD):", "Start date (YYYY-MM-DD):"),
                FormField::required("end", "Дата окончания (YYYY-MM-DD):", "End date (YYYY-MM-DD):"),
                FormField::required("type", "Тип (paid/unpaid):", "Type (paid/unpaid):"),
            ],
            submit_vacation,
        );
        add(
            ActionId::CertificateRequest,
            "Запрос справки в HR.",
            "Request HR certificate.",
            vec![FormField::required(
                "type",
                "Тип (employment/income/custom):",
                "Type (employment/income/custom):",
            )],
            submit_certificate,
        );
        add(
            ActionId::BookAdmissionEvent,
            "Запись на мероприятие приёмной комиссии (День открытых дверей, Экскурсия по кампусу).",
            "Book your seat for an admission event (Open Day, Campus Tour).",
            vec![
                FormField::required("event_id", "ID мероприятия:", "Event ID:"),
                FormField::required("name", "Ваше имя:", "Your name:"),
                FormField::required("email", "Email:", "Email:"),
                FormField::optional("phone", "Телефон:", "Phone:"),
                FormField::optional("note", "Примечание (опционально):", "Note (optional):"),
            ],
            submit_admission_booking,
        );
        add(
            ActionId::AdmissionQuestion,
            "Задайте вопрос приёмной комиссии.",
            "Ask the admissions office a question.",
            vec![FormField::required("question", "Ваш вопрос:", "Your question:")],
            submit_admission_question,
        );

        Self { forms }
    }

    pub fn get(&self, action: ActionId) -> Option<&FormDefinition> {
        self.forms.get(&action)
    }

    pub fn contains(&self, action: ActionId) -> bool {
        self.forms.contains_key(&action)
    }

    pub fn actions(&self) -> impl Iterator<Item = ActionId> + '_ {
        self.forms.keys().copied()
    }
}

impl Service {
    /// Begin collecting `action`'s form: install it at step 0 and ask the first question
    pub(crate) async fn start_form(&self, session: &mut Session, action: ActionId) -> Result<(), BotError> {
        debug!(chat_id = %session.chat_id, %action, "start_form: called");
        let Some(form) = self.forms.get(action) else {
            debug!(%action, "start_form: no such form");
            return Ok(());
        };
        session.pending = Pending::CollectingForm(PendingForm::new(action, self.clock.now()));
        let text = form.opening(session.language);
        self.reply(session, OutgoingMessage::text(text)).await
    }

    /// Record one answer for the pending form, then ask the next question or submit
    pub(crate) async fn handle_form_input(&self, session: &mut Session, input: &str) -> Result<(), BotError> {
        let Some(pending) = session.form() else {
            return Ok(());
        };
        let (action, step) = (pending.action, pending.step);
        let language = session.language;
        debug!(chat_id = %session.chat_id, %action, %step, "handle_form_input: called");

        let Some(field) = self.forms.get(action).and_then(|form| form.fields.get(step)) else {
            debug!(%action, %step, "handle_form_input: form definition gone");
            session.clear_pending();
            let text = language.pick("Форма недоступна.", "Form is no longer available.");
            return self.reply(session, OutgoingMessage::text(text)).await;
        };

        let input = input.trim();
        let value = if field.optional && (input.is_empty() || input == SKIP_INPUT) {
            ""
        } else if input.is_empty() {
            let text = language.pick("Поле не может быть пустым.", "This field cannot be empty.");
            return self.reply(session, OutgoingMessage::text(text)).await;
        } else {
            input
        };

        if let Some(pending) = session.form_mut() {
            pending.data.insert(field.key.to_string(), value.to_string());
            pending.step += 1;
        }

        let Some(form) = self.forms.get(action) else {
            return Ok(());
        };
        if let Some(next) = form.fields.get(step + 1) {
            return self.reply(session, OutgoingMessage::text(next.prompt(language))).await;
        }

        let data = match std::mem::take(&mut session.pending) {
            Pending::CollectingForm(form) => form.data,
            _ => FormData::new(),
        };
        self.store.save(session.clone()).await?;

        let message = match (form.submit)(&self.ctx, session, &data).await {
            Ok(message) => message,
            Err(err) => {
                error!(error = %err, %action, chat_id = %session.chat_id, "Form submission failed");
                OutgoingMessage::text(language.pick(
                    "Не удалось обработать форму. Попробуйте позже.",
                    "Failed to submit form, please try again later.",
                ))
            }
        };
        self.reply(session, message).await
    }
}

fn field<'a>(data: &'a FormData, key: &str) -> &'a str {
    data.get(key).map(|v| v.trim()).unwrap_or("")
}

fn localized(session: &Session, ru: &str, en: &str) -> OutgoingMessage {
    OutgoingMessage::text(session.language.pick(ru, en))
}

/// Validate a `YYYY-MM-DD` date and return it as RFC 3339 midnight UTC
pub fn normalize_date(input: &str) -> Option<String> {
    let input = input.trim();
    if input.len() != 10 {
        return None;
    }
    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}

fn submit_library_search<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let books = ctx.backend.search_books(field(data, "query")).await?;
        if books.is_empty() {
            return Ok(localized(session, "Ничего не найдено.", "No books found."));
        }
        let mut lines = vec![session.language.pick("Найдено:", "Results:").to_string()];
        lines.extend(
            books
                .iter()
                .take(5)
                .enumerate()
                .map(|(i, book)| format!("{}. {} — {} (ID: {})", i + 1, book.title, book.author, book.id)),
        );
        Ok(OutgoingMessage::text(lines.join("\n")))
    })
}

fn submit_library_reserve<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let Some(user_id) = session.backend_user_id() else {
            return Ok(localized(session, "Сначала войдите в систему.", "Please login first."));
        };
        let Ok(book_id) = field(data, "book_id").parse::<i64>() else {
            return Ok(localized(session, "Неверный формат ID книги.", "Invalid book ID."));
        };
        ctx.backend.reserve_book(book_id, user_id).await?;
        Ok(localized(
            session,
            "Запрос на резерв передан библиотеке.",
            "Reservation submitted to the library.",
        ))
    })
}

fn submit_dorm_maintenance<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let Some(user_id) = session.backend_user_id() else {
            return Ok(localized(session, "Авторизуйтесь как студент.", "Please login as a student."));
        };
        let id = ctx
            .backend
            .create_dorm_maintenance(user_id, field(data, "type"), field(data, "details"))
            .await?;
        Ok(localized(session, &format!("Заявка #{id} создана."), &format!("Request #{id} created.")))
    })
}

fn submit_support_ticket<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let id = ctx
            .backend
            .submit_support_ticket(
                field(data, "category"),
                field(data, "subject"),
                field(data, "description"),
                session.backend_user_id(),
            )
            .await?;
        Ok(localized(
            session,
            &format!("Заявка #{id} зарегистрирована."),
            &format!("Ticket #{id} created."),
        ))
    })
}

fn submit_bug_report<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let id = ctx
            .backend
            .submit_support_ticket(
                "bug",
                field(data, "subject"),
                field(data, "description"),
                session.backend_user_id(),
            )
            .await?;
        Ok(localized(
            session,
            &format!("Спасибо! Тикет #{id} открыт."),
            &format!("Thanks! Ticket #{id} opened."),
        ))
    })
}

fn submit_faq<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let answer = ctx
            .backend
            .submit_support_query(session.backend_user_id(), field(data, "question"))
            .await?;
        Ok(OutgoingMessage::text(answer))
    })
}

fn submit_ai_query<'a>(ctx: &'a ActionContext, _session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let answer = ctx.backend.run_ai_query(field(data, "question"), None).await?;
        Ok(OutgoingMessage::text(answer))
    })
}

fn submit_ai_summary<'a>(ctx: &'a ActionContext, _session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let summary = ctx.backend.create_ai_summary(field(data, "text")).await?;
        Ok(OutgoingMessage::text(summary))
    })
}

fn submit_ai_quiz<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let questions = ctx.backend.generate_ai_quiz(field(data, "topic"), None).await?;
        if questions.is_empty() {
            return Ok(localized(session, "Не удалось построить вопросы.", "Could not generate questions."));
        }
        let mut lines = vec![session.language.pick("Ваш мини-квиз:", "Your mini quiz:").to_string()];
        for (i, question) in questions.iter().take(5).enumerate() {
            lines.push(format!("{}) {}", i + 1, question.question));
            for (letter, option) in ('A'..='Z').zip(&question.options) {
                lines.push(format!("   {letter}) {option}"));
            }
            lines.push(String::new());
        }
        Ok(OutgoingMessage::text(lines.join("\n")))
    })
}

fn submit_ai_transcription<'a>(ctx: &'a ActionContext, _session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let transcript = ctx.backend.transcribe_audio(field(data, "audio")).await?;
        Ok(OutgoingMessage::text(transcript))
    })
}

fn submit_advisor_chat<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let response = ctx
            .backend
            .advisor_chat(session.backend_user_id(), field(data, "topic"), field(data, "prompt"))
            .await?;
        Ok(OutgoingMessage::text(response))
    })
}

fn submit_business_trip<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let Some(user_id) = session.backend_user_id() else {
            return Ok(localized(session, "Авторизация обязательна.", "Authentication required."));
        };
        let (Some(start), Some(end)) = (normalize_date(field(data, "start")), normalize_date(field(data, "end"))) else {
            return Ok(localized(
                session,
                "Введите дату в формате YYYY-MM-DD.",
                "Use YYYY-MM-DD date format.",
            ));
        };
        let id = ctx
            .backend
            .request_business_trip(user_id, field(data, "destination"), &start, &end, field(data, "purpose"))
            .await?;
        Ok(localized(session, &format!("Заявка #{id} создана."), &format!("Request #{id} submitted.")))
    })
}

fn submit_vacation<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let Some(user_id) = session.backend_user_id() else {
            return Ok(localized(session, "Авторизация обязательна.", "Authentication required."));
        };
        let (Some(start), Some(end)) = (normalize_date(field(data, "start")), normalize_date(field(data, "end"))) else {
            return Ok(localized(session, "Неверный формат даты.", "Invalid date format."));
        };
        let id = ctx
            .backend
            .request_vacation(user_id, &start, &end, field(data, "type"))
            .await?;
        Ok(localized(session, &format!("Заявка #{id} создана."), &format!("Request #{id} submitted.")))
    })
}

fn submit_certificate<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let Some(user_id) = session.backend_user_id() else {
            return Ok(localized(
                session,
                "Авторизуйтесь, чтобы запросить справку.",
                "Login to request a certificate.",
            ));
        };
        let id = ctx.backend.request_certificate(user_id, field(data, "type")).await?;
        Ok(localized(
            session,
            &format!("Запрос #{id} отправлен в HR."),
            &format!("Request #{id} sent to HR."),
        ))
    })
}

fn submit_admission_booking<'a>(ctx: &'a ActionContext, session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let Ok(event_id) = field(data, "event_id").parse::<i64>() else {
            return Ok(localized(session, "Неверный ID мероприятия.", "Invalid event ID."));
        };
        let (name, email) = (field(data, "name"), field(data, "email"));
        if name.is_empty() || email.is_empty() {
            return Ok(localized(session, "Имя и email обязательны.", "Name and email are required."));
        }

        match ctx
            .backend
            .book_admission_event(event_id, name, email, field(data, "phone"), field(data, "note"))
            .await
        {
            Ok(booking_id) => Ok(localized(
                session,
                &format!("✅ Ваше место забронировано! ID брони: {booking_id}\n\nМы отправили подтверждение на {email}"),
                &format!("✅ Your seat is booked! Booking ID: {booking_id}\n\nConfirmation sent to {email}"),
            )),
            Err(err) if err.mentions("fully booked") => Ok(localized(
                session,
                "Мероприятие полностью забронировано.",
                "Event is fully booked.",
            )),
            Err(err) if err.mentions("already booked") => Ok(localized(
                session,
                "Вы уже забронировали это мероприятие.",
                "You have already booked this event.",
            )),
            Err(err) => Err(err),
        }
    })
}

fn submit_admission_question<'a>(ctx: &'a ActionContext, _session: &'a Session, data: &'a FormData) -> BoxFuture<'a, SubmitResult> {
    Box::pin(async move {
        let answer = ctx.backend.ask_admission_question(field(data, "question")).await?;
        Ok(OutgoingMessage::text(answer))
    })
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::backend::mock::MockBackend;
    use crate::domain::Role;
    use serde_json::json;

    async fn fill(h: &Harness, answers: &[&str]) {
        for answer in answers {
            h.text(answer).await;
        }
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2025-03-01").as_deref(), Some("2025-03-01T00:00:00Z"));
        assert_eq!(normalize_date(" 2024-02-29 ").as_deref(), Some("2024-02-29T00:00:00Z"));
        assert!(normalize_date("2025-3-1").is_none());
        assert!(normalize_date("2025-02-30").is_none());
        assert!(normalize_date("01.03.2025").is_none());
        assert!(normalize_date("").is_none());
    }

    #[test]
    fn test_every_form_has_fields() {
        let registry = FormRegistry::builtin();
        assert_eq!(registry.actions().count(), 16);
        for action in registry.actions() {
            let form = registry.get(action).unwrap();
            assert!(!form.fields.is_empty(), "{action} has no fields");
        }
    }

    #[test]
    fn test_opening_joins_intro_and_first_prompt() {
        let registry = FormRegistry::builtin();
        let form = registry.get(ActionId::LibrarySearch).unwrap();
        assert_eq!(form.opening(Language::Ru), "Поиск по названию или автору.\nВведите запрос:");
        assert_eq!(form.opening(Language::En), "Search by title or author.\nEnter your query:");
    }

    #[test]
    fn test_optional_fields() {
        let registry = FormRegistry::builtin();
        let booking = registry.get(ActionId::BookAdmissionEvent).unwrap();
        let optional: Vec<&str> = booking.fields.iter().filter(|f| f.optional).map(|f| f.key).collect();
        assert_eq!(optional, vec!["phone", "note"]);
        assert!(registry.contains(ActionId::AdvisorChat));
        assert!(!registry.contains(ActionId::ViewGrades));
    }

    #[tokio::test]
    async fn test_library_search_submits_query_once() {
        let h = Harness::new(MockBackend::new().with_response(
            "search_books",
            json!([{ "id": 3, "title": "The Rust Book", "author": "Klabnik" }]),
        ));
        h.logged_in(Role::Student, 7).await;

        h.press("act:library_search").await;
        assert_eq!(h.last_text(), "Поиск по названию или автору.\nВведите запрос:");
        h.text("rust book").await;

        assert_eq!(h.backend.call_count("search_books"), 1);
        assert_eq!(h.backend.last_args("search_books").unwrap()["query"], "rust book");
        assert_eq!(h.last_text(), "Найдено:\n1. The Rust Book — Klabnik (ID: 3)");
        assert_eq!(h.session().await.pending, Pending::None);
    }

    #[tokio::test]
    async fn test_required_field_rejects_empty_input() {
        let h = Harness::new(MockBackend::new());
        h.logged_in(Role::Student, 7).await;
        h.press("act:advisor_chat").await;
        h.text("Thesis").await;

        let mut session = h.session().await;
        h.service.handle_form_input(&mut session, "   ").await.unwrap();
        assert_eq!(h.last_text(), "Поле не может быть пустым.");

        let form = h.session().await.form().cloned().unwrap();
        assert_eq!(form.step, 1);
        assert!(!form.data.contains_key("prompt"));
        assert_eq!(h.backend.call_count("advisor_chat"), 0);
    }

    #[tokio::test]
    async fn test_optional_field_accepts_empty_and_skip() {
        let h = Harness::new(MockBackend::new());
        h.logged_in(Role::Student, 7).await;
        h.press("act:advisor_chat").await;

        let mut session = h.session().await;
        h.service.handle_form_input(&mut session, "").await.unwrap();
        assert_eq!(h.last_text(), "Ваш вопрос:");
        let form = h.session().await.form().cloned().unwrap();
        assert_eq!(form.step, 1);
        assert_eq!(form.data.get("topic").map(String::as_str), Some(""));

        h.text("Which electives?").await;
        let args = h.backend.last_args("advisor_chat").unwrap();
        assert_eq!(args["topic"], "");
        assert_eq!(args["prompt"], "Which electives?");

        h.press("act:advisor_chat").await;
        fill(&h, &[SKIP_INPUT, "Again"]).await;
        assert_eq!(h.backend.last_args("advisor_chat").unwrap()["topic"], "");
        assert_eq!(h.backend.call_count("advisor_chat"), 2);
    }

    #[tokio::test]
    async fn test_complete_form_submits_once_and_clears() {
        let h = Harness::new(MockBackend::new().with_response("submit_support_ticket", json!(17)));
        h.logged_in(Role::Student, 7).await;

        h.press("act:contact_support").await;
        fill(&h, &["it", "VPN", "Cannot connect"]).await;

        assert_eq!(h.backend.call_count("submit_support_ticket"), 1);
        assert_eq!(h.last_text(), "Заявка #17 зарегистрирована.");
        assert_eq!(h.session().await.pending, Pending::None);

        h.text("extra").await;
        assert_eq!(h.backend.call_count("submit_support_ticket"), 1);
    }

    #[tokio::test]
    async fn test_failed_submission_clears_form() {
        let h = Harness::new(MockBackend::new().fail("submit_support_ticket", "db down"));
        h.logged_in(Role::Student, 7).await;

        h.press("act:contact_support").await;
        fill(&h, &["it", "VPN", "Cannot connect"]).await;

        assert_eq!(h.backend.call_count("submit_support_ticket"), 1);
        assert_eq!(h.last_text(), "Не удалось обработать форму. Попробуйте позже.");
        assert_eq!(h.session().await.pending, Pending::None);
    }

    #[tokio::test]
    async fn test_admission_booking_conflicts() {
        for (failure, expected) in [
            ("Event is fully booked", "Мероприятие полностью забронировано."),
            ("You have already booked this event", "Вы уже забронировали это мероприятие."),
        ] {
            let h = Harness::new(MockBackend::new().fail("book_admission_event", failure));
            h.guest().await;

            h.press("act:book_admission_event").await;
            fill(&h, &["4", "Anna", "anna@mail.ru", "-", "-"]).await;

            assert_eq!(h.last_text(), expected);
            let args = h.backend.last_args("book_admission_event").unwrap();
            assert_eq!(args["event_id"], 4);
            assert_eq!(args["phone"], "");
            assert_eq!(h.session().await.pending, Pending::None);
        }
    }

    #[tokio::test]
    async fn test_admission_booking_success() {
        let h = Harness::new(MockBackend::new().with_response("book_admission_event", json!(88)));
        h.guest().await;

        h.press("act:book_admission_event").await;
        fill(&h, &["4", "Anna", "anna@mail.ru", "+7 900", "-"]).await;

        assert_eq!(
            h.last_text(),
            "✅ Ваше место забронировано! ID брони: 88\n\nМы отправили подтверждение на anna@mail.ru"
        );
        assert_eq!(h.backend.last_args("book_admission_event").unwrap()["phone"], "+7 900");
    }

    #[tokio::test]
    async fn test_form_without_definition_is_dropped() {
        let h = Harness::new(MockBackend::new());
        h.logged_in(Role::Student, 7).await;
        let mut session = h.session().await;
        session.pending = Pending::CollectingForm(PendingForm::new(ActionId::ViewGrades, h.clock.now()));
        h.put(session).await;

        h.text("anything").await;
        assert_eq!(h.last_text(), "Форма недоступна.");
        assert_eq!(h.session().await.pending, Pending::None);
        assert_eq!(h.backend.call_count("get_grades"), 0);
    }
}
