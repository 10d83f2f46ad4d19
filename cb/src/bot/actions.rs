//! Action handlers
//!
//! Leaves of the menu trees that are not forms resolve to an
//! [`ActionHandler`] in the [`ActionTable`]. Most handlers are fixed
//! bilingual copy; the rest read from the backend and format a short list.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::backend::{Backend, BackendError};
use crate::config::ContactsConfig;
use crate::domain::{ActionId, Button, ButtonStyle, Keyboard, Language, OutgoingMessage, Session, format_time};

use super::{CANCEL_EVENT_PREFIX, EVENT_SELECT_PREFIX, SCHEDULE_PREFIX, VISA_APP_PREFIX, VISA_TYPE_PREFIX};

/// What handlers and form submissions may reach
#[derive(Clone)]
pub struct ActionContext {
    pub backend: Arc<dyn Backend>,
    pub contacts: ContactsConfig,
}

pub type HandlerResult = Result<OutgoingMessage, BackendError>;

/// Produces the reply for one menu action
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, ctx: &ActionContext, session: &mut Session) -> HandlerResult;
}

/// Fixed reply in both languages
pub struct StaticReply {
    ru: &'static str,
    en: &'static str,
    markdown: bool,
}

#[async_trait]
impl ActionHandler for StaticReply {
    async fn handle(&self, _ctx: &ActionContext, session: &mut Session) -> HandlerResult {
        let text = session.language.pick(self.ru, self.en);
        Ok(if self.markdown {
            OutgoingMessage::markdown(text)
        } else {
            OutgoingMessage::text(text)
        })
    }
}

pub type HandlerFn = for<'a> fn(&'a ActionContext, &'a mut Session) -> BoxFuture<'a, HandlerResult>;

/// Handler backed by a plain function
pub struct FnHandler(HandlerFn);

#[async_trait]
impl ActionHandler for FnHandler {
    async fn handle(&self, ctx: &ActionContext, session: &mut Session) -> HandlerResult {
        (self.0)(ctx, session).await
    }
}

/// Maps every non-form action to its handler
pub struct ActionTable {
    handlers: HashMap<ActionId, Box<dyn ActionHandler>>,
}

impl ActionTable {
    pub fn builtin() -> Self {
        let mut table = Self {
            handlers: HashMap::new(),
        };

        table.func(ActionId::AdmissionsPrograms, admissions_overview);
        table.func(ActionId::BookOpenDay, open_day_listing);
        table.func(ActionId::BookCampusTour, campus_tour_listing);
        table.func(ActionId::AdmissionsContact, admissions_contact);
        table.markdown(
            ActionId::AdmissionsDocuments,
            "📄 **Необходимые документы для поступления:**\n\n• Копия паспорта\n• Предыдущий диплом + транскрипт\n• Результаты ЕГЭ\n• Мотивационное письмо\n• Фото 3x4 (6 шт.)\n\n⚠️ Загрузите PDF-файлы перед записью на подачу документов.",
            "📄 **Documents required for admission:**\n\n• Passport copy\n• Previous diploma + transcript\n• Unified State Exam results\n• Motivation letter\n• 3x4 photos (6 pcs.)\n\n⚠️ Upload PDF files before booking a submission slot.",
        );
        table.text(
            ActionId::AdmissionsAppointment,
            "📅 Используйте форму записи для выбора даты/времени.\nПриносите оригиналы документов в кампус.\n\n🕐 Доступные слоты: Пн–Пт 10:00-17:00.",
            "📅 Use the booking form to pick a date and time.\nBring original documents to campus.\n\n🕐 Available slots: Mon–Fri 10:00-17:00.",
        );

        table.func(ActionId::ViewSchedule, schedule_day_picker);
        table.func(ActionId::ViewExams, exams);
        table.func(ActionId::ViewGrades, grades);
        table.func(ActionId::ViewDeadlines, deadlines);
        table.text(
            ActionId::TeacherFeedback,
            "Форма отзыва о преподавателе:\n1. Откройте курс в LMS\n2. Поставьте оценку 1-5 ⭐️\n3. Добавьте комментарий (необязательно)\n\nОценки каждую ночь попадают на панель деканата.",
            "Teacher feedback form:\n1. Open course in LMS\n2. Rate 1-5 ⭐️\n3. Add optional comment\n\nWe're syncing ratings nightly to dean's dashboard.",
        );
        table.text(
            ActionId::ElectiveRegistration,
            "Запись на элективы открывается каждый семестр на портале ISU. Каталог → добавить в корзину → подтверждение у куратора.",
            "Elective enrollment opens each semester via ISU portal. Browse catalog → add to cart → confirm by advisor.",
        );

        table.text(
            ActionId::SubmitProject,
            "Чек-лист подачи проекта:\n• Название и краткое описание\n• Состав команды\n• Нужные навыки\nОтправьте детали куратору или в центр инноваций. Форма появится в следующем обновлении.",
            "Project submission checklist:\n• Title & summary\n• Team composition\n• Skills needed\nSend details via advisor or innovation centre. We'll add a form in the next update.",
        );
        table.text(
            ActionId::BuildTeam,
            "Управление командой: входящие заявки в LMS > Проекты. Одобряйте участников, назначайте роли и публикуйте потребности в чате.",
            "Team management: review incoming requests in LMS > Projects. Approve members, assign roles and publish needs in the chat.",
        );
        table.text(
            ActionId::BrowseProjects,
            "Активные проекты:\n1. AI Campus Guide – нужен ML-инженер.\n2. Green Dorms – нужен UX/UI-дизайнер.\n3. Smart Attendance – нужен backend-разработчик на Go.\nКоординаторы доступны через поддержку.",
            "Sample active projects:\n1. AI Campus Guide – looking for ML engineer.\n2. Green Dorms – needs UX/UI designer.\n3. Smart Attendance – needs backend Go dev.\nUse /support to reach coordinators.",
        );
        table.text(
            ActionId::MyProjects,
            "Личные панели проектов скоро появятся. Пока отслеживайте задачи на доске Notion от руководителя.",
            "We'll sync personal project dashboards soon. Meanwhile, track tasks in Notion board shared by your supervisor.",
        );

        table.text(
            ActionId::CareerConsultation,
            "Центр карьеры работает Пн–Чт. Выберите тему (резюме, собеседование, поиск работы) и запишитесь через поддержку → консультация.",
            "Career Center works Mon–Thu. Choose topic (CV, interview, job search) and book via /support → consultation.",
        );
        table.text(
            ActionId::BrowseJobs,
            "Актуальные вакансии:\n• Стажёр-аналитик данных — FinTech Lab — до 25 ноября.\n• Ассистент продакт-менеджера — Innovation Hub.\n• QA-инженер — компания-партнёр.\nОткликайтесь через карьерный портал.",
            "Featured roles:\n• Data Analyst Intern — FinTech Lab — apply before 25 Nov.\n• Product Manager Assistant — Innovation Hub.\n• QA Engineer — Partner company.\nUse Apply button in career portal.",
        );
        table.text(
            ActionId::ApplyJob,
            "Для отклика приложите резюме, мотивационное письмо и ID вакансии. HR отвечает в течение 5 дней.",
            "To apply, attach CV + motivation letter and reference job ID. HR responds within 5 days.",
        );
        table.text(
            ActionId::MyApplications,
            "Ваши отклики:\n• Стажёр-аналитик данных — назначено собеседование.\n• Ассистент продакт-менеджера — на рассмотрении.\nОбновления в реальном времени скоро появятся.",
            "Application tracker:\n• Data Analyst Intern — Interview scheduled.\n• Product Manager Assistant — Under review.\nWe'll add live updates soon.",
        );

        table.text(
            ActionId::DeanCertificates,
            "Справки выдаются за 3 рабочих дня. Укажите тип (об обучении, стипендиальная, выписка) в обращении в поддержку.",
            "Certificate desk issues documents in 3 working days. Use /support to specify type (enrollment, scholarship, transcript).",
        );
        table.func(ActionId::DeanTuition, dean_tuition);
        table.text(
            ActionId::DeanCompensation,
            "Заявка на компенсацию:\n1. Выберите программу (транспорт, медицина, техника).\n2. Приложите чеки (PDF/JPG до 10 МБ).\n3. Отправьте через поддержку → компенсация.\nФинансовый отдел рассматривает заявку 7 дней.",
            "Compensation request flow:\n1. Choose program (transport, medical, tech purchase).\n2. Attach receipts (PDF/JPG up to 10 MB).\n3. Submit via /support → compensation.\nFinance reviews within 7 days.",
        );
        table.text(
            ActionId::DeanAppointment,
            "Приём в деканате по вторникам и четвергам. Укажите тему (документы, перевод, академический отпуск) и удобное время в обращении.",
            "Dean's office appointments available Tue/Thu. Provide topic (documents, transfer, leave) and preferred time when contacting support.",
        );
        table.text(
            ActionId::DeanApplications,
            "Перевод / академический отпуск:\n• Заполните шаблон заявления\n• Добавьте обоснование\n• Загрузите подтверждающие документы\nОтправьте через поддержку, чтобы запустить процесс.",
            "Transfer / academic leave requests:\n• Fill template form\n• Add justification\n• Upload supporting docs\nSend via /support to initiate workflow.",
        );

        table.func(ActionId::DormPayment, dorm_payment);
        table.text(
            ActionId::DormServices,
            "Доступные услуги: прачечная, уборка, смена белья. Заказ на вахте или через поддержку с указанием комнаты и времени.",
            "Available services: laundry, cleaning, linen exchange. Order via dorm desk or /support specifying room & slot.",
        );
        table.text(
            ActionId::DormGuestPass,
            "Пропуск для гостя:\n1. Отправьте имя гостя, паспорт и время визита через поддержку.\n2. Дежурный подтвердит по SMS.\n3. Заберите пропуск на вахте.",
            "Guest pass steps:\n1. Send guest name + passport + visit hours via /support.\n2. Duty officer confirms by SMS.\n3. Collect printed pass at lobby.",
        );

        table.func(ActionId::EventsCalendar, events_calendar);
        table.func(ActionId::EventsRegister, event_picker);
        table.func(ActionId::EventsMine, my_events);
        table.func(ActionId::LibraryMy, library_loans);

        table.func(ActionId::VisaStatus, visa_status);
        table.func(ActionId::VisaRenewal, visa_type_picker);
        table.text(
            ActionId::VisaAppointment,
            "Запись в визовый центр: Пн–Ср 10:00-13:00. Возьмите паспорт, миграционную карту и справку об обучении.",
            "Visa centre appointments: Mon–Wed 10:00-13:00. Bring your passport, migration card and enrollment certificate.",
        );

        table.func(ActionId::ViewProfile, profile);
        table.func(ActionId::ToggleNotifications, toggle_notifications);

        table.func(ActionId::LeadershipNews, leadership_news);
        table.text(
            ActionId::LeadershipAlerts,
            "Оповещения присылают ежедневную сводку важных упоминаний. Включите уведомления в ⚙️ Настройках, чтобы получать push-обновления.",
            "Alerts deliver daily digest of critical mentions. Enable notifications in ⚙️ Settings to receive push updates.",
        );
        table.func(ActionId::LeadershipEvents, events_calendar);

        table.func(ActionId::BusinessTripsList, business_trips);
        table.func(ActionId::VacationsList, vacations);
        table.func(ActionId::CertificatesList, certificates);
        table.text(
            ActionId::OfficeGuestPass,
            "Гостевые пропуска в главные корпуса оформляются через поддержку минимум за день до визита.",
            "Office guest passes available for HQ buildings. Provide guest details via /support at least 1 day before visit.",
        );
        table.text(
            ActionId::HrAppointment,
            "Приём в HR: Пн–Чт 14:00-17:00. Укажите тему (документы, адаптация, политики) в обращении в поддержку.",
            "HR office bookings: Mon–Thu 14:00-17:00. Specify topic (documents, onboarding, policies) when opening a support ticket.",
        );

        table
    }

    fn text(&mut self, action: ActionId, ru: &'static str, en: &'static str) {
        self.insert(action, Box::new(StaticReply { ru, en, markdown: false }));
    }

    fn markdown(&mut self, action: ActionId, ru: &'static str, en: &'static str) {
        self.insert(action, Box::new(StaticReply { ru, en, markdown: true }));
    }

    fn func(&mut self, action: ActionId, handler: HandlerFn) {
        self.insert(action, Box::new(FnHandler(handler)));
    }

    fn insert(&mut self, action: ActionId, handler: Box<dyn ActionHandler>) {
        debug!(%action, "ActionTable::insert: called");
        self.handlers.insert(action, handler);
    }

    pub fn get(&self, action: ActionId) -> Option<&dyn ActionHandler> {
        self.handlers.get(&action).map(|handler| handler.as_ref())
    }

    pub fn contains(&self, action: ActionId) -> bool {
        self.handlers.contains_key(&action)
    }
}

/// Reply for handlers that need a backend user id
pub(crate) fn login_required(language: Language) -> OutgoingMessage {
    OutgoingMessage::text(language.pick("Нужна авторизация.", "Please login first."))
}

fn bulleted(header: &str, lines: impl IntoIterator<Item = String>) -> OutgoingMessage {
    let mut text = header.to_string();
    for line in lines {
        text.push_str("\n• ");
        text.push_str(&line);
    }
    OutgoingMessage::text(text)
}

fn admissions_overview<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let programs = ctx.backend.list_admission_programs().await?;
        let mut events = ctx.backend.list_admission_events().await?;
        events.sort_by_key(|event| event.date_time);

        let language = session.language;
        let mut text = language.pick("Программы:", "Programs:").to_string();
        for program in programs.iter().take(5) {
            let line = match language {
                Language::Ru => format!(
                    "\n• {} ({}) — {} г., стоимость {}₽",
                    program.title, program.faculty, program.duration_years, program.tuition
                ),
                Language::En => format!(
                    "\n• {} ({}) — {} years, tuition {}₽",
                    program.title, program.faculty, program.duration_years, program.tuition
                ),
            };
            text.push_str(&line);
        }
        text.push_str("\n\n");
        text.push_str(language.pick("Ближайшие мероприятия:", "Upcoming events:"));
        for event in events.iter().take(5) {
            text.push_str(&format!(
                "\n• {} — {} ({})",
                event.title,
                format_time(event.date_time, "%d %b %H:%M"),
                event.location
            ));
        }
        Ok(OutgoingMessage::text(text))
    })
}

/// Admission events of one type with remaining capacity
async fn admission_listing(ctx: &ActionContext, session: &Session, event_type: &str, title: &str) -> HandlerResult {
    let language = session.language;
    let events = match ctx.backend.list_admission_events().await {
        Ok(events) => events,
        Err(err) => {
            debug!(error = %err, "admission_listing: backend unavailable");
            return Ok(OutgoingMessage::text(language.pick(
                "Не удалось загрузить мероприятия, попробуйте позже.",
                "Unable to load events, please try later.",
            )));
        }
    };

    let needle = event_type.to_lowercase();
    let lines: Vec<String> = events
        .iter()
        .filter(|event| event.event_type.to_lowercase().contains(&needle))
        .map(|event| {
            let capacity = if event.max_attendees <= 0 {
                String::new()
            } else if event.max_attendees - event.current_attendees <= 0 {
                " [ПОЛНОСТЬЮ ЗАБРОНИРОВАНО / FULLY BOOKED]".to_string()
            } else {
                format!(
                    " [Свободно мест / Available: {}/{}]",
                    event.max_attendees - event.current_attendees,
                    event.max_attendees
                )
            };
            format!(
                "• ID {}: {} — {} — {}{}",
                event.id,
                event.title,
                format_time(event.date_time, "%d %b %H:%M"),
                event.location,
                capacity
            )
        })
        .collect();

    let mut text = format!("{title}:");
    if lines.is_empty() {
        text.push('\n');
        text.push_str(language.pick(
            "Слоты скоро будут опубликованы. Следите за новостями!",
            "Slots will be published soon. Stay tuned!",
        ));
    } else {
        text.push('\n');
        text.push_str(&lines.join("\n"));
        text.push_str("\n\n");
        text.push_str(language.pick(
            "Для записи используйте меню 'Поступление' → 'Забронировать место'.",
            "To book, use 'Admission' menu → 'Book event seat'.",
        ));
    }
    Ok(OutgoingMessage::text(text))
}

fn open_day_listing<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let title = session.language.pick("📅 День открытых дверей", "📅 Open Day");
        admission_listing(ctx, session, "open_day", title).await
    })
}

fn campus_tour_listing<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let title = session.language.pick("🏛️ Экскурсия по кампусу", "🏛️ Campus tour");
        admission_listing(ctx, session, "campus_tour", title).await
    })
}

fn admissions_contact<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let c = &ctx.contacts;
        let text = match session.language {
            Language::Ru => format!(
                "📞 **Приёмная комиссия**\n\n📧 Email: {}\n📱 Телефон: {}\n🏢 Офис: {}",
                c.admissions_email, c.admissions_phone, c.admissions_office
            ),
            Language::En => format!(
                "📞 **Admissions office**\n\n📧 Email: {}\n📱 Phone: {}\n🏢 Office: {}",
                c.admissions_email, c.admissions_phone, c.admissions_office
            ),
        };
        Ok(OutgoingMessage::markdown(text))
    })
}

fn schedule_day_picker<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let items = ctx.backend.get_schedule(user_id).await?;

        let days: BTreeMap<String, String> = items
            .iter()
            .filter_map(|item| item.start_time)
            .map(|start| (start.format("%Y-%m-%d").to_string(), start.format("%a %d %b").to_string()))
            .collect();
        if days.is_empty() {
            return Ok(OutgoingMessage::text(language.pick(
                "Расписание занятий отсутствует на этой неделе.",
                "No sessions scheduled this week.",
            )));
        }

        let mut keyboard = Keyboard::new();
        for (date, label) in days {
            keyboard.push_row(vec![Button::callback(label, format!("{SCHEDULE_PREFIX}{date}"))]);
        }
        keyboard.push_row(vec![
            Button::callback(language.pick("Все", "All"), format!("{SCHEDULE_PREFIX}all"))
                .with_style(ButtonStyle::Secondary),
        ]);
        let text = language.pick("Выберите день для просмотра расписания:", "Select a day to view schedule:");
        Ok(OutgoingMessage::text(text).with_keyboard(keyboard))
    })
}

fn exams<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let items = ctx.backend.get_exams(user_id).await?;
        if items.is_empty() {
            return Ok(OutgoingMessage::text(language.pick("Экзамены не запланированы.", "No exams scheduled.")));
        }
        Ok(bulleted(
            language.pick("Ближайшие экзамены:", "Upcoming exams:"),
            items
                .iter()
                .map(|exam| format!("{} — {} ({})", format_time(exam.date, "%d %b %H:%M"), exam.title, exam.room)),
        ))
    })
}

fn grades<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let items = ctx.backend.get_grades(user_id).await?;
        if items.is_empty() {
            return Ok(OutgoingMessage::text(language.pick("Оценок пока нет.", "No grades yet.")));
        }
        Ok(bulleted(
            language.pick("Последние оценки:", "Recent grades:"),
            items
                .iter()
                .take(6)
                .map(|grade| format!("{} — {} (GPA {:.2})", grade.title, grade.grade, grade.gpa_points)),
        ))
    })
}

fn deadlines<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let items = ctx.backend.get_deadlines(user_id).await?;
        if items.is_empty() {
            return Ok(OutgoingMessage::text(language.pick("Активных дедлайнов нет.", "No active deadlines.")));
        }
        Ok(bulleted(
            language.pick("Дедлайны:", "Deadlines:"),
            items
                .iter()
                .map(|d| format!("{} — {} ({})", format_time(d.due_date, "%d %b"), d.title, d.status)),
        ))
    })
}

fn dean_tuition<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let url = &ctx.contacts.tuition_payment_url;
        let text = match session.language {
            Language::Ru => format!("Баланс и платежи доступны на студенческом портале.\nОплата онлайн: {url}"),
            Language::En => format!("Balance & payments available in student portal.\nOnline payment link: {url}"),
        };
        let keyboard = Keyboard::new().row(vec![Button::link(session.language.pick("💳 Оплатить", "💳 Pay"), url)]);
        Ok(OutgoingMessage::text(text).with_keyboard(keyboard))
    })
}

fn dorm_payment<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let room = ctx.backend.get_dorm_room(user_id).await?;
        let url = &ctx.contacts.dorm_payment_url;
        let text = match language {
            Language::Ru => format!(
                "Комната: {} ({})\nБаланс: {:.2}₽\nОплата онлайн: {url}",
                room.room, room.building, room.balance
            ),
            Language::En => format!(
                "Dorm room: {} ({})\nBalance: {:.2}₽\nOnline payment: {url}",
                room.room, room.building, room.balance
            ),
        };
        Ok(OutgoingMessage::text(text))
    })
}

fn events_calendar<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let mut events = ctx.backend.list_events().await?;
        if events.is_empty() {
            return Ok(OutgoingMessage::text(
                language.pick("Мероприятий пока нет.", "No events planned right now."),
            ));
        }
        events.sort_by_key(|event| event.date_time);
        Ok(bulleted(
            language.pick("Ближайшие мероприятия:", "Upcoming events:"),
            events.iter().take(6).map(|event| {
                format!(
                    "{}{} — {} @ {}",
                    event.title,
                    event.capacity_suffix(),
                    format_time(event.date_time, "%d %b %H:%M"),
                    event.location
                )
            }),
        ))
    })
}

fn event_picker<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        if session.backend_user_id().is_none() {
            return Ok(login_required(language));
        }
        let mut events = ctx.backend.list_events().await?;
        if events.is_empty() {
            return Ok(OutgoingMessage::text(language.pick(
                "Нет мероприятий для регистрации.",
                "No events available for registration.",
            )));
        }
        events.sort_by_key(|event| event.date_time);

        let mut keyboard = Keyboard::new();
        for event in &events {
            let label = format!(
                "{}{} — {} @ {}",
                event.title,
                event.capacity_suffix(),
                format_time(event.date_time, "%d %b %H:%M"),
                event.location
            );
            keyboard.push_row(vec![Button::callback(label, format!("{EVENT_SELECT_PREFIX}{}", event.id))]);
        }
        let text = language.pick("Выберите мероприятие для регистрации:", "Select an event to register:");
        Ok(OutgoingMessage::text(text).with_keyboard(keyboard))
    })
}

fn my_events<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let events = ctx.backend.list_user_events(user_id).await?;
        if events.is_empty() {
            return Ok(OutgoingMessage::text(language.pick(
                "У вас нет активных регистраций.",
                "You have no active registrations.",
            )));
        }

        let mut keyboard = Keyboard::new();
        for event in &events {
            let mode = if event.user_registration_type.is_empty() {
                "attendee"
            } else {
                event.user_registration_type.as_str()
            };
            let label = format!(
                "❌ {} — {} ({mode})",
                event.title,
                format_time(event.date_time, "%d %b %H:%M")
            );
            keyboard.push_row(vec![
                Button::callback(label, format!("{CANCEL_EVENT_PREFIX}{}", event.id)).with_style(ButtonStyle::Secondary),
            ]);
        }
        let text = language.pick(
            "Ваши регистрации (нажмите, чтобы отменить):",
            "Your registrations (click to cancel):",
        );
        Ok(OutgoingMessage::text(text).with_keyboard(keyboard))
    })
}

fn library_loans<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let items = ctx.backend.list_borrowed_books(user_id).await?;
        let keyboard = Keyboard::new().row(vec![Button::link(
            language.pick("📖 Электронная библиотека", "📖 E-library"),
            &ctx.contacts.e_library_url,
        )]);
        if items.is_empty() {
            let text = language.pick("У вас нет взятых книг.", "You have no borrowed books.");
            return Ok(OutgoingMessage::text(text).with_keyboard(keyboard));
        }
        let due = language.pick("вернуть до", "due");
        let message = bulleted(
            language.pick("Взятые книги:", "Borrowed books:"),
            items
                .iter()
                .map(|loan| format!("{} — {due} {} ({})", loan.title, format_time(loan.due_at, "%d %b"), loan.status)),
        );
        Ok(message.with_keyboard(keyboard))
    })
}

fn visa_status<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let applications = ctx.backend.list_visa_applications(user_id).await?;
        if applications.is_empty() {
            return Ok(OutgoingMessage::text(
                language.pick("У вас нет заявок на визу.", "You have no visa applications."),
            ));
        }
        let mut keyboard = Keyboard::new();
        for app in &applications {
            let label = format!("{} ({})", app.application_type, app.status);
            keyboard.push_row(vec![Button::callback(label, format!("{VISA_APP_PREFIX}{}", app.id))]);
        }
        let text = language.pick("Выберите заявку:", "Select an application:");
        Ok(OutgoingMessage::text(text).with_keyboard(keyboard))
    })
}

fn visa_type_picker<'a>(_ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let keyboard = Keyboard::new().row(vec![
            Button::callback(
                language.pick("Продление визы", "Visa renewal"),
                format!("{VISA_TYPE_PREFIX}visa_renewal"),
            ),
            Button::callback(
                language.pick("Продление регистрации", "Registration renewal"),
                format!("{VISA_TYPE_PREFIX}registration_renewal"),
            ),
        ]);
        let text = language.pick("Выберите тип заявки:", "Choose application type:");
        Ok(OutgoingMessage::text(text).with_keyboard(keyboard))
    })
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() { "—" } else { value }
}

fn profile<'a>(_ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(p) = session.profile() else {
            return Ok(OutgoingMessage::text(language.pick(
                "👤 Гостевая сессия. Используйте /start для авторизации.",
                "👤 Guest session. Use /start to log in.",
            )));
        };
        let text = match language {
            Language::Ru => format!(
                "👤 **Профиль пользователя**\n\n📝 Имя (RU): {}\n📝 Имя (EN): {}\n📧 Email: {}\n🏷️ Роль: {}\n🏫 Факультет: {}\n🏠 Общежитие: {}",
                or_dash(&p.full_name_ru),
                or_dash(&p.full_name_en),
                p.email,
                p.role(),
                or_dash(&p.faculty),
                or_dash(&p.dorm_room)
            ),
            Language::En => format!(
                "👤 **User profile**\n\n📝 Name (RU): {}\n📝 Name (EN): {}\n📧 Email: {}\n🏷️ Role: {}\n🏫 Faculty: {}\n🏠 Dormitory: {}",
                or_dash(&p.full_name_ru),
                or_dash(&p.full_name_en),
                p.email,
                p.role(),
                or_dash(&p.faculty),
                or_dash(&p.dorm_room)
            ),
        };
        Ok(OutgoingMessage::markdown(text))
    })
}

fn toggle_notifications<'a>(_ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        session.notifications_enabled = !session.notifications_enabled;
        let text = if session.notifications_enabled {
            session.language.pick("🔔 Уведомления включены!", "🔔 Notifications enabled!")
        } else {
            session.language.pick("🔕 Уведомления отключены.", "🔕 Notifications disabled.")
        };
        Ok(OutgoingMessage::text(text))
    })
}

fn leadership_news<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let items = ctx.backend.list_news().await?;
        if items.is_empty() {
            return Ok(OutgoingMessage::text(
                language.pick("Лента новостей пока пуста.", "News feed is empty for now."),
            ));
        }
        Ok(bulleted(
            language.pick("Последние упоминания:", "Latest mentions:"),
            items
                .iter()
                .take(5)
                .map(|item| format!("{} — {}", item.title, format_time(item.published_at, "%d %b"))),
        ))
    })
}

fn business_trips<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let items = ctx.backend.get_business_trips(user_id).await?;
        if items.is_empty() {
            return Ok(OutgoingMessage::text(
                language.pick("Заявок на командировки пока нет.", "No trip requests yet."),
            ));
        }
        Ok(bulleted(
            language.pick("Командировки:", "Trip requests:"),
            items.iter().map(|trip| {
                format!(
                    "{} — {} → {} ({})",
                    trip.purpose,
                    format_time(trip.start_date, "%d %b"),
                    format_time(trip.end_date, "%d %b"),
                    trip.status.to_uppercase()
                )
            }),
        ))
    })
}

fn vacations<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let items = ctx.backend.get_vacations(user_id).await?;
        if items.is_empty() {
            return Ok(OutgoingMessage::text(
                language.pick("Заявок на отпуск пока нет.", "No vacation requests yet."),
            ));
        }
        Ok(bulleted(
            language.pick("Отпуска:", "Vacation requests:"),
            items.iter().map(|v| {
                format!(
                    "{} → {} ({})",
                    format_time(v.start_date, "%d %b"),
                    format_time(v.end_date, "%d %b"),
                    v.status.to_uppercase()
                )
            }),
        ))
    })
}

fn certificates<'a>(ctx: &'a ActionContext, session: &'a mut Session) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let language = session.language;
        let Some(user_id) = session.backend_user_id() else {
            return Ok(login_required(language));
        };
        let items = ctx.backend.get_certificates(user_id).await?;
        if items.is_empty() {
            return Ok(OutgoingMessage::text(
                language.pick("Запросов справок пока нет.", "No certificate requests yet."),
            ));
        }
        Ok(bulleted(
            language.pick("Справки:", "Certificates:"),
            items
                .iter()
                .map(|c| format!("{} — {}", c.certificate_type, c.status.to_uppercase())),
        ))
    })
}
