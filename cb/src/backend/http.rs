//! HTTP implementation of the backend over reqwest

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::domain::{
    AdmissionEvent, AdmissionEventBooking, AdmissionProgram, BusinessTrip, Club, Course, Deadline, DormRoom, Event,
    ExamEntry, GradeRecord, HrLetter, LibraryBook, LibraryLoan, NewsItem, QuizQuestion, ScheduleEntry, UserProfile,
    VacationRequest, VisaApplication, VisaDocument,
};

use super::{Backend, BackendError, BackendResult};

const DEFAULT_BASE_URL: &str = "http://localhost:8001";

/// JSON-over-HTTP client for the `/api/v1` backend
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: String,
    http: Client,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        debug!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "HttpBackend::new: called");
        let trimmed = config.base_url.trim().trim_end_matches('/');
        let base_url = if trimmed.is_empty() { DEFAULT_BASE_URL } else { trimmed }.to_string();
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> BackendResult<String> {
        debug!(%method, %path, "request: called");
        let mut builder = self.http.request(method.clone(), format!("{}{}", self.base_url, path));
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = &body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            debug!(%method, %path, status = status.as_u16(), "request: non-success status");
            return Err(BackendError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        debug!(%path, bytes = text.len(), "request: success");
        Ok(text)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> BackendResult<T> {
        let text = self.request(Method::GET, path, query, None).await?;
        decode(path, &text)
    }

    /// GET a JSON array; `null` decodes as empty
    async fn get_list<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> BackendResult<Vec<T>> {
        let items: Option<Vec<T>> = self.get(path, query).await?;
        Ok(items.unwrap_or_default())
    }

    /// POST a JSON body and extract one field of the JSON response
    async fn post_field<T: DeserializeOwned>(&self, path: &str, body: Value, field: &str) -> BackendResult<T> {
        let text = self.request(Method::POST, path, &[], Some(body)).await?;
        let value: Value = decode(path, &text)?;
        take_field(path, value, field)
    }

    /// POST where the response body is irrelevant
    async fn post_unit(&self, path: &str, body: Option<Value>) -> BackendResult<()> {
        self.request(Method::POST, path, &[], body).await.map(|_| ())
    }
}

fn decode<T: DeserializeOwned>(path: &str, text: &str) -> BackendResult<T> {
    serde_json::from_str(text).map_err(|source| BackendError::Decode {
        path: path.to_string(),
        source,
    })
}

fn take_field<T: DeserializeOwned>(path: &str, mut value: Value, field: &str) -> BackendResult<T> {
    let raw = value.get_mut(field).map(Value::take).unwrap_or(Value::Null);
    serde_json::from_value(raw).map_err(|source| BackendError::Decode {
        path: format!("{path}#{field}"),
        source,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn get_user_by_email(&self, email: &str) -> BackendResult<Option<UserProfile>> {
        debug!(%email, "get_user_by_email: called");
        match self
            .get::<UserProfile>("/api/v1/users/by-email", &[("email", email.to_string())])
            .await
        {
            Ok(profile) => Ok(Some(profile)),
            Err(e) if e.is_not_found() => {
                debug!(%email, "get_user_by_email: not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn get_schedule(&self, user_id: i64) -> BackendResult<Vec<ScheduleEntry>> {
        self.get_list(&format!("/api/v1/schedule/{user_id}"), &[]).await
    }

    async fn get_courses(&self, user_id: i64) -> BackendResult<Vec<Course>> {
        self.get_list(&format!("/api/v1/courses/{user_id}"), &[]).await
    }

    async fn get_exams(&self, user_id: i64) -> BackendResult<Vec<ExamEntry>> {
        self.get_list(&format!("/api/v1/exams/{user_id}"), &[]).await
    }

    async fn get_grades(&self, user_id: i64) -> BackendResult<Vec<GradeRecord>> {
        self.get_list(&format!("/api/v1/grades/{user_id}"), &[]).await
    }

    async fn get_deadlines(&self, user_id: i64) -> BackendResult<Vec<Deadline>> {
        self.get_list(&format!("/api/v1/deadlines/{user_id}"), &[]).await
    }

    async fn list_events(&self) -> BackendResult<Vec<Event>> {
        self.get_list("/api/v1/events", &[]).await
    }

    async fn list_news(&self) -> BackendResult<Vec<NewsItem>> {
        self.get_list("/api/v1/news", &[]).await
    }

    async fn list_clubs(&self) -> BackendResult<Vec<Club>> {
        self.get_list("/api/v1/clubs", &[]).await
    }

    async fn rsvp_event(
        &self,
        event_id: i64,
        user_id: i64,
        registration_type: &str,
        note: &str,
    ) -> BackendResult<String> {
        debug!(%event_id, %user_id, %registration_type, "rsvp_event: called");
        let body = json!({
            "user_id": user_id,
            "registration_type": registration_type,
            "note": note,
        });
        let status: Option<String> = self
            .post_field(&format!("/api/v1/events/{event_id}/rsvp"), body, "status")
            .await?;
        Ok(status.unwrap_or_default())
    }

    async fn cancel_rsvp(&self, event_id: i64, user_id: i64) -> BackendResult<()> {
        debug!(%event_id, %user_id, "cancel_rsvp: called");
        self.post_unit(
            &format!("/api/v1/events/{event_id}/cancel"),
            Some(json!({ "user_id": user_id })),
        )
        .await
    }

    async fn list_user_events(&self, user_id: i64) -> BackendResult<Vec<Event>> {
        debug!(%user_id, "list_user_events: called");
        match self.get_list(&format!("/api/v1/events/user/{user_id}"), &[]).await {
            Ok(events) => Ok(events),
            Err(e) => {
                warn!(error = %e, %user_id, "User events unavailable, falling back to all events");
                self.list_events().await
            }
        }
    }

    async fn list_admission_programs(&self) -> BackendResult<Vec<AdmissionProgram>> {
        self.get_list("/api/v1/admissions/programs", &[]).await
    }

    async fn list_admission_events(&self) -> BackendResult<Vec<AdmissionEvent>> {
        self.get_list("/api/v1/admissions/events", &[]).await
    }

    async fn book_admission_event(
        &self,
        event_id: i64,
        applicant_name: &str,
        email: &str,
        phone: &str,
        note: &str,
    ) -> BackendResult<i64> {
        debug!(%event_id, %email, "book_admission_event: called");
        let body = json!({
            "applicant_name": applicant_name,
            "email": email,
            "phone": phone,
            "note": note,
        });
        self.post_field(&format!("/api/v1/admissions/events/{event_id}/book"), body, "booking_id")
            .await
    }

    async fn list_admission_event_bookings(&self, event_id: i64) -> BackendResult<Vec<AdmissionEventBooking>> {
        self.get_list(&format!("/api/v1/admissions/events/{event_id}/bookings"), &[])
            .await
    }

    async fn submit_admission_application(
        &self,
        applicant_name: &str,
        email: &str,
        program_id: Option<i64>,
        details: Value,
    ) -> BackendResult<i64> {
        let body = json!({
            "applicant_name": applicant_name,
            "email": email,
            "program_id": program_id,
            "details": details,
        });
        self.post_field("/api/v1/admissions/applications", body, "application_id")
            .await
    }

    async fn upload_admission_document(
        &self,
        application_id: i64,
        file_name: &str,
        file_type: &str,
        storage_url: &str,
    ) -> BackendResult<i64> {
        let body = json!({
            "application_id": application_id,
            "file_name": file_name,
            "file_type": file_type,
            "storage_url": storage_url,
        });
        self.post_field("/api/v1/admissions/upload", body, "document_id").await
    }

    async fn ask_admission_question(&self, question: &str) -> BackendResult<String> {
        self.post_field("/api/v1/admissions/faq/query", json!({ "question": question }), "answer")
            .await
    }

    async fn create_dean_request(&self, user_id: i64, request_type: &str, payload: Value) -> BackendResult<i64> {
        let body = json!({
            "user_id": user_id,
            "request_type": request_type,
            "payload": payload,
        });
        self.post_field("/api/v1/dean/requests", body, "request_id").await
    }

    async fn get_dorm_room(&self, student_id: i64) -> BackendResult<DormRoom> {
        self.get(&format!("/api/v1/dorms/rooms/{student_id}"), &[]).await
    }

    async fn create_dorm_maintenance(
        &self,
        student_id: i64,
        request_type: &str,
        description: &str,
    ) -> BackendResult<i64> {
        let body = json!({
            "student_id": student_id,
            "request_type": request_type,
            "description": description,
        });
        self.post_field("/api/v1/dorms/maintenance", body, "request_id").await
    }

    async fn submit_dorm_payment(&self, student_id: i64, amount: f64, reference: &str) -> BackendResult<i64> {
        let body = json!({
            "student_id": student_id,
            "amount": amount,
            "reference": reference,
        });
        self.post_field("/api/v1/dorms/payments", body, "payment_id").await
    }

    async fn search_books(&self, query: &str) -> BackendResult<Vec<LibraryBook>> {
        self.get_list("/api/v1/library/books/search", &[("q", query.to_string())])
            .await
    }

    async fn reserve_book(&self, book_id: i64, student_id: i64) -> BackendResult<i64> {
        let body = json!({ "book_id": book_id, "student_id": student_id });
        self.post_field("/api/v1/library/books/reserve", body, "reservation_id")
            .await
    }

    async fn list_borrowed_books(&self, student_id: i64) -> BackendResult<Vec<LibraryLoan>> {
        self.get_list(&format!("/api/v1/library/borrowed/{student_id}"), &[]).await
    }

    async fn submit_support_ticket(
        &self,
        category: &str,
        subject: &str,
        description: &str,
        user_id: Option<i64>,
    ) -> BackendResult<i64> {
        let body = json!({
            "user_id": user_id,
            "category": category,
            "subject": subject,
            "description": description,
        });
        self.post_field("/api/v1/support/tickets", body, "ticket_id").await
    }

    async fn submit_support_query(&self, user_id: Option<i64>, question: &str) -> BackendResult<String> {
        let body = json!({ "user_id": user_id, "question": question });
        self.post_field("/api/v1/support/query", body, "answer").await
    }

    async fn advisor_chat(&self, user_id: Option<i64>, topic: &str, prompt: &str) -> BackendResult<String> {
        let body = json!({ "user_id": user_id, "topic": topic, "prompt": prompt });
        self.post_field("/api/v1/ai/chat/advisor", body, "response").await
    }

    async fn run_ai_query(&self, question: &str, filters: Option<Value>) -> BackendResult<String> {
        let body = json!({ "question": question, "filters": filters });
        self.post_field("/api/v1/ai/rag/query", body, "answer").await
    }

    async fn create_ai_summary(&self, text: &str) -> BackendResult<String> {
        self.post_field("/api/v1/ai/summary/create", json!({ "source_text": text }), "summary")
            .await
    }

    async fn generate_ai_quiz(&self, prompt: &str, course_id: Option<i64>) -> BackendResult<Vec<QuizQuestion>> {
        let body = json!({ "prompt": prompt, "course_id": course_id });
        let questions: Option<Vec<QuizQuestion>> =
            self.post_field("/api/v1/ai/quiz/generate", body, "questions").await?;
        Ok(questions.unwrap_or_default())
    }

    async fn transcribe_audio(&self, audio_ref: &str) -> BackendResult<String> {
        self.post_field("/api/v1/ai/audio/transcribe", json!({ "audio_ref": audio_ref }), "transcript")
            .await
    }

    async fn get_vacations(&self, employee_id: i64) -> BackendResult<Vec<VacationRequest>> {
        self.get_list(&format!("/api/v1/hr/vacations/{employee_id}"), &[]).await
    }

    async fn request_vacation(
        &self,
        employee_id: i64,
        start_iso: &str,
        end_iso: &str,
        vacation_type: &str,
    ) -> BackendResult<i64> {
        let body = json!({
            "employee_id": employee_id,
            "vacation_type": vacation_type,
            "start_date": start_iso,
            "end_date": end_iso,
        });
        self.post_field("/api/v1/hr/vacations/request", body, "vacation_request_id")
            .await
    }

    async fn get_business_trips(&self, employee_id: i64) -> BackendResult<Vec<BusinessTrip>> {
        self.get_list(&format!("/api/v1/hr/business_trips/{employee_id}"), &[])
            .await
    }

    async fn request_business_trip(
        &self,
        employee_id: i64,
        destination: &str,
        start_iso: &str,
        end_iso: &str,
        purpose: &str,
    ) -> BackendResult<i64> {
        let body = json!({
            "employee_id": employee_id,
            "destination": destination,
            "start_date": start_iso,
            "end_date": end_iso,
            "purpose": purpose,
        });
        self.post_field("/api/v1/hr/business_trips/request", body, "business_trip_id")
            .await
    }

    async fn get_certificates(&self, employee_id: i64) -> BackendResult<Vec<HrLetter>> {
        self.get_list(&format!("/api/v1/hr/certificates/{employee_id}"), &[]).await
    }

    async fn request_certificate(&self, employee_id: i64, certificate_type: &str) -> BackendResult<i64> {
        let body = json!({ "employee_id": employee_id, "certificate_type": certificate_type });
        self.post_field("/api/v1/hr/certificates/request", body, "certificate_request_id")
            .await
    }

    async fn list_visa_applications(&self, user_id: i64) -> BackendResult<Vec<VisaApplication>> {
        self.get_list(&format!("/api/v1/visa/applications/{user_id}"), &[]).await
    }

    async fn create_visa_application(&self, user_id: i64, application_type: &str) -> BackendResult<i64> {
        let body = json!({ "user_id": user_id, "application_type": application_type });
        self.post_field("/api/v1/visa/applications", body, "application_id").await
    }

    async fn withdraw_visa_application(&self, application_id: i64) -> BackendResult<()> {
        self.post_unit(&format!("/api/v1/visa/applications/{application_id}/withdraw"), None)
            .await
    }

    async fn list_visa_documents(&self, application_id: i64) -> BackendResult<Vec<VisaDocument>> {
        self.get_list(&format!("/api/v1/visa/applications/{application_id}/documents"), &[])
            .await
    }

    async fn upload_visa_document(&self, application_id: i64, file_name: &str, file_url: &str) -> BackendResult<i64> {
        let body = json!({ "file_name": file_name, "file_url": file_url });
        self.post_field(
            &format!("/api/v1/visa/applications/{application_id}/documents"),
            body,
            "document_id",
        )
        .await
    }

    async fn send_notification(&self, subject: &str, body: &str, recipient_id: Option<i64>) -> BackendResult<i64> {
        let payload = json!({ "recipient_id": recipient_id, "subject": subject, "body": body });
        self.post_field("/api/v1/notifications/send", payload, "notification_id")
            .await
    }
}
