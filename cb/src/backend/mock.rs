//! Scriptable backend for tests

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{
    AdmissionEvent, AdmissionEventBooking, AdmissionProgram, BusinessTrip, Club, Course, Deadline, DormRoom, Event,
    ExamEntry, GradeRecord, HrLetter, LibraryBook, LibraryLoan, NewsItem, QuizQuestion, ScheduleEntry, UserProfile,
    VacationRequest, VisaApplication, VisaDocument,
};

use super::{Backend, BackendError, BackendResult};

/// Backend double keyed by method name
///
/// Responses are JSON values decoded into the method's return type. Methods
/// without a scripted response return a neutral default. Every call is
/// recorded together with its arguments.
#[derive(Default)]
pub struct MockBackend {
    responses: Mutex<HashMap<&'static str, Value>>,
    failures: Mutex<HashMap<&'static str, String>>,
    calls: Mutex<Vec<(&'static str, Value)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, method: &'static str, value: Value) -> Self {
        self.responses.lock().unwrap().insert(method, value);
        self
    }

    pub fn with_user(self, profile: UserProfile) -> Self {
        let value = serde_json::to_value(profile).unwrap();
        self.with_response("get_user_by_email", value)
    }

    /// Make `method` fail with a 500 carrying `body`
    pub fn fail(self, method: &'static str, body: &str) -> Self {
        self.failures.lock().unwrap().insert(method, body.to_string());
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(|(name, _)| *name).collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(name, _)| *name == method).count()
    }

    /// Arguments of the most recent call to `method`
    pub fn last_args(&self, method: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(name, _)| *name == method)
            .map(|(_, args)| args.clone())
    }

    fn respond<T: DeserializeOwned>(&self, method: &'static str, args: Value, default: T) -> BackendResult<T> {
        self.calls.lock().unwrap().push((method, args));
        if let Some(body) = self.failures.lock().unwrap().get(method) {
            return Err(BackendError::Status {
                method: "MOCK".to_string(),
                path: method.to_string(),
                status: 500,
                body: body.clone(),
            });
        }
        match self.responses.lock().unwrap().get(method) {
            Some(value) => Ok(serde_json::from_value(value.clone()).unwrap()),
            None => Ok(default),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn get_user_by_email(&self, email: &str) -> BackendResult<Option<UserProfile>> {
        self.respond("get_user_by_email", json!({ "email": email }), None)
    }

    async fn get_schedule(&self, user_id: i64) -> BackendResult<Vec<ScheduleEntry>> {
        self.respond("get_schedule", json!({ "user_id": user_id }), Vec::new())
    }

    async fn get_courses(&self, user_id: i64) -> BackendResult<Vec<Course>> {
        self.respond("get_courses", json!({ "user_id": user_id }), Vec::new())
    }

    async fn get_exams(&self, user_id: i64) -> BackendResult<Vec<ExamEntry>> {
        self.respond("get_exams", json!({ "user_id": user_id }), Vec::new())
    }

    async fn get_grades(&self, user_id: i64) -> BackendResult<Vec<GradeRecord>> {
        self.respond("get_grades", json!({ "user_id": user_id }), Vec::new())
    }

    async fn get_deadlines(&self, user_id: i64) -> BackendResult<Vec<Deadline>> {
        self.respond("get_deadlines", json!({ "user_id": user_id }), Vec::new())
    }

    async fn list_events(&self) -> BackendResult<Vec<Event>> {
        self.respond("list_events", Value::Null, Vec::new())
    }

    async fn list_news(&self) -> BackendResult<Vec<NewsItem>> {
        self.respond("list_news", Value::Null, Vec::new())
    }

    async fn list_clubs(&self) -> BackendResult<Vec<Club>> {
        self.respond("list_clubs", Value::Null, Vec::new())
    }

    async fn rsvp_event(
        &self,
        event_id: i64,
        user_id: i64,
        registration_type: &str,
        note: &str,
    ) -> BackendResult<String> {
        let args = json!({
            "event_id": event_id,
            "user_id": user_id,
            "registration_type": registration_type,
            "note": note,
        });
        self.respond("rsvp_event", args, "registered".to_string())
    }

    async fn cancel_rsvp(&self, event_id: i64, user_id: i64) -> BackendResult<()> {
        self.respond("cancel_rsvp", json!({ "event_id": event_id, "user_id": user_id }), ())
    }

    async fn list_user_events(&self, user_id: i64) -> BackendResult<Vec<Event>> {
        self.respond("list_user_events", json!({ "user_id": user_id }), Vec::new())
    }

    async fn list_admission_programs(&self) -> BackendResult<Vec<AdmissionProgram>> {
        self.respond("list_admission_programs", Value::Null, Vec::new())
    }

    async fn list_admission_events(&self) -> BackendResult<Vec<AdmissionEvent>> {
        self.respond("list_admission_events", Value::Null, Vec::new())
    }

    async fn book_admission_event(
        &self,
        event_id: i64,
        applicant_name: &str,
        email: &str,
        phone: &str,
        note: &str,
    ) -> BackendResult<i64> {
        let args = json!({
            "event_id": event_id,
            "applicant_name": applicant_name,
            "email": email,
            "phone": phone,
            "note": note,
        });
        self.respond("book_admission_event", args, 1)
    }

    async fn list_admission_event_bookings(&self, event_id: i64) -> BackendResult<Vec<AdmissionEventBooking>> {
        self.respond("list_admission_event_bookings", json!({ "event_id": event_id }), Vec::new())
    }

    async fn submit_admission_application(
        &self,
        applicant_name: &str,
        email: &str,
        program_id: Option<i64>,
        details: Value,
    ) -> BackendResult<i64> {
        let args = json!({
            "applicant_name": applicant_name,
            "email": email,
            "program_id": program_id,
            "details": details,
        });
        self.respond("submit_admission_application", args, 1)
    }

    async fn upload_admission_document(
        &self,
        application_id: i64,
        file_name: &str,
        file_type: &str,
        storage_url: &str,
    ) -> BackendResult<i64> {
        let args = json!({
            "application_id": application_id,
            "file_name": file_name,
            "file_type": file_type,
            "storage_url": storage_url,
        });
        self.respond("upload_admission_document", args, 1)
    }

    async fn ask_admission_question(&self, question: &str) -> BackendResult<String> {
        self.respond("ask_admission_question", json!({ "question": question }), String::new())
    }

    async fn create_dean_request(&self, user_id: i64, request_type: &str, payload: Value) -> BackendResult<i64> {
        let args = json!({ "user_id": user_id, "request_type": request_type, "payload": payload });
        self.respond("create_dean_request", args, 1)
    }

    async fn get_dorm_room(&self, student_id: i64) -> BackendResult<DormRoom> {
        self.respond("get_dorm_room", json!({ "student_id": student_id }), DormRoom::default())
    }

    async fn create_dorm_maintenance(
        &self,
        student_id: i64,
        request_type: &str,
        description: &str,
    ) -> BackendResult<i64> {
        let args = json!({
            "student_id": student_id,
            "request_type": request_type,
            "description": description,
        });
        self.respond("create_dorm_maintenance", args, 1)
    }

    async fn submit_dorm_payment(&self, student_id: i64, amount: f64, reference: &str) -> BackendResult<i64> {
        let args = json!({ "student_id": student_id, "amount": amount, "reference": reference });
        self.respond("submit_dorm_payment", args, 1)
    }

    async fn search_books(&self, query: &str) -> BackendResult<Vec<LibraryBook>> {
        self.respond("search_books", json!({ "query": query }), Vec::new())
    }

    async fn reserve_book(&self, book_id: i64, student_id: i64) -> BackendResult<i64> {
        self.respond("reserve_book", json!({ "book_id": book_id, "student_id": student_id }), 1)
    }

    async fn list_borrowed_books(&self, student_id: i64) -> BackendResult<Vec<LibraryLoan>> {
        self.respond("list_borrowed_books", json!({ "student_id": student_id }), Vec::new())
    }

    async fn submit_support_ticket(
        &self,
        category: &str,
        subject: &str,
        description: &str,
        user_id: Option<i64>,
    ) -> BackendResult<i64> {
        let args = json!({
            "category": category,
            "subject": subject,
            "description": description,
            "user_id": user_id,
        });
        self.respond("submit_support_ticket", args, 1)
    }

    async fn submit_support_query(&self, user_id: Option<i64>, question: &str) -> BackendResult<String> {
        let args = json!({ "user_id": user_id, "question": question });
        self.respond("submit_support_query", args, String::new())
    }

    async fn advisor_chat(&self, user_id: Option<i64>, topic: &str, prompt: &str) -> BackendResult<String> {
        let args = json!({ "user_id": user_id, "topic": topic, "prompt": prompt });
        self.respond("advisor_chat", args, String::new())
    }

    async fn run_ai_query(&self, question: &str, filters: Option<Value>) -> BackendResult<String> {
        let args = json!({ "question": question, "filters": filters });
        self.respond("run_ai_query", args, String::new())
    }

    async fn create_ai_summary(&self, text: &str) -> BackendResult<String> {
        self.respond("create_ai_summary", json!({ "text": text }), String::new())
    }

    async fn generate_ai_quiz(&self, prompt: &str, course_id: Option<i64>) -> BackendResult<Vec<QuizQuestion>> {
        let args = json!({ "prompt": prompt, "course_id": course_id });
        self.respond("generate_ai_quiz", args, Vec::new())
    }

    async fn transcribe_audio(&self, audio_ref: &str) -> BackendResult<String> {
        self.respond("transcribe_audio", json!({ "audio_ref": audio_ref }), String::new())
    }

    async fn get_vacations(&self, employee_id: i64) -> BackendResult<Vec<VacationRequest>> {
        self.respond("get_vacations", json!({ "employee_id": employee_id }), Vec::new())
    }

    async fn request_vacation(
        &self,
        employee_id: i64,
        start_iso: &str,
        end_iso: &str,
        vacation_type: &str,
    ) -> BackendResult<i64> {
        let args = json!({
            "employee_id": employee_id,
            "start": start_iso,
            "end": end_iso,
            "vacation_type": vacation_type,
        });
        self.respond("request_vacation", args, 1)
    }

    async fn get_business_trips(&self, employee_id: i64) -> BackendResult<Vec<BusinessTrip>> {
        self.respond("get_business_trips", json!({ "employee_id": employee_id }), Vec::new())
    }

    async fn request_business_trip(
        &self,
        employee_id: i64,
        destination: &str,
        start_iso: &str,
        end_iso: &str,
        purpose: &str,
    ) -> BackendResult<i64> {
        let args = json!({
            "employee_id": employee_id,
            "destination": destination,
            "start": start_iso,
            "end": end_iso,
            "purpose": purpose,
        });
        self.respond("request_business_trip", args, 1)
    }

    async fn get_certificates(&self, employee_id: i64) -> BackendResult<Vec<HrLetter>> {
        self.respond("get_certificates", json!({ "employee_id": employee_id }), Vec::new())
    }

    async fn request_certificate(&self, employee_id: i64, certificate_type: &str) -> BackendResult<i64> {
        let args = json!({ "employee_id": employee_id, "certificate_type": certificate_type });
        self.respond("request_certificate", args, 1)
    }

    async fn list_visa_applications(&self, user_id: i64) -> BackendResult<Vec<VisaApplication>> {
        self.respond("list_visa_applications", json!({ "user_id": user_id }), Vec::new())
    }

    async fn create_visa_application(&self, user_id: i64, application_type: &str) -> BackendResult<i64> {
        let args = json!({ "user_id": user_id, "application_type": application_type });
        self.respond("create_visa_application", args, 1)
    }

    async fn withdraw_visa_application(&self, application_id: i64) -> BackendResult<()> {
        self.respond("withdraw_visa_application", json!({ "application_id": application_id }), ())
    }

    async fn list_visa_documents(&self, application_id: i64) -> BackendResult<Vec<VisaDocument>> {
        self.respond("list_visa_documents", json!({ "application_id": application_id }), Vec::new())
    }

    async fn upload_visa_document(&self, application_id: i64, file_name: &str, file_url: &str) -> BackendResult<i64> {
        let args = json!({ "application_id": application_id, "file_name": file_name, "file_url": file_url });
        self.respond("upload_visa_document", args, 1)
    }

    async fn send_notification(&self, subject: &str, body: &str, recipient_id: Option<i64>) -> BackendResult<i64> {
        let args = json!({ "subject": subject, "body": body, "recipient_id": recipient_id });
        self.respond("send_notification", args, 1)
    }
}
