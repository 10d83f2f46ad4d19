//! University backend client
//!
//! The [`Backend`] trait is the boundary between the dialogue and the REST
//! API. [`HttpBackend`] is the production implementation.

mod error;
mod http;
#[cfg(test)]
pub mod mock;

pub use error::BackendError;
pub use http::HttpBackend;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{
    AdmissionEvent, AdmissionEventBooking, AdmissionProgram, BusinessTrip, Club, Course, Deadline, DormRoom, Event,
    ExamEntry, GradeRecord, HrLetter, LibraryBook, LibraryLoan, NewsItem, QuizQuestion, ScheduleEntry, UserProfile,
    VacationRequest, VisaApplication, VisaDocument,
};

pub type BackendResult<T> = Result<T, BackendError>;

/// Remote university services
///
/// Calls are independent and stateless; there are no retries.
#[async_trait]
pub trait Backend: Send + Sync {
    // Users
    /// Look up a profile by email; `None` when the backend does not know it
    async fn get_user_by_email(&self, email: &str) -> BackendResult<Option<UserProfile>>;

    // Academic
    async fn get_schedule(&self, user_id: i64) -> BackendResult<Vec<ScheduleEntry>>;
    async fn get_courses(&self, user_id: i64) -> BackendResult<Vec<Course>>;
    async fn get_exams(&self, user_id: i64) -> BackendResult<Vec<ExamEntry>>;
    async fn get_grades(&self, user_id: i64) -> BackendResult<Vec<GradeRecord>>;
    async fn get_deadlines(&self, user_id: i64) -> BackendResult<Vec<Deadline>>;

    // Events and news
    async fn list_events(&self) -> BackendResult<Vec<Event>>;
    async fn list_news(&self) -> BackendResult<Vec<NewsItem>>;
    async fn list_clubs(&self) -> BackendResult<Vec<Club>>;
    /// Register for an event; returns the registration status string
    async fn rsvp_event(&self, event_id: i64, user_id: i64, registration_type: &str, note: &str)
    -> BackendResult<String>;
    async fn cancel_rsvp(&self, event_id: i64, user_id: i64) -> BackendResult<()>;
    async fn list_user_events(&self, user_id: i64) -> BackendResult<Vec<Event>>;

    // Admissions
    async fn list_admission_programs(&self) -> BackendResult<Vec<AdmissionProgram>>;
    async fn list_admission_events(&self) -> BackendResult<Vec<AdmissionEvent>>;
    async fn book_admission_event(
        &self,
        event_id: i64,
        applicant_name: &str,
        email: &str,
        phone: &str,
        note: &str,
    ) -> BackendResult<i64>;
    async fn list_admission_event_bookings(&self, event_id: i64) -> BackendResult<Vec<AdmissionEventBooking>>;
    async fn submit_admission_application(
        &self,
        applicant_name: &str,
        email: &str,
        program_id: Option<i64>,
        details: Value,
    ) -> BackendResult<i64>;
    async fn upload_admission_document(
        &self,
        application_id: i64,
        file_name: &str,
        file_type: &str,
        storage_url: &str,
    ) -> BackendResult<i64>;
    async fn ask_admission_question(&self, question: &str) -> BackendResult<String>;

    // Dean's office and dormitory
    async fn create_dean_request(&self, user_id: i64, request_type: &str, payload: Value) -> BackendResult<i64>;
    async fn get_dorm_room(&self, student_id: i64) -> BackendResult<DormRoom>;
    async fn create_dorm_maintenance(&self, student_id: i64, request_type: &str, description: &str)
    -> BackendResult<i64>;
    async fn submit_dorm_payment(&self, student_id: i64, amount: f64, reference: &str) -> BackendResult<i64>;

    // Library
    async fn search_books(&self, query: &str) -> BackendResult<Vec<LibraryBook>>;
    async fn reserve_book(&self, book_id: i64, student_id: i64) -> BackendResult<i64>;
    async fn list_borrowed_books(&self, student_id: i64) -> BackendResult<Vec<LibraryLoan>>;

    // Support and AI
    async fn submit_support_ticket(
        &self,
        category: &str,
        subject: &str,
        description: &str,
        user_id: Option<i64>,
    ) -> BackendResult<i64>;
    async fn submit_support_query(&self, user_id: Option<i64>, question: &str) -> BackendResult<String>;
    async fn advisor_chat(&self, user_id: Option<i64>, topic: &str, prompt: &str) -> BackendResult<String>;
    async fn run_ai_query(&self, question: &str, filters: Option<Value>) -> BackendResult<String>;
    async fn create_ai_summary(&self, text: &str) -> BackendResult<String>;
    async fn generate_ai_quiz(&self, prompt: &str, course_id: Option<i64>) -> BackendResult<Vec<QuizQuestion>>;
    async fn transcribe_audio(&self, audio_ref: &str) -> BackendResult<String>;

    // HR
    async fn get_vacations(&self, employee_id: i64) -> BackendResult<Vec<VacationRequest>>;
    async fn request_vacation(
        &self,
        employee_id: i64,
        start_iso: &str,
        end_iso: &str,
        vacation_type: &str,
    ) -> BackendResult<i64>;
    async fn get_business_trips(&self, employee_id: i64) -> BackendResult<Vec<BusinessTrip>>;
    async fn request_business_trip(
        &self,
        employee_id: i64,
        destination: &str,
        start_iso: &str,
        end_iso: &str,
        purpose: &str,
    ) -> BackendResult<i64>;
    async fn get_certificates(&self, employee_id: i64) -> BackendResult<Vec<HrLetter>>;
    async fn request_certificate(&self, employee_id: i64, certificate_type: &str) -> BackendResult<i64>;

    // Visa
    async fn list_visa_applications(&self, user_id: i64) -> BackendResult<Vec<VisaApplication>>;
    async fn create_visa_application(&self, user_id: i64, application_type: &str) -> BackendResult<i64>;
    async fn withdraw_visa_application(&self, application_id: i64) -> BackendResult<()>;
    async fn list_visa_documents(&self, application_id: i64) -> BackendResult<Vec<VisaDocument>>;
    async fn upload_visa_document(&self, application_id: i64, file_name: &str, file_url: &str)
    -> BackendResult<i64>;

    // Notifications
    async fn send_notification(&self, subject: &str, body: &str, recipient_id: Option<i64>) -> BackendResult<i64>;
}
