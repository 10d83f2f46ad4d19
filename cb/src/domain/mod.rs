//! Domain types for campusbot
//!
//! Sessions and their dialogue stages, normalized messenger updates,
//! outgoing messages with keyboards, action identifiers and the entities
//! returned by the university backend.

mod action;
mod entities;
mod message;
mod session;
mod types;
mod update;

pub use action::{ActionId, UnknownAction};
pub use entities::{
    format_time, parse_timestamp,
    AdmissionEvent, AdmissionEventBooking, AdmissionProgram, BusinessTrip, Club, Course, Deadline, DormRoom, Event,
    ExamEntry, GradeRecord, HrLetter, LibraryBook, LibraryLoan, NewsItem, QuizQuestion, ScheduleEntry, UserProfile,
    VacationRequest, VisaApplication, VisaDocument,
};
pub use message::{Button, ButtonKind, ButtonStyle, Keyboard, OutgoingMessage, ParseMode};
pub use session::{Auth, OtpChallenge, Pending, PendingForm, Session};
pub use types::{ChatId, Language, Role, Stage, UnknownRole, UserId};
pub use update::{Update, UpdateKind};
