//! Action identifiers
//!
//! Every leaf of a menu tree names one action. The string form is what
//! travels in `act:<id>` callback payloads and in the menu YAML files.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when an action id is not recognized
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

macro_rules! action_ids {
    ($($variant:ident => $name:literal,)+) => {
        /// Stable identifier of a leaf menu action
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ActionId {
            $($variant,)+
        }

        impl ActionId {
            /// All known actions, in declaration order
            pub const ALL: &'static [ActionId] = &[$(ActionId::$variant,)+];

            /// Wire name used in payloads and menu files
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(ActionId::$variant => $name,)+
                }
            }
        }

        impl FromStr for ActionId {
            type Err = UnknownAction;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(ActionId::$variant),)+
                    other => Err(UnknownAction(other.to_string())),
                }
            }
        }
    };
}

action_ids! {
    SwitchLanguage => "switch_language",

    // Admissions
    AdmissionsPrograms => "admissions_programs",
    BookOpenDay => "book_open_day",
    BookCampusTour => "book_campus_tour",
    BookAdmissionEvent => "book_admission_event",
    AdmissionsContact => "admissions_contact",
    AdmissionsDocuments => "admissions_documents",
    AdmissionsAppointment => "admissions_appointment",
    AdmissionQuestion => "admission_question",

    // Education
    ViewSchedule => "view_schedule",
    ViewExams => "view_exams",
    ViewGrades => "view_grades",
    ViewDeadlines => "view_deadlines",
    TeacherFeedback => "teacher_feedback",
    ElectiveRegistration => "elective_registration",

    // Projects
    SubmitProject => "submit_project",
    BuildTeam => "build_team",
    BrowseProjects => "browse_projects",
    MyProjects => "my_projects",

    // Career
    CareerConsultation => "career_consultation",
    BrowseJobs => "browse_jobs",
    ApplyJob => "apply_job",
    MyApplications => "my_applications",

    // Dean's office
    DeanCertificates => "dean_certificates",
    DeanTuition => "dean_tuition",
    DeanCompensation => "dean_compensation",
    DeanAppointment => "dean_appointment",
    DeanApplications => "dean_applications",

    // Dormitory
    DormPayment => "dorm_payment",
    DormServices => "dorm_services",
    DormGuestPass => "dorm_guest_pass",
    DormMaintenance => "dorm_maintenance",

    // Events
    EventsCalendar => "events_calendar",
    EventsRegister => "events_register",
    EventsMine => "events_mine",

    // Library
    LibrarySearch => "library_search",
    LibraryReserve => "library_reserve",
    LibraryMy => "library_my",

    // Visa
    VisaStatus => "visa_status",
    VisaRenewal => "visa_renewal",
    VisaAppointment => "visa_appointment",

    // Settings and support
    ViewProfile => "view_profile",
    ToggleNotifications => "toggle_notifications",
    ContactSupport => "contact_support",
    Faq => "faq",
    ReportIssue => "report_issue",

    // AI assistant
    AiQuery => "ai_query",
    AiSummary => "ai_summary",
    AiQuiz => "ai_quiz",
    AiTranscription => "ai_transcription",
    AdvisorChat => "advisor_chat",

    // Employee services
    BusinessTripsList => "business_trips_list",
    BusinessTripRequest => "business_trip_request",
    VacationsList => "vacations_list",
    VacationRequest => "vacation_request",
    CertificatesList => "certificates_list",
    CertificateRequest => "certificate_request",
    OfficeGuestPass => "office_guest_pass",
    HrAppointment => "hr_appointment",

    // Leadership
    LeadershipNews => "leadership_news",
    LeadershipAlerts => "leadership_alerts",
    LeadershipEvents => "leadership_events",
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
