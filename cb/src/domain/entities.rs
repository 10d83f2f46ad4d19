//! Records returned by the university backend
//!
//! Field names follow the backend's JSON. Missing fields deserialize to
//! defaults and timestamps are parsed leniently, since the backend mixes
//! RFC 3339, naive ISO date-times and bare dates.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::types::{Language, Role};

/// Parse a backend timestamp in any of the formats it emits
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Format a timestamp for chat output, or a dash when absent
pub fn format_time(value: Option<DateTime<Utc>>, format: &str) -> String {
    value.map(|dt| dt.format(format).to_string()).unwrap_or_else(|| "—".to_string())
}

/// Backend user profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub full_name_ru: String,
    #[serde(deserialize_with = "null_as_default")]
    pub full_name_en: String,
    #[serde(deserialize_with = "null_as_default")]
    pub role: String,
    #[serde(deserialize_with = "null_as_default")]
    pub language: String,
    pub is_foreign: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub dorm_room: String,
    #[serde(deserialize_with = "null_as_default")]
    pub faculty: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub last_active: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Profile used when the backend does not know the verified email
    pub fn fallback(email: &str, language: Language, now: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            email: email.to_string(),
            full_name_ru: email.to_string(),
            full_name_en: email.to_string(),
            role: Role::Applicant.as_str().to_string(),
            language: language.code().to_string(),
            created_at: Some(now),
            ..Default::default()
        }
    }

    pub fn role(&self) -> Role {
        Role::from_backend(&self.role)
    }

    /// Name in the given language, falling back to the other one
    pub fn display_name(&self, language: Language) -> &str {
        let (primary, secondary) = match language {
            Language::Ru => (&self.full_name_ru, &self.full_name_en),
            Language::En => (&self.full_name_en, &self.full_name_ru),
        };
        if primary.trim().is_empty() { secondary } else { primary }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleEntry {
    pub session_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub session_type: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub week_label: String,
    pub course_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Course {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub faculty: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamEntry {
    pub exam_id: i64,
    #[serde(rename = "exam_date", deserialize_with = "lenient_timestamp")]
    pub date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub room: String,
    #[serde(rename = "exam_format", deserialize_with = "null_as_default")]
    pub format: String,
    pub course_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeRecord {
    pub grade_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub grade: String,
    #[serde(deserialize_with = "null_as_default")]
    pub gpa_points: f64,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub graded_on: Option<DateTime<Utc>>,
    pub course_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Deadline {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub details: String,
}

/// University event open for RSVP
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub max_attendees: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub current_attendees: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub registration_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user_registration_type: String,
}

impl Event {
    /// `(current/max)` suffix, empty when capacity is unlimited
    pub fn capacity_suffix(&self) -> String {
        if self.max_attendees > 0 {
            format!(" ({}/{})", self.current_attendees, self.max_attendees)
        } else {
            String::new()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Club {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub meeting_schedule: String,
    #[serde(deserialize_with = "null_as_default")]
    pub contact: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsItem {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionProgram {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub duration_years: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub tuition: String,
    #[serde(deserialize_with = "null_as_default")]
    pub faculty: String,
    #[serde(deserialize_with = "null_as_default")]
    pub requirements: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionEvent {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(deserialize_with = "null_as_default")]
    pub max_attendees: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub current_attendees: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionEventBooking {
    pub id: i64,
    pub event_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub applicant_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub phone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub note: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DormRoom {
    pub id: i64,
    pub student_id: i64,
    #[serde(rename = "room_number", deserialize_with = "null_as_default")]
    pub room: String,
    #[serde(deserialize_with = "null_as_default")]
    pub building: String,
    #[serde(deserialize_with = "null_as_default")]
    pub balance: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryBook {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub available_copies: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryLoan {
    pub loan_id: i64,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub borrowed_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    pub book_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VacationRequest {
    pub id: i64,
    pub employee_id: i64,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub vacation_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessTrip {
    pub id: i64,
    pub employee_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub destination: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub purpose: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
}

/// HR certificate request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HrLetter {
    pub id: i64,
    pub employee_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub certificate_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub download_url: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub requested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizQuestion {
    #[serde(deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(deserialize_with = "null_as_default")]
    pub options: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub answer: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisaApplication {
    pub id: i64,
    pub user_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub application_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VisaDocument {
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub file_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub file_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2025-03-01T10:30:00+03:00").unwrap();
        assert_eq!(rfc, Utc.with_ymd_and_hms(2025, 3, 1, 7, 30, 0).unwrap());

        let naive = parse_timestamp("2025-03-01T10:30:00").unwrap();
        assert_eq!(naive.hour(), 10);

        let fractional = parse_timestamp("2025-03-01 10:30:00.123").unwrap();
        assert_eq!(fractional.minute(), 30);

        let date = parse_timestamp("2025-03-01").unwrap();
        assert_eq!((date.year(), date.month(), date.day(), date.hour()), (2025, 3, 1, 0));

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("next tuesday").is_none());
    }

    #[test]
    fn test_user_profile_tolerates_nulls_and_gaps() {
        let json = r#"{
            "id": 42,
            "email": "ivan@univ.ru",
            "full_name_ru": "Иван Петров",
            "full_name_en": null,
            "role": "student",
            "dorm_room": null,
            "created_at": "2024-09-01T00:00:00"
        }"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id, 42);
        assert_eq!(profile.role(), Role::Student);
        assert_eq!(profile.full_name_en, "");
        assert_eq!(profile.dorm_room, "");
        assert!(profile.created_at.is_some());
        assert!(profile.last_active.is_none());
        assert_eq!(profile.display_name(Language::En), "Иван Петров");
    }

    #[test]
    fn test_fallback_profile() {
        let now = Utc::now();
        let profile = UserProfile::fallback("guest@mail.com", Language::En, now);
        assert_eq!(profile.id, 0);
        assert_eq!(profile.full_name_ru, "guest@mail.com");
        assert_eq!(profile.full_name_en, "guest@mail.com");
        assert_eq!(profile.role(), Role::Applicant);
        assert_eq!(profile.language, "en");
    }

    #[test]
    fn test_renamed_fields() {
        let exam: ExamEntry =
            serde_json::from_str(r#"{"exam_id": 1, "exam_date": "2025-01-20T09:00:00Z", "exam_format": "written"}"#)
                .unwrap();
        assert_eq!(exam.format, "written");
        assert!(exam.date.is_some());

        let room: DormRoom = serde_json::from_str(r#"{"room_number": "314", "building": "B", "balance": 1200.5}"#).unwrap();
        assert_eq!(room.room, "314");
        assert_eq!(room.balance, 1200.5);
    }

    #[test]
    fn test_event_capacity_suffix() {
        let mut event = Event::default();
        assert_eq!(event.capacity_suffix(), "");
        event.max_attendees = 50;
        event.current_attendees = 12;
        assert_eq!(event.capacity_suffix(), " (12/50)");
    }
}
