//! Small value types shared across the dialogue

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Messenger chat identifier
pub type ChatId = i64;

/// Messenger user identifier
pub type UserId = i64;

/// Interface language of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ru,
    En,
}

impl Language {
    /// Two-letter code used in callback payloads
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }

    /// Parse user input (payload suffix or free text) into a language
    ///
    /// Accepts `ru|rus|russian` and `en|eng|english`, case-insensitive.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "ru" | "rus" | "russian" => Some(Self::Ru),
            "en" | "eng" | "english" => Some(Self::En),
            _ => None,
        }
    }

    /// Pick the variant of a bilingual string
    pub fn pick<'a>(&self, ru: &'a str, en: &'a str) -> &'a str {
        match self {
            Self::Ru => ru,
            Self::En => en,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when a role name is not recognized
#[derive(Debug, Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

/// User role; selects which menu tree a session sees
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Applicant,
    Student,
    Employee,
    Leadership,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Applicant, Role::Student, Role::Employee, Role::Leadership];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applicant => "applicant",
            Self::Student => "student",
            Self::Employee => "employee",
            Self::Leadership => "leadership",
        }
    }

    /// Map a role string coming from the backend
    ///
    /// Unknown roles degrade to `Applicant` so the user still gets a menu.
    pub fn from_backend(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(role = %value, "Unknown backend role, falling back to applicant");
            Self::Applicant
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "applicant" => Ok(Self::Applicant),
            "student" => Ok(Self::Student),
            "employee" => Ok(Self::Employee),
            "leadership" => Ok(Self::Leadership),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Position of a session in the onboarding state machine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Init,
    SelectLanguage,
    ChooseAuthMode,
    CollectEmail,
    AwaitOtp,
    MainMenu,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::SelectLanguage => "select_language",
            Self::ChooseAuthMode => "choose_auth_mode",
            Self::CollectEmail => "collect_email",
            Self::AwaitOtp => "await_otp",
            Self::MainMenu => "main_menu",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse_aliases() {
        assert_eq!(Language::parse("ru"), Some(Language::Ru));
        assert_eq!(Language::parse(" Russian "), Some(Language::Ru));
        assert_eq!(Language::parse("RUS"), Some(Language::Ru));
        assert_eq!(Language::parse("en"), Some(Language::En));
        assert_eq!(Language::parse("English"), Some(Language::En));
        assert_eq!(Language::parse("eng"), Some(Language::En));
        assert_eq!(Language::parse("de"), None);
        assert_eq!(Language::parse(""), None);
    }

    #[test]
    fn test_language_pick() {
        assert_eq!(Language::Ru.pick("да", "yes"), "да");
        assert_eq!(Language::En.pick("да", "yes"), "yes");
    }

    #[test]
    fn test_role_parse_and_display() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
            assert_eq!(role.to_string(), role.as_str());
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_from_backend_falls_back() {
        assert_eq!(Role::from_backend("Student"), Role::Student);
        assert_eq!(Role::from_backend("janitor"), Role::Applicant);
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Role::Leadership).unwrap();
        assert_eq!(json, "\"leadership\"");
        let role: Role = serde_yaml::from_str("employee").unwrap();
        assert_eq!(role, Role::Employee);
    }
}
