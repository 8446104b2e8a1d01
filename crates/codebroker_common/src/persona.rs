//! Persona profiles applied to every action.
//!
//! The set is fixed at compile time. Lookups by name never fail: anything
//! unrecognized resolves to the teacher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Persona identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersonaId {
    #[default]
    Teacher,
    Hacker,
    Reviewer,
}

/// Answer style associated with a persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Style {
    Educational,
    Advanced,
    Analytical,
}

/// A persona's system prompt and style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonaProfile {
    pub id: PersonaId,
    pub system_prompt: &'static str,
    pub style: Style,
}

const TEACHER: PersonaProfile = PersonaProfile {
    id: PersonaId::Teacher,
    system_prompt: "You are a patient, educational programming teacher. Explain concepts clearly with examples and encourage learning. Use simple language and provide step-by-step explanations.",
    style: Style::Educational,
};

const HACKER: PersonaProfile = PersonaProfile {
    id: PersonaId::Hacker,
    system_prompt: "You are a skilled, efficient hacker-style programmer. Give concise, advanced solutions. Focus on performance, clever tricks, and cutting-edge techniques. Be direct and technical.",
    style: Style::Advanced,
};

const REVIEWER: PersonaProfile = PersonaProfile {
    id: PersonaId::Reviewer,
    system_prompt: "You are a thorough code reviewer. Analyze code quality, suggest improvements, point out potential issues, and recommend best practices. Be constructive and detailed.",
    style: Style::Analytical,
};

impl PersonaId {
    pub const ALL: [PersonaId; 3] = [PersonaId::Teacher, PersonaId::Hacker, PersonaId::Reviewer];

    /// Resolve a persona name, defaulting to `Teacher` for unknown names
    pub fn resolve(name: &str) -> Self {
        match name {
            "teacher" => Self::Teacher,
            "hacker" => Self::Hacker,
            "reviewer" => Self::Reviewer,
            _ => Self::default(),
        }
    }

    pub fn profile(self) -> &'static PersonaProfile {
        match self {
            Self::Teacher => &TEACHER,
            Self::Hacker => &HACKER,
            Self::Reviewer => &REVIEWER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teacher => "teacher",
            Self::Hacker => "hacker",
            Self::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for PersonaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_personas() {
        assert_eq!(PersonaId::resolve("teacher"), PersonaId::Teacher);
        assert_eq!(PersonaId::resolve("hacker"), PersonaId::Hacker);
        assert_eq!(PersonaId::resolve("reviewer"), PersonaId::Reviewer);
    }

    #[test]
    fn test_unknown_persona_defaults_to_teacher() {
        assert_eq!(PersonaId::resolve("pirate"), PersonaId::Teacher);
        assert_eq!(PersonaId::resolve(""), PersonaId::Teacher);
        // Case matters, like any other unknown key
        assert_eq!(PersonaId::resolve("Hacker"), PersonaId::Teacher);
    }

    #[test]
    fn test_profiles_match_ids() {
        for id in PersonaId::ALL {
            let profile = id.profile();
            assert_eq!(profile.id, id);
            assert!(!profile.system_prompt.is_empty());
        }
        assert_eq!(PersonaId::Hacker.profile().style, Style::Advanced);
        assert_eq!(PersonaId::Reviewer.profile().style, Style::Analytical);
        assert_eq!(PersonaId::Teacher.profile().style, Style::Educational);
    }
}
