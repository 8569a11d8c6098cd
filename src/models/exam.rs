use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExamType {
    Reading,
    Writing,
    Listening,
    Speaking,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Reading => "Reading",
            ExamType::Writing => "Writing",
            ExamType::Listening => "Listening",
            ExamType::Speaking => "Speaking",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExamType::Reading => "Reading & Use of English",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reading" | "reading & use of english" => Ok(ExamType::Reading),
            "writing" => Ok(ExamType::Writing),
            "listening" => Ok(ExamType::Listening),
            "speaking" => Ok(ExamType::Speaking),
            other => Err(format!("Unknown exam type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CefrLevel::A1 => "A1 Beginner",
            CefrLevel::A2 => "A2 Elementary",
            CefrLevel::B1 => "B1 Intermediate",
            CefrLevel::B2 => "B2 Upper Intermediate",
            CefrLevel::C1 => "C1 Advanced",
            CefrLevel::C2 => "C2 Proficiency",
        }
    }
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().split_whitespace().next().unwrap_or("");
        match code.to_ascii_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            _ => Err(format!("Unknown CEFR level: {}", s.trim())),
        }
    }
}

/// Level label for arbitrary stored strings; unknown values pass through.
pub fn level_label(level: &str) -> String {
    level
        .parse::<CefrLevel>()
        .map(|l| l.label().to_string())
        .unwrap_or_else(|_| level.to_string())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPart {
    pub part: u32,
    pub title: String,
    pub instructions: String,
    pub content: String,
    #[serde(default)]
    pub examiner_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tips: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub how_to_approach: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingPrompt {
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub tip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamQuestion {
    pub id: u32,
    pub part: u32,
    pub topic: String,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_option: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_prompts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_answers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tips: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub part1_questions: Vec<SpeakingPrompt>,
}

impl ExamQuestion {
    pub fn is_multiple_choice(&self) -> bool {
        !self.options.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SavedExam {
    pub id: Uuid,
    pub user_email: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub exam_type: String,
    pub level: String,
    pub topic: String,
    pub data: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exam_type_labels() {
        assert_eq!(ExamType::Reading.label(), "Reading & Use of English");
        assert_eq!(ExamType::Speaking.label(), "Speaking");
        assert_eq!("listening".parse::<ExamType>(), Ok(ExamType::Listening));
        assert!("maths".parse::<ExamType>().is_err());
    }

    #[test]
    fn level_parsing_accepts_codes_and_labels() {
        assert_eq!("c1".parse::<CefrLevel>(), Ok(CefrLevel::C1));
        assert_eq!("B2 Upper Intermediate".parse::<CefrLevel>(), Ok(CefrLevel::B2));
        assert_eq!(level_label("A2"), "A2 Elementary");
        assert_eq!(level_label("Unknown Level"), "Unknown Level");
    }

    #[test]
    fn part_serializes_in_camel_case() {
        let part = ExamPart {
            part: 1,
            title: "Gapped text".into(),
            examiner_notes: "Skim first.".into(),
            ..Default::default()
        };
        let v = serde_json::to_value(&part).unwrap();
        assert_eq!(v["examinerNotes"], "Skim first.");
        assert!(v.get("audioUrl").is_none());
    }
}
