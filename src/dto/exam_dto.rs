use crate::models::exam::{ExamPart, ExamQuestion};
use crate::models::practice::PracticeSession;
use crate::services::grading_service::GradeReport;
use crate::services::llm_service::Provider;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct GenerateExamRequest {
    pub exam_type: String,
    pub cefr_level: String,
    #[serde(default)]
    pub topic: String,
    /// Clamped to `1..=MAX_EXAM_PARTS`, never rejected.
    pub part_count: Option<usize>,
    #[validate(range(min = 50, max = 1000))]
    pub words_per_part: Option<usize>,
    #[serde(default)]
    pub with_audio: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateExamResponse {
    pub exam_type: String,
    pub exam_type_label: String,
    pub cefr_level: String,
    pub level_label: String,
    pub topic: String,
    pub content: String,
    pub parts: Vec<ExamPart>,
    pub questions: Vec<ExamQuestion>,
    pub duration_minutes: u32,
    pub provider: Provider,
    pub model: String,
    pub attempt: usize,
}

/// Raw model output or an already parsed exam value.
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizeRequest {
    pub content: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveExamRequest {
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub exam_type: String,
    #[validate(length(min = 1))]
    pub level: String,
    #[serde(default)]
    pub topic: String,
    pub data: JsonValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAttemptRequest {
    pub session: PracticeSession,
    #[serde(default)]
    pub time_spent_seconds: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitAttemptResponse {
    pub attempt_id: uuid::Uuid,
    pub score: i32,
    pub max_score: i32,
    pub needs_review: bool,
    pub report: GradeReport,
    pub time_spent: String,
    pub time_remaining: String,
    pub finished_in_last_minute: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckAnswerRequest {
    pub question: ExamQuestion,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckAnswerResponse {
    pub question_id: u32,
    pub is_correct: bool,
    pub correct_option: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GradeWritingRequest {
    #[validate(length(min = 1, max = 100))]
    pub task_type: String,
    #[serde(default)]
    pub question_context: String,
    #[serde(default)]
    pub student_input: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageProvider {
    Auto,
    HuggingFace,
    Free,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ImageRequest {
    #[validate(length(min = 1, max = 2000))]
    pub prompt: String,
    pub provider: Option<ImageProvider>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockImageQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareResponse {
    pub token: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicExamQuery {
    pub data: Option<String>,
}
