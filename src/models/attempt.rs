use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExamAttempt {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub user_email: String,
    pub answers: JsonValue,
    pub flagged: JsonValue,
    pub graded: JsonValue,
    pub score: i32,
    pub max_score: i32,
    pub time_spent_seconds: i32,
    pub created_at: DateTime<Utc>,
}
