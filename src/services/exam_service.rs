use crate::error::{Error, Result};
use crate::models::attempt::ExamAttempt;
use crate::models::exam::SavedExam;
use crate::models::practice::PracticeSession;
use crate::services::grading_service::{GradeReport, GradingService};
use crate::services::normalizer::{normalize_exam, parse_exam_content, NormalizedExam};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewExam {
    pub exam_type: String,
    pub level: String,
    pub topic: String,
    pub data: JsonValue,
}

#[derive(Clone)]
pub struct ExamService {
    pool: PgPool,
}

impl ExamService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn save_exam(&self, user_email: &str, exam: NewExam) -> Result<SavedExam> {
        let saved = sqlx::query_as::<_, SavedExam>(
            r#"
            INSERT INTO exams (user_email, type, level, topic, data)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_email, type, level, topic, data, created_at
            "#,
        )
        .bind(user_email)
        .bind(&exam.exam_type)
        .bind(&exam.level)
        .bind(&exam.topic)
        .bind(&exam.data)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(exam_id = %saved.id, user_email, "Exam saved");
        Ok(saved)
    }

    pub async fn list_exams(&self, user_email: &str) -> Result<Vec<SavedExam>> {
        let exams = sqlx::query_as::<_, SavedExam>(
            r#"
            SELECT id, user_email, type, level, topic, data, created_at
            FROM exams
            WHERE user_email = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_email)
        .fetch_all(&self.pool)
        .await?;
        Ok(exams)
    }

    pub async fn get_exam(&self, id: Uuid, user_email: &str) -> Result<SavedExam> {
        sqlx::query_as::<_, SavedExam>(
            r#"
            SELECT id, user_email, type, level, topic, data, created_at
            FROM exams
            WHERE id = $1 AND user_email = $2
            "#,
        )
        .bind(id)
        .bind(user_email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Exam not found".to_string()))
    }

    pub async fn delete_exam(&self, id: Uuid, user_email: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM exams WHERE id = $1 AND user_email = $2")
            .bind(id)
            .bind(user_email)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Grades the session against the stored exam and records the attempt.
    pub async fn record_attempt(
        &self,
        exam_id: Uuid,
        user_email: &str,
        session: &PracticeSession,
        time_spent_seconds: i32,
    ) -> Result<(ExamAttempt, GradeReport)> {
        let exam = self.get_exam(exam_id, user_email).await?;
        let normalized = exam_from_data(&exam.data)?;
        let session = session_for_exam(session, normalized.questions.len())?;
        let report = GradingService::grade(&normalized.questions, &session.answers);

        let attempt = sqlx::query_as::<_, ExamAttempt>(
            r#"
            INSERT INTO exam_attempts (
                exam_id, user_email, answers, flagged, graded, score, max_score, time_spent_seconds
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, exam_id, user_email, answers, flagged, graded, score, max_score,
                      time_spent_seconds, created_at
            "#,
        )
        .bind(exam_id)
        .bind(user_email)
        .bind(serde_json::to_value(&session.answers)?)
        .bind(serde_json::to_value(&session.flagged)?)
        .bind(serde_json::to_value(&report.graded)?)
        .bind(report.score)
        .bind(report.max_score)
        .bind(time_spent_seconds.max(0))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            attempt_id = %attempt.id,
            exam_id = %exam_id,
            score = report.score,
            max_score = report.max_score,
            "Attempt recorded"
        );
        Ok((attempt, report))
    }

    pub async fn list_attempts(&self, exam_id: Uuid, user_email: &str) -> Result<Vec<ExamAttempt>> {
        let attempts = sqlx::query_as::<_, ExamAttempt>(
            r#"
            SELECT id, exam_id, user_email, answers, flagged, graded, score, max_score,
                   time_spent_seconds, created_at
            FROM exam_attempts
            WHERE exam_id = $1 AND user_email = $2
            ORDER BY created_at DESC
            "#,
        )
        .bind(exam_id)
        .bind(user_email)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }
}

/// Rejects a snapshot taken against a different exam and drops answers and
/// flags for question ids the exam does not have.
pub fn session_for_exam(
    session: &PracticeSession,
    question_count: usize,
) -> Result<PracticeSession> {
    if session.total_questions as usize != question_count {
        return Err(Error::BadRequest(format!(
            "Attempt covers {} questions but the exam has {}.",
            session.total_questions, question_count
        )));
    }
    let known = |id: &u32| *id >= 1 && *id as usize <= question_count;
    Ok(PracticeSession {
        total_questions: session.total_questions,
        current_question: session.current_question.clamp(1, session.total_questions.max(1)),
        answers: session
            .answers
            .iter()
            .filter(|(id, _)| known(id))
            .map(|(id, answer)| (*id, answer.clone()))
            .collect(),
        flagged: session.flagged.iter().copied().filter(known).collect(),
        submitted: session.submitted.iter().copied().filter(known).collect(),
    })
}

/// Stored exam data is either the raw generated text or its parsed JSON.
pub fn exam_from_data(data: &JsonValue) -> Result<NormalizedExam> {
    let exam = match data {
        JsonValue::String(text) => parse_exam_content(text)?,
        other => normalize_exam(other)?,
    };
    Ok(exam)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_data_may_be_text_or_json() {
        let parts = json!([{
            "title": "Part 1: Multiple choice",
            "instructions": "Choose A, B, C or D.",
            "content": "A short text.",
            "questions": [{"question": "Why?", "options": ["a", "b", "c", "d"], "correctOption": "C"}]
        }]);

        let from_json = exam_from_data(&parts).unwrap();
        let from_text = exam_from_data(&JsonValue::String(format!("```json\n{}\n```", parts))).unwrap();
        assert_eq!(from_json, from_text);
        assert_eq!(from_json.questions[0].correct_option, "C");
    }

    #[test]
    fn snapshot_must_match_the_exam_question_count() {
        let mut session = PracticeSession::new(3);
        session.answer(2, "B");
        assert!(matches!(
            session_for_exam(&session, 2),
            Err(Error::BadRequest(_))
        ));

        session.answers.insert(7, "A".to_string());
        session.flagged.insert(9);
        session.flagged.insert(1);
        session.submitted.insert(0);
        let checked = session_for_exam(&session, 3).unwrap();
        assert_eq!(checked.answers.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(checked.flagged.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert!(checked.submitted.is_empty());
    }

    #[test]
    fn unusable_data_is_rejected() {
        assert!(matches!(
            exam_from_data(&json!({"note": "nothing here"})),
            Err(Error::Normalize(_))
        ));
    }
}
