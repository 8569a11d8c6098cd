use crate::{
    dto::exam_dto::{CheckAnswerRequest, CheckAnswerResponse, GradeWritingRequest},
    error::{Error, Result},
    services::grading_service::GradingService,
    AppState,
};
use axum::{extract::State, response::IntoResponse, Json};
use validator::Validate;

pub async fn check_answer(Json(payload): Json<CheckAnswerRequest>) -> Result<impl IntoResponse> {
    if payload.answer.trim().is_empty() {
        return Err(Error::BadRequest("Select an answer before checking.".to_string()));
    }
    let is_correct = GradingService::check_answer(&payload.question, &payload.answer);
    Ok(Json(CheckAnswerResponse {
        question_id: payload.question.id,
        is_correct,
        correct_option: payload.question.correct_option,
        explanation: payload.question.explanation,
    }))
}

#[axum::debug_handler]
pub async fn grade_writing(
    State(state): State<AppState>,
    Json(payload): Json<GradeWritingRequest>,
) -> Result<impl IntoResponse> {
    if payload.student_input.trim().is_empty() {
        return Err(Error::BadRequest(
            "Please write your answer before requesting feedback.".to_string(),
        ));
    }
    payload.validate()?;

    tracing::info!(
        task_type = %payload.task_type,
        words = payload.student_input.split_whitespace().count(),
        "Grading writing"
    );
    let assessment = state
        .llm_service
        .assess_writing(
            &payload.task_type,
            &payload.question_context,
            &payload.student_input,
        )
        .await?;
    Ok(Json(assessment))
}
