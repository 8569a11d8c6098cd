use crate::{
    dto::exam_dto::{
        GenerateExamRequest, GenerateExamResponse, NormalizeRequest, SaveExamRequest,
        SubmitAttemptRequest, SubmitAttemptResponse,
    },
    error::{Error, Result},
    middleware::auth::Claims,
    models::exam::{CefrLevel, ExamType},
    services::{
        exam_service::{exam_from_data, NewExam},
        normalizer::parse_exam_content,
        prompts::ExamRequest,
    },
    utils::time::{format_clock, format_countdown, is_urgent},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

const DEFAULT_PART_COUNT: usize = 5;
const DEFAULT_WORDS_PER_PART: usize = 200;
const EXAM_DURATION_MINUTES: u32 = 90;

#[axum::debug_handler]
pub async fn generate_exam(
    State(state): State<AppState>,
    Json(payload): Json<GenerateExamRequest>,
) -> Result<impl IntoResponse> {
    if payload.topic.trim().is_empty() {
        return Err(Error::BadRequest(
            "Please enter a topic to generate an exam.".to_string(),
        ));
    }
    payload.validate()?;

    let exam_type: ExamType = payload.exam_type.parse().map_err(Error::BadRequest)?;
    let level: CefrLevel = payload.cefr_level.parse().map_err(Error::BadRequest)?;
    let part_count = payload
        .part_count
        .unwrap_or(DEFAULT_PART_COUNT)
        .clamp(1, state.max_exam_parts.max(1));

    let request = ExamRequest {
        exam_type,
        level,
        topic: payload.topic.trim().to_string(),
        part_count,
        words_per_part: payload.words_per_part.unwrap_or(DEFAULT_WORDS_PER_PART),
    };
    tracing::info!(
        exam_type = %exam_type,
        level = %level,
        topic = %request.topic,
        part_count,
        "Generating exam"
    );

    let output = state.llm_service.generate_exam(&request).await?;
    for line in &output.logs {
        tracing::debug!("{}", line);
    }
    let mut exam = parse_exam_content(&output.content)?;

    if payload.with_audio && exam_type == ExamType::Listening {
        state.audio_service.attach_audio(&mut exam.parts).await;
    }

    Ok(Json(GenerateExamResponse {
        exam_type: exam_type.as_str().to_string(),
        exam_type_label: exam_type.label().to_string(),
        cefr_level: level.as_str().to_string(),
        level_label: level.label().to_string(),
        topic: request.topic,
        content: output.content,
        parts: exam.parts,
        questions: exam.questions,
        duration_minutes: EXAM_DURATION_MINUTES,
        provider: output.provider,
        model: output.model,
        attempt: output.attempt,
    }))
}

pub async fn normalize(Json(payload): Json<NormalizeRequest>) -> Result<impl IntoResponse> {
    let exam = exam_from_data(&payload.content)?;
    Ok(Json(exam))
}

#[axum::debug_handler]
pub async fn save_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SaveExamRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let saved = state
        .exam_service
        .save_exam(
            claims.owner(),
            NewExam {
                exam_type: payload.exam_type,
                level: payload.level,
                topic: payload.topic,
                data: payload.data,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

pub async fn list_exams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let exams = state.exam_service.list_exams(claims.owner()).await?;
    Ok(Json(exams))
}

pub async fn get_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let exam = state.exam_service.get_exam(id, claims.owner()).await?;
    Ok(Json(exam))
}

pub async fn delete_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    if !state.exam_service.delete_exam(id, claims.owner()).await? {
        return Err(Error::NotFound("Exam not found".to_string()));
    }
    Ok(Json(json!({ "deleted": true, "id": id })))
}

#[axum::debug_handler]
pub async fn submit_attempt(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse> {
    let remaining = EXAM_DURATION_MINUTES as i64 * 60 - payload.time_spent_seconds as i64;
    let (attempt, report) = state
        .exam_service
        .record_attempt(id, claims.owner(), &payload.session, payload.time_spent_seconds)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitAttemptResponse {
            attempt_id: attempt.id,
            score: report.score,
            max_score: report.max_score,
            needs_review: report.needs_review,
            time_spent: format_clock(attempt.time_spent_seconds as i64),
            time_remaining: format_countdown(remaining),
            finished_in_last_minute: is_urgent(remaining),
            report,
        }),
    ))
}

pub async fn list_attempts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempts = state.exam_service.list_attempts(id, claims.owner()).await?;
    Ok(Json(attempts))
}
