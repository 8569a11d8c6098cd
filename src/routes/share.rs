use crate::{
    dto::exam_dto::{PublicExamQuery, ShareResponse},
    error::Result,
    services::share_service::{encode_share, open_shared_exam, share_url, SharePayload},
    AppState,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

pub async fn create_share_link(
    State(state): State<AppState>,
    Json(payload): Json<SharePayload>,
) -> Result<impl IntoResponse> {
    // Refuse links that would not open.
    crate::services::exam_service::exam_from_data(&payload.content)?;

    let token = encode_share(&payload)?;
    let url = share_url(&state.webapp_url, &token)?;
    Ok(Json(ShareResponse { token, url }))
}

pub async fn public_exam(Query(params): Query<PublicExamQuery>) -> Result<impl IntoResponse> {
    let shared = open_shared_exam(params.data.as_deref())?;
    Ok(Json(shared))
}
