use crate::{
    dto::exam_dto::{AudioRequest, ImageProvider, ImageRequest, StockImageQuery},
    error::{Error, Result},
    services::image_service::{free_image_url, GeneratedImage, ImageSource},
    AppState,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use validator::Validate;

pub async fn generate_audio(
    State(state): State<AppState>,
    Json(payload): Json<AudioRequest>,
) -> Result<impl IntoResponse> {
    let audio = state.audio_service.synthesize(&payload.text).await?;
    Ok(Json(audio))
}

pub async fn generate_image(
    State(state): State<AppState>,
    Json(payload): Json<ImageRequest>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let image = match payload.provider.unwrap_or(ImageProvider::Auto) {
        ImageProvider::Auto => state.image_service.generate(&payload.prompt).await?,
        ImageProvider::HuggingFace => {
            state
                .image_service
                .generate_huggingface(&payload.prompt)
                .await?
        }
        ImageProvider::Free => GeneratedImage {
            image_url: free_image_url(&payload.prompt),
            source: ImageSource::Pollinations,
        },
    };
    Ok(Json(image))
}

pub async fn stock_image(
    State(state): State<AppState>,
    Query(params): Query<StockImageQuery>,
) -> Result<impl IntoResponse> {
    if params.query.trim().is_empty() {
        return Err(Error::BadRequest("A search query is required.".to_string()));
    }
    let image = state.image_service.stock_image(params.query.trim()).await?;
    Ok(Json(image))
}
