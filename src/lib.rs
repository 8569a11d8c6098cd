pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::error::Result;
use crate::services::{
    audio_service::AudioService, exam_service::ExamService, image_service::ImageService,
    llm_service::LlmService,
};
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt_secret: Arc<str>,
    pub webapp_url: Arc<str>,
    pub max_exam_parts: usize,
    pub llm_service: LlmService,
    pub exam_service: ExamService,
    pub audio_service: AudioService,
    pub image_service: ImageService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Result<Self> {
        Self::from_config(pool, crate::config::get_config())
    }

    pub fn from_config(pool: PgPool, config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(180))
            .build()?;

        Ok(Self {
            exam_service: ExamService::new(pool.clone()),
            llm_service: LlmService::new(config, http_client.clone()),
            audio_service: AudioService::new(config, http_client.clone()),
            image_service: ImageService::new(config, http_client),
            jwt_secret: Arc::from(config.jwt_secret.as_str()),
            webapp_url: Arc::from(config.webapp_url.as_str()),
            max_exam_parts: config.max_exam_parts,
            pool,
        })
    }
}
