use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::audio_service::data_url;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const DALLE_URL: &str = "https://api.openai.com/v1/images/generations";
const HUGGINGFACE_URL: &str = "https://router.huggingface.co/models/";
const PEXELS_SEARCH_URL: &str = "https://api.pexels.com/v1/search";

const HUGGINGFACE_IMAGE_MODELS: &[&str] = &[
    "prompthero/openjourney",
    "runwayml/stable-diffusion-v1-5",
    "dataautogpt3/OpenDalleV1.1",
];

const MAX_PROMPT_CHARS: usize = 500;

static UNSAFE_PROMPT_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s,.\-]").unwrap());
static POLLINATIONS_URL: Lazy<Url> =
    Lazy::new(|| Url::parse("https://image.pollinations.ai/prompt/").unwrap());
static FREE_IMAGE_URL: Lazy<Url> = Lazy::new(|| Url::parse("https://pollinations.ai/p/").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageSource {
    Dalle,
    Pollinations,
    HuggingFace,
    Pexels,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedImage {
    pub image_url: String,
    pub source: ImageSource,
}

#[derive(Deserialize)]
struct DalleResponse {
    data: Vec<DalleImage>,
}

#[derive(Deserialize)]
struct DalleImage {
    url: Option<String>,
}

#[derive(Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Deserialize)]
struct PexelsPhoto {
    src: PexelsSrc,
}

#[derive(Deserialize)]
struct PexelsSrc {
    large2x: Option<String>,
    large: Option<String>,
}

#[derive(Clone)]
pub struct ImageService {
    client: Client,
    openai_key: Option<String>,
    huggingface_key: Option<String>,
    pexels_key: Option<String>,
}

impl ImageService {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            openai_key: config.openai_api_key.clone(),
            huggingface_key: config.huggingface_api_key.clone(),
            pexels_key: config.pexels_api_key.clone(),
        }
    }

    /// DALL-E 3 when an OpenAI key is present, Pollinations otherwise or on failure.
    pub async fn generate(&self, prompt: &str) -> Result<GeneratedImage> {
        if prompt.trim().is_empty() {
            return Err(Error::BadRequest("No image prompt provided".to_string()));
        }
        if let Some(key) = self.openai_key.as_deref() {
            tracing::info!(prompt, "Generating image with DALL-E 3");
            match self.dalle(key, prompt).await {
                Ok(url) => {
                    return Ok(GeneratedImage {
                        image_url: url,
                        source: ImageSource::Dalle,
                    })
                }
                Err(e) => {
                    tracing::error!("DALL-E image generation failed, falling back: {}", e)
                }
            }
        } else {
            tracing::info!("No OpenAI API key found, using Pollinations");
        }
        Ok(self.pollinations(prompt).await)
    }

    pub async fn generate_huggingface(&self, prompt: &str) -> Result<GeneratedImage> {
        let key = self.huggingface_key.as_deref().ok_or_else(|| {
            Error::NotConfigured("HUGGINGFACE_API_KEY is not set".to_string())
        })?;

        for model in HUGGINGFACE_IMAGE_MODELS {
            tracing::info!(model, "Attempting to generate image");
            let res = match self
                .client
                .post(format!("{}{}", HUGGINGFACE_URL, model))
                .bearer_auth(key)
                .json(&serde_json::json!({ "inputs": prompt }))
                .timeout(Duration::from_secs(120))
                .send()
                .await
            {
                Ok(res) => res,
                Err(e) => {
                    tracing::error!(model, "Hugging Face request failed: {}", e);
                    continue;
                }
            };

            let status = res.status();
            if status == StatusCode::NOT_FOUND {
                tracing::warn!(model, "Model returned 404, trying next model");
                continue;
            }
            if !status.is_success() {
                let text = res.text().await.unwrap_or_default();
                if text.contains("is currently loading") {
                    return Err(Error::Upstream(format!(
                        "Model {} is loading. Please wait a moment and try again.",
                        model
                    )));
                }
                tracing::error!(model, %status, "Hugging Face API error: {}", text);
                continue;
            }

            match res.bytes().await {
                Ok(bytes) => {
                    tracing::info!(model, "Generated image");
                    return Ok(GeneratedImage {
                        image_url: data_url("image/jpeg", &bytes),
                        source: ImageSource::HuggingFace,
                    });
                }
                Err(e) => tracing::error!(model, "Failed to read image body: {}", e),
            }
        }

        Err(Error::Upstream(
            "All tried image generation models failed. This might be due to Hugging Face API issues or gated model restrictions.".to_string(),
        ))
    }

    pub async fn stock_image(&self, query: &str) -> Result<GeneratedImage> {
        let key = self.pexels_key.as_deref().ok_or_else(|| {
            Error::NotConfigured(
                "Server Error: PEXELS_API_KEY is not set in environment variables.".to_string(),
            )
        })?;

        let res = self
            .client
            .get(PEXELS_SEARCH_URL)
            .header(reqwest::header::AUTHORIZATION, key)
            .query(&[
                ("query", query),
                ("per_page", "1"),
                ("orientation", "landscape"),
            ])
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(Error::Upstream(format!(
                "Pexels API returned {}",
                res.status().as_u16()
            )));
        }

        let body: PexelsResponse = res.json().await?;
        body.photos
            .into_iter()
            .next()
            .and_then(|photo| photo.src.large2x.or(photo.src.large))
            .map(|image_url| GeneratedImage {
                image_url,
                source: ImageSource::Pexels,
            })
            .ok_or_else(|| {
                Error::NotFound("No relevant stock photos found for this description.".to_string())
            })
    }

    async fn dalle(&self, key: &str, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": "dall-e-3",
            "prompt": format!(
                "A realistic, high-quality photograph style image for a language exam. The prompt is: {}",
                prompt
            ),
            "n": 1,
            "size": "1024x1024",
            "quality": "standard",
        });
        let res = self
            .client
            .post(DALLE_URL)
            .bearer_auth(key)
            .json(&body)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("OpenAI Images Error: {} {}", status, text)));
        }
        let body: DalleResponse = res.json().await?;
        body.data
            .into_iter()
            .find_map(|image| image.url)
            .ok_or_else(|| Error::Upstream("No image URL returned from API.".to_string()))
    }

    /// Never fails: if the image cannot be fetched, the direct URL is handed
    /// to the client instead.
    async fn pollinations(&self, prompt: &str) -> GeneratedImage {
        let seed = rand::thread_rng().gen_range(0..1_000_000);
        let url = pollinations_url(prompt, seed);
        tracing::info!(%url, "Generating image with Pollinations");

        let fetched = async {
            let res = self
                .client
                .get(url.as_str())
                .header(reqwest::header::USER_AGENT, "Mozilla/5.0")
                .timeout(Duration::from_secs(60))
                .send()
                .await?;
            if !res.status().is_success() {
                return Err(Error::Upstream(format!(
                    "Pollinations.ai API Error: {}",
                    res.status().as_u16()
                )));
            }
            Ok::<_, Error>(res.bytes().await?)
        }
        .await;

        let image_url = match fetched {
            Ok(bytes) => data_url("image/jpeg", &bytes),
            Err(e) => {
                tracing::warn!("Pollinations fetch failed, returning direct URL: {}", e);
                url.to_string()
            }
        };
        GeneratedImage {
            image_url,
            source: ImageSource::Pollinations,
        }
    }
}

pub fn clean_prompt(prompt: &str) -> String {
    let cleaned = UNSAFE_PROMPT_CHARS.replace_all(prompt, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return "scene".to_string();
    }
    cleaned.chars().take(MAX_PROMPT_CHARS).collect()
}

pub fn pollinations_url(prompt: &str, seed: u32) -> Url {
    let mut url = prompt_url(&POLLINATIONS_URL, &clean_prompt(prompt));
    url.query_pairs_mut()
        .append_pair("width", "1024")
        .append_pair("height", "1024")
        .append_pair("nologo", "true")
        .append_pair("seed", &seed.to_string())
        .append_pair("model", "flux");
    url
}

/// Direct link the browser can load without any server round trip.
pub fn free_image_url(prompt: &str) -> String {
    let seed = rand::thread_rng().gen_range(0..1000);
    free_image_url_with_seed(prompt, seed)
}

fn free_image_url_with_seed(prompt: &str, seed: u32) -> String {
    let mut url = prompt_url(&FREE_IMAGE_URL, prompt);
    url.query_pairs_mut()
        .append_pair("width", "1024")
        .append_pair("height", "768")
        .append_pair("model", "flux")
        .append_pair("seed", &seed.to_string());
    url.to_string()
}

fn prompt_url(base: &Url, prompt: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().push(prompt);
    }
    url
}
