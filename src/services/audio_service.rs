use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::exam::ExamPart;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const ELEVENLABS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const ELEVENLABS_MODEL: &str = "eleven_monolingual_v1";
const OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";
const HUGGINGFACE_TTS_URL: &str = "https://router.huggingface.co/models/facebook/mms-tts-eng";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProvider {
    ElevenLabs,
    OpenAi,
    HuggingFace,
}

#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedAudio {
    pub audio_url: String,
    pub provider: TtsProvider,
}

#[derive(Clone)]
pub struct AudioService {
    client: Client,
    elevenlabs_key: Option<String>,
    elevenlabs_voice: String,
    openai_key: Option<String>,
    huggingface_key: Option<String>,
}

impl AudioService {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            elevenlabs_key: config.elevenlabs_api_key.clone(),
            elevenlabs_voice: config.elevenlabs_voice_id.clone(),
            openai_key: config.openai_api_key.clone(),
            huggingface_key: config.huggingface_api_key.clone(),
        }
    }

    pub fn providers(&self) -> Vec<TtsProvider> {
        let mut providers = Vec::new();
        if self.elevenlabs_key.is_some() {
            providers.push(TtsProvider::ElevenLabs);
        }
        if self.openai_key.is_some() {
            providers.push(TtsProvider::OpenAi);
        }
        if self.huggingface_key.is_some() {
            providers.push(TtsProvider::HuggingFace);
        }
        providers
    }

    pub async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio> {
        if text.trim().is_empty() {
            return Err(Error::BadRequest("No text provided".to_string()));
        }
        let providers = self.providers();
        if providers.is_empty() {
            tracing::error!("No text-to-speech API key is set");
            return Err(Error::NotConfigured(
                "Server configuration error: Missing API Key".to_string(),
            ));
        }

        let mut last_error = String::new();
        for provider in providers {
            tracing::info!(?provider, "Attempting to generate audio");
            let result = match provider {
                TtsProvider::ElevenLabs => self.elevenlabs(text).await,
                TtsProvider::OpenAi => self.openai(text).await,
                TtsProvider::HuggingFace => self.huggingface(text).await,
            };
            match result {
                Ok((mime, bytes)) => {
                    return Ok(SynthesizedAudio {
                        audio_url: data_url(&mime, &bytes),
                        provider,
                    })
                }
                Err(e) => {
                    tracing::error!(?provider, error = %e, "Text-to-speech failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(Error::Upstream(format!("Failed to generate audio: {}", last_error)))
    }

    /// Synthesizes every part transcript; failures are recorded on the part
    /// rather than failing the whole exam.
    pub async fn attach_audio(&self, parts: &mut [ExamPart]) {
        for part in parts.iter_mut() {
            if part.audio_url.is_some() || part.content.trim().is_empty() {
                continue;
            }
            match self.synthesize(&part.content).await {
                Ok(audio) => {
                    part.audio_url = Some(audio.audio_url);
                    part.audio_error = None;
                }
                Err(e) => {
                    tracing::warn!(part = part.part, "Audio unavailable: {}", e);
                    part.audio_error = Some(e.to_string());
                }
            }
        }
    }

    async fn elevenlabs(&self, text: &str) -> Result<(String, Vec<u8>)> {
        let key = self.elevenlabs_key.as_deref().unwrap_or_default();
        let body = serde_json::json!({
            "text": text,
            "model_id": ELEVENLABS_MODEL,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75,
            },
        });
        let res = self
            .client
            .post(format!("{}/{}", ELEVENLABS_URL, self.elevenlabs_voice))
            .header("xi-api-key", key)
            .json(&body)
            .timeout(Duration::from_secs(90))
            .send()
            .await?;
        read_audio(res, "audio/mpeg", "ElevenLabs").await
    }

    async fn openai(&self, text: &str) -> Result<(String, Vec<u8>)> {
        let key = self.openai_key.as_deref().unwrap_or_default();
        let body = serde_json::json!({
            "model": "tts-1",
            "voice": "alloy",
            "input": text,
            "response_format": "mp3",
        });
        let res = self
            .client
            .post(OPENAI_TTS_URL)
            .bearer_auth(key)
            .json(&body)
            .timeout(Duration::from_secs(90))
            .send()
            .await?;
        read_audio(res, "audio/mpeg", "OpenAI TTS").await
    }

    async fn huggingface(&self, text: &str) -> Result<(String, Vec<u8>)> {
        let key = self.huggingface_key.as_deref().unwrap_or_default();
        let res = self
            .client
            .post(HUGGINGFACE_TTS_URL)
            .bearer_auth(key)
            .json(&serde_json::json!({ "inputs": text }))
            .timeout(Duration::from_secs(90))
            .send()
            .await?;
        read_audio(res, "audio/flac", "Hugging Face").await
    }
}

async fn read_audio(
    res: reqwest::Response,
    default_mime: &str,
    provider: &str,
) -> Result<(String, Vec<u8>)> {
    let status = res.status();
    if !status.is_success() {
        let text = res.text().await.unwrap_or_default();
        return Err(Error::Upstream(format!(
            "{} API Error: {} {}",
            provider, status, text
        )));
    }
    let mime = res
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|v| v.starts_with("audio/"))
        .unwrap_or(default_mime)
        .to_string();
    let bytes = res.bytes().await?;
    if bytes.is_empty() {
        return Err(Error::Upstream(format!("{} returned no audio", provider)));
    }
    Ok((mime, bytes.to_vec()))
}

pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(elevenlabs: bool, openai: bool, huggingface: bool) -> AudioService {
        AudioService {
            client: Client::new(),
            elevenlabs_key: elevenlabs.then(|| "el".to_string()),
            elevenlabs_voice: "voice".into(),
            openai_key: openai.then(|| "oa".to_string()),
            huggingface_key: huggingface.then(|| "hf".to_string()),
        }
    }

    #[test]
    fn providers_follow_preference_order() {
        assert_eq!(
            service(true, true, true).providers(),
            vec![TtsProvider::ElevenLabs, TtsProvider::OpenAi, TtsProvider::HuggingFace]
        );
        assert_eq!(service(false, false, true).providers(), vec![TtsProvider::HuggingFace]);
    }

    #[test]
    fn data_urls_are_base64() {
        assert_eq!(data_url("audio/mpeg", b"abc"), "data:audio/mpeg;base64,YWJj");
    }

    #[tokio::test]
    async fn empty_text_and_missing_keys_are_rejected_before_any_call() {
        let err = service(true, false, false).synthesize("   ").await.unwrap_err();
        assert!(matches!(err, Error::BadRequest(ref m) if m == "No text provided"));

        let err = service(false, false, false).synthesize("Hello").await.unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }

    #[tokio::test]
    async fn attach_audio_records_errors_per_part() {
        let mut parts = vec![
            ExamPart {
                part: 1,
                content: "Transcript".into(),
                ..Default::default()
            },
            ExamPart {
                part: 2,
                content: "Already voiced".into(),
                audio_url: Some("data:audio/mpeg;base64,AA==".into()),
                ..Default::default()
            },
        ];
        service(false, false, false).attach_audio(&mut parts).await;
        assert!(parts[0].audio_error.as_deref().unwrap().contains("Missing API Key"));
        assert!(parts[1].audio_error.is_none());
    }
}
