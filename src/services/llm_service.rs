use crate::config::Config;
use crate::error::{Error, Result};
use crate::services::normalizer::{extract_json_block, top_level_parts};
use crate::services::prompts::{
    build_exam_prompt, build_grading_prompt, ExamRequest, EXAM_SYSTEM_PROMPT,
    GRADER_SYSTEM_PROMPT,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::future::Future;
use std::time::Duration;

const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Groq,
    Gemini,
    OpenAi,
}

/// One provider/key/model combination to try.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub provider: Provider,
    pub key_index: usize,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct RotationOutcome<T> {
    pub value: T,
    pub provider: Provider,
    pub model: String,
    pub attempt_number: usize,
    pub logs: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub content: String,
    pub provider: Provider,
    pub model: String,
    pub attempt: usize,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetailedAnalysis {
    pub content: String,
    pub communicative_achievement: String,
    pub organisation: String,
    pub language: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Correction {
    pub original: String,
    pub correction: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WritingAssessment {
    pub score: f64,
    pub band: String,
    pub feedback: String,
    pub detailed_analysis: DetailedAnalysis,
    pub corrections: Vec<Correction>,
}

#[derive(Clone)]
pub struct LlmService {
    client: Client,
    groq_keys: Vec<String>,
    groq_models: Vec<String>,
    gemini_key: Option<String>,
    gemini_model: String,
    gemini_delay: Duration,
    openai_key: Option<String>,
    openai_model: String,
}

impl LlmService {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            groq_keys: config.groq_api_keys.clone(),
            groq_models: config.groq_models.clone(),
            gemini_key: config.gemini_api_key.clone(),
            gemini_model: config.gemini_model.clone(),
            gemini_delay: Duration::from_millis(config.gemini_delay_ms),
            openai_key: config.openai_api_key.clone(),
            openai_model: config.openai_model.clone(),
        }
    }

    /// Every Groq key with every Groq model, then Gemini, then OpenAI.
    pub fn plan_attempts(&self) -> Vec<Attempt> {
        let mut attempts = Vec::new();
        for (key_index, key) in self.groq_keys.iter().enumerate() {
            for model in &self.groq_models {
                attempts.push(Attempt {
                    provider: Provider::Groq,
                    key_index,
                    api_key: key.clone(),
                    model: model.clone(),
                });
            }
        }
        if let Some(key) = &self.gemini_key {
            attempts.push(Attempt {
                provider: Provider::Gemini,
                key_index: 0,
                api_key: key.clone(),
                model: self.gemini_model.clone(),
            });
        }
        if let Some(key) = &self.openai_key {
            attempts.push(Attempt {
                provider: Provider::OpenAi,
                key_index: 0,
                api_key: key.clone(),
                model: self.openai_model.clone(),
            });
        }
        attempts
    }

    pub async fn generate_exam(&self, request: &ExamRequest) -> Result<GenerationOutput> {
        let prompt = build_exam_prompt(request);
        let chat = ChatRequest {
            system: EXAM_SYSTEM_PROMPT,
            user: &prompt,
            temperature: 0.7,
            max_tokens: 8192,
        };
        let part_count = request.part_count;

        let outcome = rotate(
            &self.plan_attempts(),
            "a high-quality exam",
            |attempt| self.complete(attempt, &chat),
            |completion| check_exam_completion(completion, part_count),
        )
        .await?;

        Ok(GenerationOutput {
            content: outcome.value,
            provider: outcome.provider,
            model: outcome.model,
            attempt: outcome.attempt_number,
            logs: outcome.logs,
        })
    }

    pub async fn assess_writing(
        &self,
        task_type: &str,
        question_context: &str,
        student_input: &str,
    ) -> Result<WritingAssessment> {
        let prompt = build_grading_prompt(task_type, question_context, student_input);
        let chat = ChatRequest {
            system: GRADER_SYSTEM_PROMPT,
            user: &prompt,
            temperature: 0.2,
            max_tokens: 2048,
        };

        let outcome = rotate(
            &self.plan_attempts(),
            "a writing assessment",
            |attempt| self.complete(attempt, &chat),
            parse_assessment,
        )
        .await?;
        Ok(outcome.value)
    }

    async fn complete(&self, attempt: Attempt, chat: &ChatRequest<'_>) -> Result<Completion> {
        match attempt.provider {
            Provider::Groq => self.chat_openai_compatible(GROQ_URL, &attempt, chat).await,
            Provider::OpenAi => self.chat_openai_compatible(OPENAI_URL, &attempt, chat).await,
            Provider::Gemini => {
                // Free-tier Gemini keys are rate limited per second.
                tokio::time::sleep(self.gemini_delay).await;
                self.chat_gemini(&attempt, chat).await
            }
        }
    }

    async fn chat_openai_compatible(
        &self,
        url: &str,
        attempt: &Attempt,
        chat: &ChatRequest<'_>,
    ) -> Result<Completion> {
        let payload = serde_json::json!({
            "model": attempt.model,
            "messages": [
                {"role": "system", "content": chat.system},
                {"role": "user", "content": chat.user}
            ],
            "temperature": chat.temperature,
            "max_tokens": chat.max_tokens,
            "response_format": { "type": "json_object" }
        });

        let res = self
            .client
            .post(url)
            .bearer_auth(&attempt.api_key)
            .json(&payload)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("{:?} API Error {}: {}", attempt.provider, status, text).into());
        }

        let body: JsonValue = res.json().await?;
        let choice = body.get("choices").and_then(|c| c.get(0));
        Ok(Completion {
            content: choice
                .and_then(|c| c.get("message"))
                .and_then(|m| m.get("content"))
                .and_then(|c| c.as_str())
                .map(|s| s.to_string()),
            finish_reason: choice
                .and_then(|c| c.get("finish_reason"))
                .and_then(|f| f.as_str())
                .map(|s| s.to_string()),
        })
    }

    async fn chat_gemini(&self, attempt: &Attempt, chat: &ChatRequest<'_>) -> Result<Completion> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            role: &'a str,
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        struct Instruction<'a> {
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenerationConfig<'a> {
            temperature: f32,
            max_output_tokens: u32,
            response_mime_type: &'a str,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Req<'a> {
            system_instruction: Instruction<'a>,
            contents: Vec<Content<'a>>,
            generation_config: GenerationConfig<'a>,
        }
        #[derive(Deserialize)]
        struct RespPart {
            #[serde(default)]
            text: String,
        }
        #[derive(Deserialize)]
        struct RespContent {
            #[serde(default)]
            parts: Vec<RespPart>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Candidate {
            content: Option<RespContent>,
            finish_reason: Option<String>,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }

        let req = Req {
            system_instruction: Instruction {
                parts: vec![Part { text: chat.system }],
            },
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: chat.user }],
            }],
            generation_config: GenerationConfig {
                temperature: chat.temperature,
                max_output_tokens: chat.max_tokens,
                response_mime_type: "application/json",
            },
        };

        let url = format!("{}/{}:generateContent", GEMINI_URL, attempt.model);
        let res = self
            .client
            .post(&url)
            .query(&[("key", attempt.api_key.as_str())])
            .json(&req)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Gemini API Error {}: {}", status, text).into());
        }

        let body: Resp = res.json().await?;
        let Some(candidate) = body.candidates.into_iter().next() else {
            return Ok(Completion::default());
        };
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        let finish_reason = candidate.finish_reason.map(|r| match r.as_str() {
            "MAX_TOKENS" => "length".to_string(),
            _ => r.to_lowercase(),
        });
        Ok(Completion {
            content: Some(text).filter(|t| !t.is_empty()),
            finish_reason,
        })
    }
}

/// Tries each attempt in order until `accept` approves a completion.
/// Rejections and transport failures are logged and the next attempt taken;
/// the last reason is reported when every attempt is used up.
pub async fn rotate<T, F, Fut, V>(
    attempts: &[Attempt],
    what: &str,
    mut call: F,
    mut accept: V,
) -> Result<RotationOutcome<T>>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<Completion>>,
    V: FnMut(&Completion) -> std::result::Result<T, String>,
{
    if attempts.is_empty() {
        return Err(Error::NotConfigured(
            "Server is not configured with any API keys.".to_string(),
        ));
    }

    let total = attempts.len();
    let mut logs: Vec<String> = Vec::new();
    let mut last_error = "Generation did not start.".to_string();

    for (idx, attempt) in attempts.iter().enumerate() {
        let number = idx + 1;
        tracing::info!(
            provider = ?attempt.provider,
            key_index = attempt.key_index,
            model = %attempt.model,
            "--- Generation attempt {}/{} ---",
            number,
            total
        );
        logs.push(format!(
            "Attempt {}/{}: {:?} key #{} model {}",
            number, total, attempt.provider, attempt.key_index, attempt.model
        ));

        match call(attempt.clone()).await {
            Ok(completion) => match accept(&completion) {
                Ok(value) => {
                    tracing::info!("--- Generation successful on attempt {} ---", number);
                    logs.push(format!("Accepted on attempt {}.", number));
                    return Ok(RotationOutcome {
                        value,
                        provider: attempt.provider,
                        model: attempt.model.clone(),
                        attempt_number: number,
                        logs,
                    });
                }
                Err(reason) => {
                    tracing::warn!("{} Retrying...", reason);
                    logs.push(reason.clone());
                    last_error = reason;
                }
            },
            Err(e) => {
                last_error = format!("API call failed: {}", e);
                tracing::error!("Error on attempt {}: {}", number, last_error);
                logs.push(last_error.clone());
            }
        }
    }

    tracing::error!("Failed to produce {} after {} attempts.", what, total);
    Err(Error::Upstream(format!(
        "Failed to generate {} after multiple attempts. Last known issue: {}",
        what, last_error
    )))
}

/// Quality gate for exam completions. Returns the JSON text on success and
/// the reason to retry otherwise.
pub fn check_exam_completion(
    completion: &Completion,
    part_count: usize,
) -> std::result::Result<String, String> {
    if completion.finish_reason.as_deref() == Some("length") {
        return Err("Generation stopped because it reached the maximum token limit.".to_string());
    }

    let content = match completion.content.as_deref().map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => return Err("No content was received from the API.".to_string()),
    };

    let json = extract_json_block(content);
    let raw: JsonValue = serde_json::from_str(json).map_err(|_| {
        let preview: String = content.chars().take(200).collect();
        tracing::debug!(preview = %preview, "Unparsable completion");
        "Failed to parse the generated content as valid JSON.".to_string()
    })?;

    let parts = top_level_parts(&raw).ok_or_else(|| {
        "Generated content was not in the expected format (a JSON array of parts).".to_string()
    })?;

    if parts.len() != part_count {
        return Err(format!(
            "Generated exam has {} parts, but exactly {} were requested.",
            parts.len(),
            part_count
        ));
    }

    Ok(json.to_string())
}

fn parse_assessment(completion: &Completion) -> std::result::Result<WritingAssessment, String> {
    let content = completion
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| "No content was received from the API.".to_string())?;
    let assessment: WritingAssessment = serde_json::from_str(extract_json_block(content))
        .map_err(|e| format!("Failed to parse the assessment as valid JSON: {}", e))?;
    if assessment.feedback.trim().is_empty() {
        return Err("Assessment did not include any feedback.".to_string());
    }
    Ok(assessment)
}
