use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

const DEFAULT_GROQ_MODELS: &str = "llama-3.3-70b-versatile,mixtral-8x7b-32768";

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub jwt_secret: String,
    pub api_rps: u32,
    pub public_rps: u32,
    pub webapp_url: String,
    pub max_exam_parts: usize,
    pub groq_api_keys: Vec<String>,
    pub groq_models: Vec<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_delay_ms: u64,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: String,
    pub huggingface_api_key: Option<String>,
    pub pexels_api_key: Option<String>,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let groq_api_keys = collect_groq_keys(env::vars());
        if groq_api_keys.is_empty() {
            tracing::warn!(
                "No Groq API keys found. Set GROQ_API_KEY_1, GROQ_API_KEY_2, etc. to enable Groq generation."
            );
        }

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: get_env("JWT_SECRET")?,
            api_rps: get_env_parse("API_RPS")?,
            public_rps: get_env_parse("PUBLIC_RPS")?,
            webapp_url: get_env("WEBAPP_URL")?,
            max_exam_parts: get_env_parse_or("MAX_EXAM_PARTS", 8)?,
            groq_api_keys,
            groq_models: parse_list(
                &get_optional("GROQ_MODELS").unwrap_or_else(|| DEFAULT_GROQ_MODELS.to_string()),
            ),
            gemini_api_key: get_optional("GEMINI_API_KEY"),
            gemini_model: get_optional("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),
            gemini_delay_ms: get_env_parse_or("GEMINI_DELAY_MS", 2000)?,
            openai_api_key: get_optional("OPENAI_API_KEY"),
            openai_model: get_optional("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            elevenlabs_api_key: get_optional("ELEVENLABS_API_KEY"),
            elevenlabs_voice_id: get_optional("ELEVENLABS_VOICE_ID")
                .unwrap_or_else(|| "21m00Tcm4TlvDq8ikWAM".to_string()),
            huggingface_api_key: get_optional("HUGGINGFACE_API_KEY"),
            pexels_api_key: get_optional("PEXELS_API_KEY"),
        })
    }
}

/// Picks `GROQ_API_KEY` and every `GROQ_API_KEY_<n>` out of the environment,
/// ordered by suffix so rotation is deterministic.
pub fn collect_groq_keys<I>(vars: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut found: Vec<(u64, String, String)> = vars
        .into_iter()
        .filter_map(|(name, value)| {
            let value = value.trim().to_string();
            if value.is_empty() {
                return None;
            }
            if name == "GROQ_API_KEY" {
                return Some((0, name, value));
            }
            let suffix = name.strip_prefix("GROQ_API_KEY_")?;
            let rank = suffix.parse::<u64>().unwrap_or(u64::MAX);
            Some((rank, name, value))
        })
        .collect();

    found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let mut keys: Vec<String> = Vec::with_capacity(found.len());
    for (_, _, value) in found {
        if !keys.contains(&value) {
            keys.push(value);
        }
    }
    keys
}

pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_parse<T>(name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(name)?;
    raw.parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get_optional(name) {
        Some(_) => get_env_parse(name),
        None => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn groq_keys_are_ordered_by_numeric_suffix() {
        let keys = collect_groq_keys(vars(&[
            ("GROQ_API_KEY_10", "k10"),
            ("PATH", "/usr/bin"),
            ("GROQ_API_KEY_2", "k2"),
            ("GROQ_API_KEY_1", "k1"),
        ]));
        assert_eq!(keys, vec!["k1", "k2", "k10"]);
    }

    #[test]
    fn plain_key_comes_first_and_duplicates_are_dropped() {
        let keys = collect_groq_keys(vars(&[
            ("GROQ_API_KEY_1", "shared"),
            ("GROQ_API_KEY", "shared"),
            ("GROQ_API_KEY_2", "  "),
            ("GROQ_API_KEY_3", "k3"),
        ]));
        assert_eq!(keys, vec!["shared", "k3"]);
    }

    #[test]
    fn list_parsing_skips_blanks() {
        assert_eq!(
            parse_list(" llama-3.3-70b-versatile, ,mixtral-8x7b-32768 "),
            vec!["llama-3.3-70b-versatile", "mixtral-8x7b-32768"]
        );
    }
}
