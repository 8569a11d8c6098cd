use crate::error::{Error, Result};
use crate::models::exam::level_label;
use crate::services::exam_service::exam_from_data;
use crate::services::normalizer::NormalizedExam;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use url::Url;

const UNKNOWN_EXAM: &str = "Unknown Exam";
const UNKNOWN_LEVEL: &str = "Unknown Level";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePayload {
    #[serde(default)]
    pub exam_type: String,
    #[serde(default)]
    pub cefr_level: String,
    #[serde(default)]
    pub content: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct SharedExam {
    pub exam_type: String,
    pub cefr_level: String,
    pub level_label: String,
    #[serde(flatten)]
    pub exam: NormalizedExam,
}

pub fn encode_share(payload: &SharePayload) -> Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(BASE64.encode(json.as_bytes()))
}

/// Accepts standard or URL-safe alphabets, with or without padding. Spaces
/// are read as `+` since unescaped query strings turn one into the other.
pub fn decode_share(token: &str) -> Result<SharePayload> {
    let mut normalized: String = token
        .trim()
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .map(|c| match c {
            ' ' => '+',
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    while normalized.len() % 4 != 0 {
        normalized.push('=');
    }

    let bytes = BASE64.decode(normalized.as_bytes())?;
    let text = String::from_utf8(bytes)
        .map_err(|_| Error::BadRequest("Invalid share link: not UTF-8".to_string()))?;
    let mut payload: SharePayload = serde_json::from_str(&text)?;

    if payload.exam_type.trim().is_empty() {
        payload.exam_type = UNKNOWN_EXAM.to_string();
    }
    if payload.cefr_level.trim().is_empty() {
        payload.cefr_level = UNKNOWN_LEVEL.to_string();
    }
    Ok(payload)
}

pub fn open_shared_exam(token: Option<&str>) -> Result<SharedExam> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::BadRequest("No exam data provided in the link.".to_string()))?;

    let payload = decode_share(token)?;
    let exam = exam_from_data(&payload.content)?;
    Ok(SharedExam {
        level_label: level_label(&payload.cefr_level),
        exam_type: payload.exam_type,
        cefr_level: payload.cefr_level,
        exam,
    })
}

pub fn share_url(webapp_url: &str, token: &str) -> Result<String> {
    let mut url = Url::parse(webapp_url)
        .map_err(|e| Error::Config(format!("WEBAPP_URL is not a valid URL: {}", e)))?;
    url.set_path("/exam");
    url.query_pairs_mut().clear().append_pair("data", token);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    fn payload() -> SharePayload {
        SharePayload {
            exam_type: "Reading".into(),
            cefr_level: "C2".into(),
            content: json!({"parts": [{
                "title": "Part 1",
                "instructions": "Read the text.",
                "content": "Café culture is thriving.",
                "questions": [{"question": "What is thriving?", "options": ["a", "b"], "correctOption": "A"}]
            }]}),
        }
    }

    #[test]
    fn shared_exam_opens_from_token() {
        let token = encode_share(&payload()).unwrap();
        let shared = open_shared_exam(Some(&token)).unwrap();
        assert_eq!(shared.exam_type, "Reading");
        assert_eq!(shared.level_label, "C2 Proficiency");
        assert_eq!(shared.exam.parts[0].content, "Café culture is thriving.");
        assert_eq!(shared.exam.questions.len(), 1);
    }

    #[test]
    fn url_safe_and_unpadded_tokens_decode() {
        let json = serde_json::to_string(&payload()).unwrap();
        let token = URL_SAFE_NO_PAD.encode(json.as_bytes());
        assert_eq!(decode_share(&token).unwrap(), payload());
    }

    #[test]
    fn missing_labels_get_defaults() {
        let token = BASE64.encode(br#"{"content": []}"#);
        let decoded = decode_share(&token).unwrap();
        assert_eq!(decoded.exam_type, "Unknown Exam");
        assert_eq!(decoded.cefr_level, "Unknown Level");
    }

    #[test]
    fn empty_or_garbage_links_are_rejected() {
        assert!(matches!(
            open_shared_exam(None),
            Err(Error::BadRequest(ref m)) if m == "No exam data provided in the link."
        ));
        assert!(matches!(open_shared_exam(Some("%%%")), Err(Error::Base64(_))));
    }

    #[test]
    fn share_url_escapes_token() {
        let url = share_url("https://exams.example.com/dashboard", "ab+c/=").unwrap();
        assert_eq!(url, "https://exams.example.com/exam?data=ab%2Bc%2F%3D");
    }
}
