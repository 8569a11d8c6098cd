//! Coerces whatever JSON a model produced into the fixed part/question shape
//! the practice UI renders.
//!
//! Models wrap the part list in arbitrary envelopes (`{"exam": [...]}`,
//! `{"Writing": {"tasks": [...]}}`, `{"part1": {...}, "part2": {...}}`), rename
//! fields (`text` vs `content`, `prompt` vs `question`) and encode options as
//! strings or objects. Every accepted variant is handled here so the rest of
//! the crate only sees [`NormalizedExam`].

use crate::models::exam::{ExamPart, ExamQuestion, SpeakingPrompt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

static RE_PART_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^Part\s*\d+\s*[:.]?\s*").expect("valid part prefix regex"));

const LIST_KEYS: [&str; 4] = ["parts", "exam", "tasks", "writingTasks"];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum NormalizeError {
    #[error("Failed to parse the generated exam: {0}")]
    InvalidJson(String),
    #[error("Generated exam data is not in the expected format. It should be an array of exam parts, or a single valid exam object.")]
    NoValidParts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedExam {
    pub parts: Vec<ExamPart>,
    pub questions: Vec<ExamQuestion>,
}

/// Parses raw model output (optionally fenced in markdown) and normalizes it.
pub fn parse_exam_content(text: &str) -> Result<NormalizedExam, NormalizeError> {
    let json = extract_json_block(text);
    let raw: JsonValue =
        serde_json::from_str(json).map_err(|e| NormalizeError::InvalidJson(e.to_string()))?;
    normalize_exam(&raw)
}

pub fn normalize_exam(raw: &JsonValue) -> Result<NormalizedExam, NormalizeError> {
    let processed = unwrap_single_key(raw);
    let items = select_part_list(processed);

    let mut exam = NormalizedExam::default();
    let mut next_question_id: u32 = 1;

    for item in items {
        let part_data = unwrap_part_wrapper(item);
        let Some(obj) = part_data.as_object() else {
            continue;
        };
        if !is_valid_part(obj) {
            continue;
        }

        let part_number = exam.parts.len() as u32 + 1;
        let raw_title = str_field(obj, "title");
        exam.parts.push(ExamPart {
            part: part_number,
            title: clean_title(&raw_title),
            instructions: str_field(obj, "instructions"),
            content: first_truthy_str(obj, &["content", "text"]),
            examiner_notes: str_field(obj, "examinerNotes"),
            audio_url: opt_str_field(obj, "audioUrl"),
            audio_error: opt_str_field(obj, "audioError"),
            tips: opt_str_field(obj, "tips"),
            model_answer: opt_str_field(obj, "modelAnswer"),
            how_to_approach: opt_str_field(obj, "howToApproach"),
        });

        let questions = obj
            .get("questions")
            .and_then(|q| q.as_array())
            .map(|a| a.as_slice())
            .unwrap_or(&[]);
        for q in questions {
            exam.questions
                .push(coerce_question(q, next_question_id, part_number, &raw_title));
            next_question_id += 1;
        }
    }

    if exam.parts.is_empty() {
        return Err(NormalizeError::NoValidParts);
    }
    Ok(exam)
}

/// Returns the JSON payload inside a ```json fence, or the outermost
/// object/array when the model surrounded it with prose.
pub fn extract_json_block(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    let open = trimmed.find(|c: char| c == '{' || c == '[');
    let close = trimmed.rfind(|c: char| c == '}' || c == ']');
    match (open, close) {
        (Some(o), Some(c)) if c > o => &trimmed[o..=c],
        _ => trimmed,
    }
}

/// Extracts the part list exactly the way generation validates it: a bare
/// array, or an object with a single key holding an array.
pub fn top_level_parts(raw: &JsonValue) -> Option<&Vec<JsonValue>> {
    if let Some(arr) = raw.as_array() {
        return Some(arr);
    }
    let obj = raw.as_object()?;
    if obj.len() == 1 {
        return obj.values().next().and_then(|v| v.as_array());
    }
    None
}

pub fn clean_title(title: &str) -> String {
    RE_PART_PREFIX.replace(title.trim(), "").trim().to_string()
}

fn unwrap_single_key(value: &JsonValue) -> &JsonValue {
    if let Some(obj) = value.as_object() {
        if obj.len() == 1 {
            if let Some(inner) = obj.values().next() {
                if inner.is_object() || inner.is_array() {
                    return inner;
                }
            }
        }
    }
    value
}

fn select_part_list(processed: &JsonValue) -> Vec<&JsonValue> {
    if let Some(arr) = processed.as_array() {
        return arr.iter().collect();
    }
    let Some(obj) = processed.as_object() else {
        return vec![processed];
    };

    for key in LIST_KEYS {
        if let Some(arr) = obj.get(key).and_then(|v| v.as_array()) {
            return arr.iter().collect();
        }
    }

    if truthy(obj.get("title")) && truthy(obj.get("content")) && truthy(obj.get("questions")) {
        return vec![processed];
    }

    let flattened: Vec<&JsonValue> = obj
        .values()
        .flat_map(|v| match v.as_array() {
            Some(arr) => arr.iter().collect::<Vec<_>>(),
            None => vec![v],
        })
        .collect();
    let looks_like_parts = !flattened.is_empty()
        && flattened.iter().all(|v| {
            v.as_object()
                .map(|o| truthy(o.get("title")) || truthy(o.get("questions")))
                .unwrap_or(false)
        });

    if looks_like_parts {
        flattened
    } else {
        vec![processed]
    }
}

fn unwrap_part_wrapper(item: &JsonValue) -> &JsonValue {
    if let Some(obj) = item.as_object() {
        if !truthy(obj.get("title")) && !truthy(obj.get("questions")) && obj.len() == 1 {
            if let Some(inner) = obj.values().next() {
                if inner.is_object() || inner.is_array() {
                    return inner;
                }
            }
        }
    }
    item
}

fn is_valid_part(obj: &Map<String, JsonValue>) -> bool {
    truthy(obj.get("title"))
        && (truthy(obj.get("content")) || truthy(obj.get("text")))
        && obj.get("questions").map(|q| q.is_array()).unwrap_or(false)
}

fn coerce_question(q: &JsonValue, id: u32, part: u32, topic: &str) -> ExamQuestion {
    let empty = Map::new();
    let obj = q.as_object().unwrap_or(&empty);

    let options = obj
        .get("options")
        .and_then(|o| o.as_array())
        .map(|arr| arr.iter().filter_map(option_text).collect())
        .unwrap_or_default();

    ExamQuestion {
        id,
        part,
        topic: topic.to_string(),
        question: first_truthy_str(obj, &["text", "question", "prompt"]),
        options,
        correct_option: correct_option(obj),
        explanation: str_field(obj, "explanation"),
        image_prompts: image_prompt_list(obj.get("imagePrompts")),
        possible_answers: string_list(obj.get("possibleAnswers")),
        tips: opt_str_field(obj, "tips"),
        part1_questions: speaking_prompts(obj.get("part1Questions")),
    }
}

fn option_text(opt: &JsonValue) -> Option<String> {
    match opt {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Object(o) => ["text", "value"]
            .iter()
            .filter_map(|k| o.get(*k))
            .find(|v| truthy(Some(*v)))
            .and_then(scalar_to_string),
        _ => None,
    }
}

fn correct_option(obj: &Map<String, JsonValue>) -> String {
    for key in ["correctOption", "correctAnswer", "correct_answer", "answer"] {
        match obj.get(key) {
            Some(JsonValue::String(s)) if !s.is_empty() => return s.clone(),
            Some(JsonValue::Number(n)) => {
                if let Some(idx) = n.as_u64().filter(|i| *i < 26) {
                    return ((b'A' + idx as u8) as char).to_string();
                }
            }
            _ => {}
        }
    }
    String::new()
}

fn speaking_prompts(value: Option<&JsonValue>) -> Vec<SpeakingPrompt> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|p| match p {
                    JsonValue::String(s) => Some(SpeakingPrompt {
                        question: s.clone(),
                        answer: String::new(),
                        tip: String::new(),
                    }),
                    JsonValue::Object(o) => Some(SpeakingPrompt {
                        question: first_truthy_str(o, &["question", "text"]),
                        answer: str_field(o, "answer"),
                        tip: str_field(o, "tip"),
                    }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// A single string counts as a one-item list; objects contribute their
/// `description`, `text` or `prompt`. Blank entries are dropped.
fn image_prompt_list(value: Option<&JsonValue>) -> Vec<String> {
    let items: Vec<&JsonValue> = match value {
        Some(JsonValue::Array(arr)) => arr.iter().collect(),
        Some(v @ JsonValue::String(_)) => vec![v],
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|p| match p {
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Object(o) => Some(first_truthy_str(o, &["description", "text", "prompt"])),
            _ => None,
        })
        .filter(|s| !s.trim().is_empty())
        .collect()
}

fn string_list(value: Option<&JsonValue>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(scalar_to_string).collect())
        .unwrap_or_default()
}

fn scalar_to_string(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn str_field(obj: &Map<String, JsonValue>, key: &str) -> String {
    obj.get(key).and_then(scalar_to_string).unwrap_or_default()
}

fn opt_str_field(obj: &Map<String, JsonValue>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(scalar_to_string)
        .filter(|s| !s.is_empty())
}

fn first_truthy_str(obj: &Map<String, JsonValue>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| truthy(Some(*v)))
        .and_then(scalar_to_string)
        .unwrap_or_default()
}

/// JavaScript truthiness, which is what the model output was written against.
fn truthy(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(JsonValue::Array(_)) | Some(JsonValue::Object(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn part(title: &str, n_questions: usize) -> JsonValue {
        let questions: Vec<JsonValue> = (0..n_questions)
            .map(|i| {
                json!({
                    "question": format!("Q{}", i + 1),
                    "options": ["one", "two", "three", "four"],
                    "correctOption": "B",
                    "explanation": "Because."
                })
            })
            .collect();
        json!({
            "title": title,
            "instructions": "Read the text.",
            "content": "Some text.",
            "examinerNotes": "Skim first.",
            "questions": questions
        })
    }

    #[test]
    fn bare_array_is_accepted_and_ids_run_across_parts() {
        let raw = json!([part("Part 1: Multiple choice", 2), part("Gapped text", 3)]);
        let exam = normalize_exam(&raw).unwrap();

        assert_eq!(exam.parts.len(), 2);
        assert_eq!(exam.parts[0].title, "Multiple choice");
        assert_eq!(exam.parts[1].part, 2);
        let ids: Vec<u32> = exam.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(exam.questions[4].part, 2);
        assert_eq!(exam.questions[0].topic, "Part 1: Multiple choice");
        assert_eq!(exam.questions[0].correct_option, "B");
    }

    #[test]
    fn envelope_keys_are_unwrapped() {
        for key in LIST_KEYS {
            let raw = json!({ key: [part("A", 1)], "meta": "ignored" });
            let exam = normalize_exam(&raw).unwrap();
            assert_eq!(exam.parts.len(), 1, "envelope key {}", key);
        }

        let nested = json!({ "Writing": { "writingTasks": [part("Essay", 1), part("Report", 1)] } });
        assert_eq!(normalize_exam(&nested).unwrap().parts.len(), 2);
    }

    #[test]
    fn single_part_object_is_wrapped() {
        let raw = part("Only part", 2);
        let exam = normalize_exam(&raw).unwrap();
        assert_eq!(exam.parts.len(), 1);
        assert_eq!(exam.questions.len(), 2);
    }

    #[test]
    fn map_of_parts_is_flattened() {
        let raw = json!({
            "part1": part("First", 1),
            "part2": [part("Second", 1)],
        });
        let exam = normalize_exam(&raw).unwrap();
        let titles: Vec<&str> = exam.parts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["First", "Second"]);
    }

    #[test]
    fn single_key_part_wrappers_and_field_aliases() {
        let raw = json!([
            { "Part 1": {
                "title": "Part 2. Listening",
                "text": "Transcript",
                "questions": [
                    { "prompt": "What time?", "options": [{"text": "Noon"}, {"value": "Dusk"}, 7, null], "correct_answer": 1 },
                    { "text": "Fill the gap", "answer": "river" }
                ]
            }}
        ]);
        let exam = normalize_exam(&raw).unwrap();
        assert_eq!(exam.parts[0].title, "Listening");
        assert_eq!(exam.parts[0].content, "Transcript");
        assert_eq!(exam.questions[0].question, "What time?");
        assert_eq!(exam.questions[0].options, vec!["Noon", "Dusk"]);
        assert_eq!(exam.questions[0].correct_option, "B");
        assert_eq!(exam.questions[1].question, "Fill the gap");
        assert!(exam.questions[1].options.is_empty());
        assert_eq!(exam.questions[1].correct_option, "river");
    }

    #[test]
    fn invalid_parts_are_skipped_and_numbering_stays_dense() {
        let raw = json!([
            { "title": "No content", "questions": [] },
            part("Kept", 1),
            { "title": "Bad questions", "content": "x", "questions": "nope" },
            part("Also kept", 1)
        ]);
        let exam = normalize_exam(&raw).unwrap();
        let numbers: Vec<u32> = exam.parts.iter().map(|p| p.part).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(exam.questions[1].part, 2);
    }

    #[test]
    fn nothing_usable_is_an_error() {
        assert_eq!(
            normalize_exam(&json!({"foo": 1, "bar": "baz"})),
            Err(NormalizeError::NoValidParts)
        );
        assert_eq!(normalize_exam(&json!([])), Err(NormalizeError::NoValidParts));
        assert!(matches!(
            parse_exam_content("not json at all"),
            Err(NormalizeError::InvalidJson(_))
        ));
    }

    #[test]
    fn speaking_extras_survive() {
        let raw = json!([{
            "title": "Interview",
            "content": "Talk about yourself.",
            "tips": "Extend your answers.",
            "modelAnswer": "I live in...",
            "questions": [{
                "question": "Compare the photos",
                "imagePrompts": ["a busy market", "a quiet library"],
                "possibleAnswers": ["Both show people"],
                "part1Questions": [{"question": "Where do you live?", "answer": "In Leeds", "tip": "Add detail"}, "Do you work?"]
            }]
        }]);
        let exam = normalize_exam(&raw).unwrap();
        assert_eq!(exam.parts[0].tips.as_deref(), Some("Extend your answers."));
        assert_eq!(exam.parts[0].model_answer.as_deref(), Some("I live in..."));
        let q = &exam.questions[0];
        assert_eq!(q.image_prompts.len(), 2);
        assert_eq!(q.possible_answers, vec!["Both show people"]);
        assert_eq!(q.part1_questions[0].answer, "In Leeds");
        assert_eq!(q.part1_questions[1].question, "Do you work?");
    }

    #[test]
    fn fenced_and_chatty_output_is_extracted() {
        let fenced = "Here you go:\n```json\n[1, 2]\n```\nEnjoy!";
        assert_eq!(extract_json_block(fenced), "[1, 2]");
        let chatty = "Sure! {\"parts\": []} Hope it helps.";
        assert_eq!(extract_json_block(chatty), "{\"parts\": []}");

        let content = format!("```json\n{}\n```", json!([part("Fenced", 1)]));
        assert_eq!(parse_exam_content(&content).unwrap().parts[0].title, "Fenced");
    }

    #[test]
    fn top_level_parts_matches_generation_rules() {
        assert_eq!(top_level_parts(&json!([1, 2])).map(|a| a.len()), Some(2));
        assert_eq!(top_level_parts(&json!({"exam": [1]})).map(|a| a.len()), Some(1));
        assert!(top_level_parts(&json!({"exam": [1], "extra": 2})).is_none());
        assert!(top_level_parts(&json!({"exam": {"parts": []}})).is_none());
    }

    #[test]
    fn image_prompts_accept_strings_objects_and_drop_blanks() {
        let mut raw = part("Photos", 2);
        raw["questions"][0]["imagePrompts"] = json!("a busy market");
        raw["questions"][1]["imagePrompts"] =
            json!([{"description": "a quiet library"}, {"prompt": "a park"}, "  ", {"other": 1}, 7]);

        let exam = normalize_exam(&json!([raw])).unwrap();
        assert_eq!(exam.questions[0].image_prompts, vec!["a busy market"]);
        assert_eq!(exam.questions[1].image_prompts, vec!["a quiet library", "a park"]);
    }

    #[test]
    fn bare_json_with_backticks_in_strings_is_kept_whole() {
        let text = r#"{"parts": [{"note": "use ``` to fence ``` code"}]}"#;
        assert_eq!(extract_json_block(text), text);

        let raw = json!([part("Code", 1)]);
        let mut with_ticks = raw.clone();
        with_ticks[0]["content"] = json!("Wrap code in ``` like ``` this.");
        let exam = parse_exam_content(&with_ticks.to_string()).unwrap();
        assert_eq!(exam.parts[0].content, "Wrap code in ``` like ``` this.");
    }
}
